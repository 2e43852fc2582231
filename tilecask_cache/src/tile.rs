//! The in-flight unit the cache and manager pass around: a tile coordinate
//! plus whatever payload/metadata has been attached to it so far.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;
use tilecask_core::TileCoord;
use tilecask_image::ImageSource;

/// One tile's coordinate, its decoded/encoded payload (once loaded or built),
/// and bookkeeping the cache fills in as it's stored or loaded.
pub struct Tile {
	pub coord: TileCoord,
	pub source: Option<ImageSource>,
	pub location: Option<PathBuf>,
	pub stored: bool,
	pub size: Option<u64>,
	pub timestamp: Option<SystemTime>,
}

impl Tile {
	pub fn new(coord: TileCoord) -> Self {
		Tile {
			coord,
			source: None,
			location: None,
			stored: false,
			size: None,
			timestamp: None,
		}
	}

	/// True once a payload has been attached, either by a cache hit or a build.
	pub fn is_missing(&self) -> bool {
		self.source.is_none()
	}
}

/// Tiles requested in one `load_tile_coords` call, retrievable by coordinate
/// and iterable in the order they were requested.
pub struct TileCollection {
	tiles: Vec<Tile>,
	index: HashMap<TileCoord, usize>,
}

impl TileCollection {
	pub fn new(coords: impl IntoIterator<Item = TileCoord>) -> Self {
		let tiles: Vec<Tile> = coords.into_iter().map(Tile::new).collect();
		let index = tiles.iter().enumerate().map(|(i, t)| (t.coord, i)).collect();
		TileCollection { tiles, index }
	}

	pub fn get(&self, coord: TileCoord) -> Option<&Tile> {
		self.index.get(&coord).map(|&i| &self.tiles[i])
	}

	pub fn get_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
		match self.index.get(&coord) {
			Some(&i) => Some(&mut self.tiles[i]),
			None => None,
		}
	}

	pub fn contains(&self, coord: TileCoord) -> bool {
		self.index.contains_key(&coord)
	}

	pub fn len(&self) -> usize {
		self.tiles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tiles.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Tile> {
		self.tiles.iter()
	}

	pub fn into_vec(self) -> Vec<Tile> {
		self.tiles
	}
}

impl IntoIterator for TileCollection {
	type Item = Tile;
	type IntoIter = std::vec::IntoIter<Tile>;

	fn into_iter(self) -> Self::IntoIter {
		self.tiles.into_iter()
	}
}
