//! Builds missing tiles from upstream sources and fills the cache, with
//! at-most-one-build-per-metatile guaranteed by a `FileLock`. Mirrors
//! mapproxy's `TileManager`: cache-check, group-by-metatile, build under
//! lock with a double-check, store every tile the build produced.

use crate::source::Source;
use crate::tile::{Tile, TileCollection};
use crate::tile_cache::FileTileCache;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tilecask_core::{Grid, MapQuery, MetaGrid, TileCoord};
use tilecask_core::{TileFormat, error::CoreError};
use tilecask_derive::context;
use tilecask_image::{LayerMerger, TileSplitter};

/// Binds a grid, its cache, and the upstream sources that fill cache misses.
pub struct TileManager {
	grid: Grid,
	cache: FileTileCache,
	sources: Vec<Arc<dyn Source>>,
	meta_size: Option<(u32, u32)>,
	meta_buffer: u32,
	format: TileFormat,
	transparent: bool,
	bgcolor: String,
	/// Tiles older than this are treated as stale by `is_stale` even though
	/// they're still cached — a cheap way to force a rebuild after upstream
	/// data changes without clearing the cache.
	expire_timestamp: Option<SystemTime>,
}

impl TileManager {
	pub fn new(grid: Grid, cache: FileTileCache, sources: Vec<Arc<dyn Source>>) -> Self {
		let format = cache.format();
		TileManager {
			grid,
			cache,
			sources,
			meta_size: None,
			meta_buffer: 0,
			format,
			transparent: false,
			bgcolor: "#ffffff".to_string(),
			expire_timestamp: None,
		}
	}

	pub fn with_meta_tiles(mut self, meta_size: (u32, u32), meta_buffer: u32) -> Self {
		self.meta_size = Some(meta_size);
		self.meta_buffer = meta_buffer;
		self
	}

	pub fn with_transparent(mut self, transparent: bool) -> Self {
		self.transparent = transparent;
		self
	}

	pub fn with_bgcolor(mut self, bgcolor: impl Into<String>) -> Self {
		self.bgcolor = bgcolor.into();
		self
	}

	pub fn with_expire_timestamp(mut self, expire_timestamp: SystemTime) -> Self {
		self.expire_timestamp = Some(expire_timestamp);
		self
	}

	pub fn grid(&self) -> &Grid {
		&self.grid
	}

	pub fn cache(&self) -> &FileTileCache {
		&self.cache
	}

	pub fn transparent(&self) -> bool {
		self.transparent
	}

	/// The metatile grouping this manager builds under, if any — threaded
	/// into `TileWalker` so a seed run dispatches one job per metatile
	/// instead of one per tile.
	pub fn meta_size(&self) -> Option<(u32, u32)> {
		self.meta_size
	}

	pub fn is_cached(&self, coord: TileCoord) -> bool {
		self.cache.is_cached(&Tile::new(coord))
	}

	/// True if the tile is missing entirely, or cached but older than
	/// `expire_timestamp`.
	pub fn is_stale(&self, coord: TileCoord) -> Result<bool> {
		if !self.is_cached(coord) {
			return Ok(true);
		}
		match self.expire_timestamp {
			Some(expire) => Ok(self.cache.timestamp_created(coord)? < expire),
			None => Ok(false),
		}
	}

	pub fn remove_tile_coords(&self, coords: impl IntoIterator<Item = TileCoord>) -> Result<()> {
		for coord in coords {
			self.cache.remove(coord)?;
		}
		Ok(())
	}

	/// Loads every coordinate in `coords`, filling cache hits directly and
	/// building every cache miss (grouped by metatile, at most one build per
	/// metatile across concurrent callers).
	pub async fn load_tile_coords(&self, coords: &[TileCoord]) -> Result<TileCollection> {
		let mut collection = TileCollection::new(coords.iter().copied());

		for coord in coords.iter().copied() {
			if let Some(tile) = collection.get_mut(coord) {
				self.cache.load(tile, false)?;
			}
		}

		let mut by_main: HashMap<TileCoord, Vec<TileCoord>> = HashMap::new();
		for tile in collection.iter().filter(|t| t.is_missing()) {
			by_main.entry(self.main_coord(tile.coord)).or_default().push(tile.coord);
		}

		for (main_coord, members) in by_main {
			self.build_meta_tile(main_coord, &members, &mut collection).await?;
		}

		Ok(collection)
	}

	fn main_coord(&self, coord: TileCoord) -> TileCoord {
		match self.meta_size {
			Some(meta_size) => MetaGrid::new(&self.grid, meta_size, self.meta_buffer).main_coord(coord),
			None => coord,
		}
	}

	/// Builds the metatile anchored at `main_coord` and stores every one of
	/// its member tiles, following the cache-check / lock / double-check /
	/// fetch / split / store protocol. `members` is the subset of the
	/// metatile's tiles the caller actually asked for; every tile in the
	/// metatile is still built and stored, since a sibling request will need
	/// it too.
	#[context("building metatile for {main_coord}")]
	async fn build_meta_tile(&self, main_coord: TileCoord, members: &[TileCoord], collection: &mut TileCollection) -> Result<()> {
		let lock = self.cache.lock(main_coord);
		let guard = tokio::task::spawn_blocking(move || lock.lock()).await??;

		// Double-check: another process may have built this metatile while
		// we were waiting for the lock.
		let mut still_missing = Vec::new();
		for &coord in members {
			if let Some(tile) = collection.get_mut(coord) {
				if self.cache.load(tile, false)? {
					continue;
				}
			}
			still_missing.push(coord);
		}
		if still_missing.is_empty() {
			drop(guard);
			return Ok(());
		}

		let mgrid = self.meta_size.map(|meta_size| MetaGrid::new(&self.grid, meta_size, self.meta_buffer));
		let tile_offsets = match &mgrid {
			Some(mgrid) => mgrid.tiles(main_coord),
			None => vec![(main_coord, (0, 0))],
		};
		let meta_bbox = match &mgrid {
			Some(mgrid) => mgrid.meta_extent(main_coord),
			None => self.grid.tile_extent(main_coord),
		};
		let meta_size_px = match &mgrid {
			Some(mgrid) => mgrid.tile_size(main_coord.level),
			None => self.grid.tile_size,
		};

		let query = MapQuery::new(meta_bbox, meta_size_px, self.grid.srs.clone())
			.with_format(self.format.mime_type())
			.with_transparent(self.transparent);

		let meta_image = self.fetch_and_merge(&query).await?;
		let meta_image = meta_image.as_image()?;

		let splitter = TileSplitter::new(meta_image, self.format);
		for (coord, offset) in tile_offsets {
			let mut tile = Tile::new(coord);
			tile.source = Some(splitter.get_tile(offset, self.grid.tile_size)?);
			self.cache.store(&mut tile)?;
			if let Some(slot) = collection.get_mut(coord) {
				*slot = tile;
			}
		}

		drop(guard);
		Ok(())
	}

	/// Queries every configured source for `query` and composites the
	/// results bottom-to-top. A single source is the common case and takes
	/// `LayerMerger`'s passthrough fast path.
	async fn fetch_and_merge(&self, query: &MapQuery) -> Result<tilecask_image::ImageSource> {
		if self.sources.is_empty() {
			return Err(CoreError::InvalidSourceQuery("tile manager has no configured sources".into()).into());
		}
		let mut merger = LayerMerger::new();
		for source in &self.sources {
			merger.add(source.get_map(query).await?);
		}
		merger.merge_into(self.format, Some(query.size), &self.bgcolor, self.transparent)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::source::DebugSource;
	use tempfile::TempDir;
	use tilecask_core::ResolutionPolicy;

	fn manager(meta: Option<(u32, u32)>) -> (TempDir, TileManager) {
		let dir = TempDir::new().unwrap();
		let grid = Grid::new("EPSG:3857", false, None, (256, 256), ResolutionPolicy::Global, None, 1.15).unwrap();
		let cache = FileTileCache::new(dir.path().to_path_buf(), TileFormat::PNG, false).unwrap();
		let sources: Vec<Arc<dyn Source>> = vec![Arc::new(DebugSource::new(false))];
		let mut manager = TileManager::new(grid, cache, sources);
		if let Some(meta_size) = meta {
			manager = manager.with_meta_tiles(meta_size, 0);
		}
		(dir, manager)
	}

	#[tokio::test]
	async fn load_tile_coords_builds_and_caches_a_single_tile() {
		let (_dir, manager) = manager(None);
		let coord = TileCoord::new(0, 0, 2);
		let collection = manager.load_tile_coords(&[coord]).await.unwrap();
		assert!(!collection.get(coord).unwrap().is_missing());
		assert!(manager.is_cached(coord));
	}

	#[tokio::test]
	async fn second_load_is_served_from_cache_without_rebuilding() {
		let (_dir, manager) = manager(None);
		let coord = TileCoord::new(1, 1, 3);
		manager.load_tile_coords(&[coord]).await.unwrap();
		let collection = manager.load_tile_coords(&[coord]).await.unwrap();
		assert!(collection.get(coord).unwrap().stored || collection.get(coord).unwrap().location.is_some());
	}

	#[tokio::test]
	async fn meta_tile_build_fills_every_member_tile_not_just_the_one_requested() {
		let (_dir, manager) = manager(Some((2, 2)));
		let coord = TileCoord::new(0, 1, 1);
		manager.load_tile_coords(&[coord]).await.unwrap();
		for sibling in [TileCoord::new(0, 1, 1), TileCoord::new(1, 1, 1), TileCoord::new(0, 0, 1), TileCoord::new(1, 0, 1)] {
			assert!(manager.is_cached(sibling), "{sibling} should have been built alongside the requested tile");
		}
	}
}
