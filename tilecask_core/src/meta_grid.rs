//! Metatile grouping over a [`Grid`]: batches of `meta_size` tiles rendered
//! and fetched from upstream as a single larger image, then split back into
//! individual tiles. Cuts the number of upstream requests at the cost of
//! wasted edge pixels, and its `meta_buffer` absorbs label/edge artifacts
//! that would otherwise show up as seams between tiles.

use crate::grid::{Extent, Grid};
use crate::tile_coord::TileCoord;

/// Groups tiles of a `Grid` into `meta_size`-tile blocks, optionally padded
/// by `meta_buffer` pixels on every side.
#[derive(Debug, Clone)]
pub struct MetaGrid<'g> {
	grid: &'g Grid,
	meta_size: (u32, u32),
	meta_buffer: u32,
}

impl<'g> MetaGrid<'g> {
	pub fn new(grid: &'g Grid, meta_size: (u32, u32), meta_buffer: u32) -> Self {
		MetaGrid {
			grid,
			meta_size,
			meta_buffer,
		}
	}

	/// The actual `(cols, rows)` metatile grouping at `level`, clamped to the
	/// grid's own size so a metatile never claims to span more than exists
	/// (relevant for coarse levels with only one or two tiles).
	pub fn meta_size(&self, level: u8) -> (u32, u32) {
		let (cols, rows) = self.grid.grid_size(level);
		(self.meta_size.0.min(cols as u32), self.meta_size.1.min(rows as u32))
	}

	/// Pixel dimensions of the metatile image at `level`, including the
	/// buffer on both sides of each axis.
	pub fn tile_size(&self, level: u8) -> (u32, u32) {
		let meta_size = self.meta_size(level);
		if level == 0 && meta_size == (1, 1) {
			return self.grid.tile_size;
		}
		(
			self.grid.tile_size.0 * meta_size.0 + 2 * self.meta_buffer,
			self.grid.tile_size.1 * meta_size.1 + 2 * self.meta_buffer,
		)
	}

	/// The extent of the metatile that contains `coord`.
	pub fn meta_extent(&self, coord: TileCoord) -> Extent {
		let meta_size = self.meta_size(coord.level);

		if coord.level == 0 && meta_size == (1, 1) {
			return self.grid.tile_extent(TileCoord::new(0, 0, 0));
		}

		let meta_x = coord.x.div_euclid(meta_size.0 as i64);
		let meta_y = coord.y.div_euclid(meta_size.1 as i64);

		let base = self.grid.tile_extent(TileCoord::new(
			meta_x * meta_size.0 as i64,
			meta_y * meta_size.1 as i64,
			coord.level,
		));
		let width = base.width() * meta_size.0 as f64;
		let height = base.height() * meta_size.1 as f64;

		let res = self.grid.resolution(coord.level);
		let buffer = self.meta_buffer as f64 * res;

		Extent {
			x_min: base.x_min - buffer,
			y_min: base.y_min - buffer,
			x_max: base.x_min + width + buffer,
			y_max: base.y_min + height + buffer,
		}
	}

	/// The canonical main coordinate of the metatile containing `coord` —
	/// the first entry `tiles()` returns for any of that metatile's members.
	pub fn main_coord(&self, coord: TileCoord) -> TileCoord {
		self.tiles(coord)[0].0
	}

	/// All tiles belonging to the same metatile as `coord`, each paired with
	/// the upper-left pixel offset of that tile within the metatile image.
	/// Ordered top row first (matching the top-left image origin the split
	/// step crops from), left to right within a row.
	pub fn tiles(&self, coord: TileCoord) -> Vec<(TileCoord, (u32, u32))> {
		let meta_size = self.meta_size(coord.level);

		if coord.level == 0 && meta_size == (1, 1) {
			return vec![(TileCoord::new(0, 0, 0), (0, 0))];
		}

		let x0 = coord.x.div_euclid(meta_size.0 as i64) * meta_size.0 as i64;
		let y0 = coord.y.div_euclid(meta_size.1 as i64) * meta_size.1 as i64;

		let mut out = Vec::with_capacity((meta_size.0 * meta_size.1) as usize);
		for (i, y) in ((y0)..(y0 + meta_size.1 as i64)).rev().enumerate() {
			for (j, x) in (x0..(x0 + meta_size.0 as i64)).enumerate() {
				let px = j as u32 * self.grid.tile_size.0 + self.meta_buffer;
				let py = i as u32 * self.grid.tile_size.1 + self.meta_buffer;
				out.push((TileCoord::new(x, y, coord.level), (px, py)));
			}
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::grid::ResolutionPolicy;

	fn grid() -> Grid {
		Grid::new(
			"EPSG:3857",
			false,
			None,
			(256, 256),
			ResolutionPolicy::Global,
			None,
			1.15,
		)
		.unwrap()
	}

	#[test]
	fn meta_bbox_covers_whole_meta_block() {
		let grid = grid();
		let mgrid = MetaGrid::new(&grid, (2, 2), 0);
		let extent = mgrid.meta_extent(TileCoord::new(0, 0, 2));
		let full = grid.tile_extent(TileCoord::new(0, 0, 0));
		assert!((extent.x_min - full.x_min).abs() < 1e-6);
		assert!((extent.y_min - full.y_min).abs() < 1e-6);
	}

	#[test]
	fn level_zero_degenerates_to_single_tile() {
		let grid = grid();
		let mgrid = MetaGrid::new(&grid, (2, 2), 0);
		let extent = mgrid.meta_extent(TileCoord::new(0, 0, 0));
		assert_eq!(extent, grid.tile_extent(TileCoord::new(0, 0, 0)));
		assert_eq!(mgrid.tiles(TileCoord::new(0, 0, 0)), vec![(TileCoord::new(0, 0, 0), (0, 0))]);
	}

	#[test]
	fn tiles_enumerates_whole_meta_block_without_gaps() {
		let grid = grid();
		let mgrid = MetaGrid::new(&grid, (2, 2), 0);
		let tiles = mgrid.tiles(TileCoord::new(0, 1, 1));
		assert_eq!(tiles.len(), 4);
		assert_eq!(tiles[0], (TileCoord::new(0, 1, 1), (0, 0)));
		assert_eq!(tiles[3], (TileCoord::new(1, 0, 1), (256, 256)));
	}

	#[test]
	fn tile_size_includes_buffer_on_both_sides() {
		let grid = grid();
		let mgrid = MetaGrid::new(&grid, (2, 2), 10);
		assert_eq!(mgrid.tile_size(2), (532, 532));
		assert_eq!(mgrid.tile_size(0), (256, 256));
	}

	#[test]
	fn coarse_level_clamps_meta_size_to_grid_size() {
		let grid = grid();
		let mgrid = MetaGrid::new(&grid, (4, 4), 0);
		assert_eq!(mgrid.meta_size(0), (1, 1));
	}
}
