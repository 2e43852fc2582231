//! Recursive pyramid descent over a grid's levels, pruning subtrees a
//! coverage rules out entirely and skipping further coverage tests once a
//! subtree is already known to lie fully inside it. Mirrors mapproxy's
//! `TileWalker`: `CONTAINS` short-circuits the geometry test for every
//! descendant, `INTERSECTS` keeps testing each child, `NONE` prunes.
//!
//! When `with_meta_tiles` is set, the whole descent — node extents,
//! coverage classification, and what gets dispatched to `visit` — operates
//! on metatile main-coordinates instead of individual grid tiles, exactly
//! as mapproxy's own seeder walks a `MetaGrid` rather than the raw grid.
//! Coverage classification always uses an unbuffered metatile extent (a
//! buffer is a rendering detail, not a spatial one), matching mapproxy's
//! `MetaGrid(..., meta_buffer=0)` for the walk.

use anyhow::Result;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tilecask_core::{Extent, MetaGrid, ProgressHandle, TileCoord};
use tilecask_geometry::Coverage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
	Contains,
	Intersects,
	None,
}

/// Walks every tile (or metatile, see `with_meta_tiles`) at the requested
/// levels that isn't ruled out by `coverage`, calling `visit` once per
/// qualifying node in depth-first, coarse-to-fine order.
pub struct TileWalker<'g> {
	grid: &'g tilecask_core::Grid,
	coverage: Option<Arc<dyn Coverage>>,
	levels: Vec<u8>,
	/// Levels within this many steps of the finest requested level stop
	/// paying for geometry tests and are treated as fully contained —
	/// mirrors `seed.seed_levels`'s `skip_geoms_for_last_levels`.
	skip_geoms_for_last_levels: u8,
	meta_size: Option<(u32, u32)>,
}

impl<'g> TileWalker<'g> {
	pub fn new(grid: &'g tilecask_core::Grid, coverage: Option<Arc<dyn Coverage>>, mut levels: Vec<u8>) -> Self {
		levels.sort_unstable();
		levels.dedup();
		TileWalker { grid, coverage, levels, skip_geoms_for_last_levels: 0, meta_size: None }
	}

	pub fn with_skip_geoms_for_last_levels(mut self, n: u8) -> Self {
		self.skip_geoms_for_last_levels = n;
		self
	}

	/// Walks by metatile main-coordinate instead of by raw grid tile, so a
	/// seed run dispatches (and locks) one job per metatile rather than one
	/// per individual tile.
	pub fn with_meta_tiles(mut self, meta_size: (u32, u32)) -> Self {
		self.meta_size = Some(meta_size);
		self
	}

	fn meta_grid(&self) -> Option<MetaGrid<'g>> {
		self.meta_size.map(|size| MetaGrid::new(self.grid, size, 0))
	}

	/// The extent a node is classified/descended by: the whole metatile
	/// when meta-tiling, else the single tile's own extent.
	fn node_extent(&self, coord: TileCoord) -> Extent {
		match self.meta_grid() {
			Some(mgrid) => mgrid.meta_extent(coord),
			None => self.grid.tile_extent(coord),
		}
	}

	/// The canonical node identity for `coord`: its metatile's main
	/// coordinate when meta-tiling, else `coord` itself.
	fn main_coord(&self, coord: TileCoord) -> TileCoord {
		match self.meta_grid() {
			Some(mgrid) => mgrid.main_coord(coord),
			None => coord,
		}
	}

	fn classify(&self, bbox: Extent) -> Result<Classification> {
		match &self.coverage {
			None => Ok(Classification::Contains),
			Some(coverage) => {
				if coverage.contains(bbox, &self.grid.srs)? {
					Ok(Classification::Contains)
				} else if coverage.intersects(bbox, &self.grid.srs)? {
					Ok(Classification::Intersects)
				} else {
					Ok(Classification::None)
				}
			}
		}
	}

	/// Every node at `child_level` whose extent overlaps `coord`'s extent,
	/// found the same way `Grid::affected_tiles` finds a bbox's tile range,
	/// then collapsed to distinct metatile main-coordinates when meta-tiling.
	fn children(&self, coord: TileCoord, child_level: u8) -> Vec<TileCoord> {
		let bbox = self.node_extent(coord);
		let eps_x = (bbox.width() / 1e6).max(f64::EPSILON);
		let eps_y = (bbox.height() / 1e6).max(f64::EPSILON);
		let a = self.grid.tile(bbox.x_min + eps_x, bbox.y_min + eps_y, child_level);
		let b = self.grid.tile(bbox.x_max - eps_x, bbox.y_max - eps_y, child_level);
		let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
		let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));

		let mut out = Vec::new();
		let mut seen = HashSet::new();
		for y in y0..=y1 {
			for x in x0..=x1 {
				let Some(c) = self.grid.limit_tile(TileCoord::new(x, y, child_level)) else {
					continue;
				};
				let main = self.main_coord(c);
				if seen.insert(main) {
					out.push(main);
				}
			}
		}
		out
	}

	fn next_level_after(&self, level: u8) -> Option<u8> {
		self.levels.iter().copied().find(|&l| l > level)
	}

	pub async fn walk<F, Fut>(&self, progress: &ProgressHandle, mut visit: F) -> Result<()>
	where
		F: FnMut(TileCoord) -> Fut,
		Fut: Future<Output = Result<()>>,
	{
		let Some(&top) = self.levels.first() else {
			return Ok(());
		};
		let bottom = *self.levels.last().unwrap();

		let (cols, rows) = self.grid.grid_size(top);
		let (step_x, step_y) = self.meta_grid().map(|g| g.meta_size(top)).unwrap_or((1, 1));

		let mut stack: Vec<(TileCoord, bool)> = Vec::new();
		let mut seen = HashSet::new();
		let mut y = 0i64;
		while (y as u64) < rows {
			let mut x = 0i64;
			while (x as u64) < cols {
				let main = self.main_coord(TileCoord::new(x, y, top));
				if seen.insert(main) {
					stack.push((main, false));
				}
				x += step_x as i64;
			}
			y += step_y as i64;
		}

		while let Some((coord, always_include)) = stack.pop() {
			let near_bottom = coord.level + self.skip_geoms_for_last_levels >= bottom;
			let classification = if always_include || near_bottom {
				Classification::Contains
			} else {
				self.classify(self.node_extent(coord))?
			};
			if classification == Classification::None {
				continue;
			}

			if self.levels.contains(&coord.level) {
				progress.inc(1);
				visit(coord).await?;
			}

			if let Some(next_level) = self.next_level_after(coord.level) {
				let child_always_include = classification == Classification::Contains;
				for child in self.children(coord, next_level) {
					stack.push((child, child_always_include));
				}
			}
		}

		Ok(())
	}
}
