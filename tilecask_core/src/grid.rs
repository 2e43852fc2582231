//! Tile pyramid grid: resolution levels, tile addressing, and the bbox↔tile
//! conversions the cache and seeder walk over.
//!
//! A [`Grid`] is deliberately agnostic about CRS and tiling scheme — it
//! covers an arbitrary [`Extent`] in whatever units its `srs` uses, with an
//! arbitrary list of resolutions per level. This is wider than a slippy-map
//! (implicit power-of-two, EPSG:3857) grid: mapproxy supports WMS sources
//! published in local/projected CRSes with custom resolution lists, and nothing
//! here assumes otherwise.

use crate::error::CoreError;
use crate::tile_coord::TileCoord;
use anyhow::{Result, bail, ensure};
use tilecask_derive::context;

/// A bounding box expressed in a grid's native CRS units (which may be
/// meters, not degrees) — unlike [`crate::GeoBBox`] this performs no
/// WGS84/Mercator range clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
	pub x_min: f64,
	pub y_min: f64,
	pub x_max: f64,
	pub y_max: f64,
}

impl Extent {
	pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self> {
		ensure!(
			x_min.is_finite() && y_min.is_finite() && x_max.is_finite() && y_max.is_finite(),
			"extent coordinates must be finite"
		);
		ensure!(x_min <= x_max, "x_min ({x_min}) must be <= x_max ({x_max})");
		ensure!(y_min <= y_max, "y_min ({y_min}) must be <= y_max ({y_max})");
		Ok(Extent { x_min, y_min, x_max, y_max })
	}

	pub fn width(&self) -> f64 {
		self.x_max - self.x_min
	}

	pub fn height(&self) -> f64 {
		self.y_max - self.y_min
	}

	/// Highest resolution (units/pixel) needed to draw this extent into an
	/// image of the given pixel size. Mirrors `get_resolution` in the
	/// original grid module: the *smaller* of the two axis resolutions wins,
	/// so neither axis is under-sampled.
	pub fn resolution_for_size(&self, size: (u32, u32)) -> f64 {
		let w = self.width().abs() / size.0 as f64;
		let h = self.height().abs() / size.1 as f64;
		w.min(h)
	}
}

/// How a `Grid`'s per-level resolution list is derived.
#[derive(Debug, Clone)]
pub enum ResolutionPolicy {
	/// Halve the resolution every level, starting from whatever resolution
	/// fits `tile_size` into `extent` at level 0. This is the default when a
	/// grid is built with no explicit bbox/resolutions/tile_size override.
	Global,
	/// Like `Global` but with a `sqrt(2)` factor between levels instead of
	/// `2.0`, giving twice as many levels for the same resolution range.
	Sqrt2,
	/// An explicit factor between consecutive levels.
	Factor(f64),
	/// A fully explicit, caller-provided resolution list (already sorted
	/// descending). `levels` is derived from its length.
	Custom(Vec<f64>),
}

/// A regular tile pyramid over an [`Extent`]. Level 0 holds the coarsest
/// resolution; tiles originate at the bottom-left of `extent` (row 0 is the
/// southernmost row), matching the upstream WMS/TMS convention this is
/// adapted from. Callers that need a top-left origin use
/// [`Grid::flip_tile_coord`].
#[derive(Debug, Clone)]
pub struct Grid {
	pub srs: String,
	pub is_geodetic: bool,
	pub tile_size: (u32, u32),
	pub extent: Extent,
	/// Allow a source image to be scaled up by this factor before the next,
	/// higher-resolution level is selected — trades a little blur for fewer
	/// upstream requests. Defaults to 1.15 (spec.md §9).
	pub stretch_factor: f64,
	resolutions: Vec<f64>,
	grid_sizes: Vec<(u64, u64)>,
}

impl Grid {
	/// Mirrors `TileGrid.__init__`: `extent` defaults to the full geodetic or
	/// spherical-mercator world bbox when `None`, and `resolutions` derives
	/// the level count from whichever [`ResolutionPolicy`] is chosen.
	pub fn new(
		srs: impl Into<String>,
		is_geodetic: bool,
		extent: Option<Extent>,
		tile_size: (u32, u32),
		resolutions: ResolutionPolicy,
		levels: Option<usize>,
		stretch_factor: f64,
	) -> Result<Self> {
		let srs = srs.into();
		let extent = match extent {
			Some(e) => e,
			None => default_world_extent(is_geodetic)?,
		};

		let default_levels = match resolutions {
			ResolutionPolicy::Sqrt2 => 40,
			_ => 20,
		};
		let levels = levels.unwrap_or(default_levels);

		let initial_res = (extent.width() / tile_size.0 as f64).max(extent.height() / tile_size.1 as f64);

		let resolutions = match resolutions {
			ResolutionPolicy::Global => pyramid_res_levels(initial_res, 2.0, levels),
			ResolutionPolicy::Sqrt2 => pyramid_res_levels(initial_res, std::f64::consts::SQRT_2, levels),
			ResolutionPolicy::Factor(f) => pyramid_res_levels(initial_res, f, levels),
			ResolutionPolicy::Custom(list) => {
				ensure!(!list.is_empty(), "custom resolution list must not be empty");
				list
			}
		};

		let grid_sizes = resolutions
			.iter()
			.map(|res| {
				let x = (extent.width() / res / tile_size.0 as f64).ceil() as u64;
				let y = (extent.height() / res / tile_size.1 as f64).ceil() as u64;
				(x.max(1), y.max(1))
			})
			.collect();

		Ok(Grid {
			srs,
			is_geodetic,
			tile_size,
			extent,
			stretch_factor,
			resolutions,
			grid_sizes,
		})
	}

	pub fn levels(&self) -> usize {
		self.resolutions.len()
	}

	pub fn resolution(&self, level: u8) -> f64 {
		self.resolutions[level as usize]
	}

	/// Number of tile columns/rows at `level`.
	pub fn grid_size(&self, level: u8) -> (u64, u64) {
		self.grid_sizes[level as usize]
	}

	/// Returns the coarsest (lowest-index) level whose resolution is at
	/// least as fine as `res * stretch_factor` — i.e. the level you can
	/// render at without down-scaling past the stretch budget.
	pub fn closest_level(&self, res: f64) -> u8 {
		for (level, l_res) in self.resolutions.iter().enumerate() {
			if *l_res <= res * self.stretch_factor {
				return level as u8;
			}
		}
		(self.resolutions.len() - 1) as u8
	}

	/// The (possibly out-of-range) tile addressing `(x, y)` at `level`.
	/// Callers must pass the result through [`Grid::limit_tile`] before
	/// trusting it's actually in the grid.
	pub fn tile(&self, x: f64, y: f64, level: u8) -> TileCoord {
		let res = self.resolution(level);
		let dx = x - self.extent.x_min;
		let dy = y - self.extent.y_min;
		let tx = (dx / (res * self.tile_size.0 as f64)).floor() as i64;
		let ty = (dy / (res * self.tile_size.1 as f64)).floor() as i64;
		TileCoord::new(tx, ty, level)
	}

	/// Flip between bottom-left and top-left row origin at the same level.
	pub fn flip_tile_coord(&self, coord: TileCoord) -> TileCoord {
		let (_, rows) = self.grid_size(coord.level);
		TileCoord::new(coord.x, rows as i64 - 1 - coord.y, coord.level)
	}

	/// `None` if `coord` falls outside the grid at its level.
	pub fn limit_tile(&self, coord: TileCoord) -> Option<TileCoord> {
		if coord.level as usize >= self.levels() {
			return None;
		}
		let (cols, rows) = self.grid_size(coord.level);
		if coord.x < 0 || coord.y < 0 || coord.x as u64 >= cols || coord.y as u64 >= rows {
			return None;
		}
		Some(coord)
	}

	fn south_west_point(&self, coord: TileCoord) -> (f64, f64) {
		let res = self.resolution(coord.level);
		(
			self.extent.x_min + coord.x as f64 * res * self.tile_size.0 as f64,
			self.extent.y_min + coord.y as f64 * res * self.tile_size.1 as f64,
		)
	}

	/// The extent covered by a single tile.
	pub fn tile_extent(&self, coord: TileCoord) -> Extent {
		let (x0, y0) = self.south_west_point(coord);
		let res = self.resolution(coord.level);
		Extent {
			x_min: x0,
			y_min: y0,
			x_max: x0 + res * self.tile_size.0 as f64,
			y_max: y0 + res * self.tile_size.1 as f64,
		}
	}

	/// Tiles (and their covering extent) needed to render `bbox` into an
	/// image of `size` pixels. Erodes the bbox by a tenth of a pixel on each
	/// axis first so a request that only grazes a tile's edge doesn't pull
	/// it in — the same fudge factor `get_affected_tiles` uses.
	#[context("computing affected tiles for grid {}", self.srs)]
	pub fn affected_tiles(&self, bbox: Extent, size: (u32, u32)) -> Result<(Extent, (u64, u64), Vec<Option<TileCoord>>)> {
		ensure!(size.0 > 0 && size.1 > 0, "output size must be non-zero");
		let res = bbox.resolution_for_size(size);
		let level = self.closest_level(res);

		let x_delta = bbox.width() / size.0 as f64 / 10.0;
		let y_delta = bbox.height() / size.1 as f64 / 10.0;

		let ll = self.tile(bbox.x_min + x_delta, bbox.y_min + y_delta, level);
		let ur = self.tile(bbox.x_max - x_delta, bbox.y_max - y_delta, level);

		let (x0, x1) = (ll.x.min(ur.x), ll.x.max(ur.x));
		let (y0, y1) = (ll.y.min(ur.y), ll.y.max(ur.y));

		let cols = (x1 - x0 + 1).max(0) as u64;
		let rows = (y1 - y0 + 1).max(0) as u64;
		ensure!(
			cols > 0 && rows > 0,
			CoreError::InvalidSourceQuery("bbox/size combination produced an empty tile range".into())
		);

		let south_west = self.south_west_point(TileCoord::new(x0, y0, level));
		let north_east = self.south_west_point(TileCoord::new(x1 + 1, y1 + 1, level));
		let abbox = Extent::new(south_west.0, south_west.1, north_east.0, north_east.1)?;

		let mut tiles = Vec::with_capacity((cols * rows) as usize);
		for y in (y0..=y1).rev() {
			for x in x0..=x1 {
				tiles.push(self.limit_tile(TileCoord::new(x, y, level)));
			}
		}

		Ok((abbox, (cols, rows), tiles))
	}
}

fn default_world_extent(is_geodetic: bool) -> Result<Extent> {
	if is_geodetic {
		Extent::new(-180.0, -90.0, 180.0, 90.0)
	} else {
		let circumference = 2.0 * std::f64::consts::PI * 6_378_137.0;
		let offset = circumference / 2.0;
		Extent::new(-offset, -offset, offset, offset)
	}
}

/// Resolutions of an image pyramid: `initial_res / factor^n` for `n` in
/// `0..levels`.
fn pyramid_res_levels(initial_res: f64, factor: f64, levels: usize) -> Vec<f64> {
	(0..levels).map(|n| initial_res / factor.powi(n as i32)).collect()
}

/// Reject a request that would force the cache/seeder to touch more tiles
/// than `limit` in one go.
pub fn check_tile_count(cols: u64, rows: u64, limit: u64) -> Result<()> {
	let total = cols.saturating_mul(rows);
	if total > limit {
		bail!(CoreError::TooManyTiles {
			requested: total,
			limit,
		});
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn web_mercator_grid() -> Grid {
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
	fn default_extent_is_spherical_mercator_world() {
		let grid = web_mercator_grid();
		assert!((grid.extent.x_min + 20_037_508.342789244).abs() < 1e-3);
		assert!((grid.extent.x_max - 20_037_508.342789244).abs() < 1e-3);
	}

	#[test]
	fn resolution_halves_each_level() {
		let grid = web_mercator_grid();
		let r0 = grid.resolution(0);
		let r1 = grid.resolution(1);
		assert!((r0 / r1 - 2.0).abs() < 1e-9);
	}

	#[test]
	fn closest_level_respects_stretch_factor() {
		let grid = Grid::new(
			"EPSG:3857",
			false,
			None,
			(256, 256),
			ResolutionPolicy::Global,
			None,
			1.1,
		)
		.unwrap();
		let l1_res = grid.resolution(1);
		assert_eq!(grid.closest_level(320_000.0), 0);
		assert_eq!(grid.closest_level(l1_res + 50.0), 1);
		assert_eq!(grid.closest_level(l1_res), 1);
		assert_eq!(grid.closest_level(l1_res * 0.91), 1);
		assert_eq!(grid.closest_level(l1_res * 0.89), 2);
	}

	#[test]
	fn tile_at_origin_is_zero_zero() {
		let grid = web_mercator_grid();
		let t = grid.tile(1000.0, 1000.0, 0);
		assert_eq!(t, TileCoord::new(0, 0, 0));
	}

	#[test]
	fn flip_tile_coord_round_trips() {
		let grid = web_mercator_grid();
		let t = TileCoord::new(1, 3, 2);
		let flipped = grid.flip_tile_coord(t);
		assert_eq!(grid.flip_tile_coord(flipped), t);
	}

	#[test]
	fn limit_tile_rejects_out_of_range() {
		let grid = web_mercator_grid();
		assert!(grid.limit_tile(TileCoord::new(-1, 0, 2)).is_none());
		let (cols, rows) = grid.grid_size(2);
		assert!(grid.limit_tile(TileCoord::new(cols as i64, rows as i64 - 1, 2)).is_none());
		assert!(grid.limit_tile(TileCoord::new(0, 0, 2)).is_some());
	}

	#[test]
	fn tile_extent_round_trips_through_tile() {
		let grid = web_mercator_grid();
		let coord = TileCoord::new(1, 1, 1);
		let extent = grid.tile_extent(coord);
		let back = grid.tile(extent.x_min + 1.0, extent.y_min + 1.0, 1);
		assert_eq!(back, coord);
	}

	#[test]
	fn affected_tiles_covers_whole_world_with_single_tile() {
		let grid = web_mercator_grid();
		let (_, (cols, rows), tiles) = grid.affected_tiles(grid.extent, (256, 256)).unwrap();
		assert_eq!((cols, rows), (1, 1));
		assert_eq!(tiles.len(), 1);
		assert_eq!(tiles[0], Some(TileCoord::new(0, 0, 0)));
	}

	#[test]
	fn affected_tiles_does_not_pull_in_barely_touched_neighbor() {
		let grid = web_mercator_grid();
		// A bbox that just grazes into the next tile should still resolve to
		// a single tile once the 1/10-pixel erosion is applied.
		let res = grid.resolution(1);
		let tile0 = grid.tile_extent(TileCoord::new(0, 0, 1));
		let bbox = Extent::new(
			tile0.x_min,
			tile0.y_min,
			tile0.x_max + res * 0.01,
			tile0.y_max + res * 0.01,
		)
		.unwrap();
		let (_, (cols, rows), _) = grid.affected_tiles(bbox, (256, 256)).unwrap();
		assert_eq!((cols, rows), (1, 1));
	}

	#[test]
	fn too_many_tiles_is_rejected() {
		assert!(check_tile_count(1000, 1000, 100).is_err());
		assert!(check_tile_count(10, 10, 100).is_ok());
	}

	#[test]
	fn sqrt2_policy_doubles_level_granularity() {
		let grid = Grid::new(
			"EPSG:3857",
			false,
			None,
			(256, 256),
			ResolutionPolicy::Sqrt2,
			None,
			1.15,
		)
		.unwrap();
		assert_eq!(grid.levels(), 40);
		let ratio = grid.resolution(0) / grid.resolution(2);
		assert!((ratio - 2.0).abs() < 1e-6);
	}

	#[test]
	fn custom_resolution_list_is_used_verbatim() {
		let list = vec![1000.0, 500.0, 100.0];
		let grid = Grid::new(
			"EPSG:3857",
			false,
			None,
			(256, 256),
			ResolutionPolicy::Custom(list.clone()),
			None,
			1.15,
		)
		.unwrap();
		assert_eq!(grid.levels(), 3);
		for (i, res) in list.iter().enumerate() {
			assert_eq!(grid.resolution(i as u8), *res);
		}
	}
}
