//! Tile coordinates addressed by an arbitrary [`crate::Grid`].
//!
//! Unlike a slippy-map coordinate, `TileCoord` carries no assumption that the
//! grid it indexes into is power-of-two or global — `level` is just whichever
//! index a `Grid`'s resolution list uses.

use std::fmt;

/// A single tile's address within a grid: column, row, and pyramid level.
///
/// `x`/`y` are signed so intermediate arithmetic (e.g. expanding a bbox to
/// its covering tile range) can go negative before being checked against the
/// grid's bounds via [`crate::Grid::limit_tile`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
	pub x: i64,
	pub y: i64,
	pub level: u8,
}

impl TileCoord {
	pub fn new(x: i64, y: i64, level: u8) -> Self {
		TileCoord { x, y, level }
	}
}

impl fmt::Debug for TileCoord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TileCoord({}, {}, z{})", self.x, self.y, self.level)
	}
}

impl fmt::Display for TileCoord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}/{}", self.level, self.x, self.y)
	}
}
