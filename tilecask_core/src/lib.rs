//! Grid/coordinate primitives, query types, the error taxonomy, and the
//! ambient progress/concurrency helpers shared across the tile cache
//! workspace.

pub mod concurrency;
pub mod error;
pub mod grid;
pub mod meta_grid;
pub mod progress;
pub mod query;
pub mod tile_coord;
pub mod types;

pub use concurrency::ConcurrencyLimits;
pub use error::CoreError;
pub use grid::{Extent, Grid, ResolutionPolicy};
pub use meta_grid::MetaGrid;
pub use progress::{Eta, ProgressHandle};
pub use query::{InfoQuery, MapQuery};
pub use tile_coord::TileCoord;
pub use types::*;
