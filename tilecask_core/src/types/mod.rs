//! Byte-buffer (`Blob`), byte-range, WGS84 bbox (`GeoBBox`), raster format
//! (`TileFormat`), constants, and size-bounded cache types shared by the cache
//! and image crates.

mod blob;
pub use blob::*;

mod byte_range;
pub use byte_range::*;

pub mod constants;

mod geo_bbox;
pub use geo_bbox::*;

mod limited_cache;
pub use limited_cache::*;

mod tile_format;
pub use tile_format::*;
