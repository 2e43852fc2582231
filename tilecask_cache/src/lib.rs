//! The tile cache store, upstream clients, map-layer composites, seeding and
//! cleanup — the part of the workspace that actually builds and serves tile
//! pyramids on top of `tilecask_core`'s grid model.
//!
//! ```no_run
//! use tilecask_cache::{FileTileCache, TileManager};
//! use tilecask_core::{Grid, ResolutionPolicy, TileFormat};
//! use std::path::PathBuf;
//!
//! # fn example() -> anyhow::Result<()> {
//! let grid = Grid::new("EPSG:3857", false, None, (256, 256), ResolutionPolicy::Global, None, 1.15)?;
//! let cache = FileTileCache::new(PathBuf::from("/tmp/tilecask-cache"), TileFormat::PNG, false)?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod layer;
pub mod lock;
pub mod manager;
pub mod pool;
pub mod seed;
pub mod source;
pub mod tile;
pub mod tile_cache;

pub use client::{TmsClient, WmsClient};
pub use layer::{CacheMapLayer, DirectMapLayer, MapLayer, ResolutionConditional, SrsConditional, WmsLayer};
pub use lock::FileLock;
pub use manager::TileManager;
pub use pool::WorkerPool;
pub use seed::{CleanupTask, SeedTask};
pub use source::{DebugSource, Source, TiledSource, WmsSource};
pub use tile::{Tile, TileCollection};
pub use tile_cache::FileTileCache;
