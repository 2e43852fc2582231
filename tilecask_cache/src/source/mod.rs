//! Map-data adapters: the things a `TileManager` or `MapLayer` actually pulls
//! pixels from. Each adapter answers one `MapQuery` at a time; batching
//! requests into metatiles is the caller's job.

mod debug;
mod tiled;
mod wms;

pub use debug::DebugSource;
pub use tiled::TiledSource;
pub use wms::WmsSource;

use anyhow::Result;
use async_trait::async_trait;
use tilecask_core::MapQuery;
use tilecask_image::ImageSource;

/// A source of rendered map images for one `MapQuery` at a time.
#[async_trait]
pub trait Source: Send + Sync {
	/// True if this source can be asked for a metatile-sized image in one
	/// call (and its result cheaply split into individual tiles) rather than
	/// one request per tile.
	fn supports_meta_tiles(&self) -> bool;

	/// True if images from this source should be composited with an alpha
	/// channel (rather than padded/cropped opaque).
	fn transparent(&self) -> bool;

	async fn get_map(&self, query: &MapQuery) -> Result<ImageSource>;
}
