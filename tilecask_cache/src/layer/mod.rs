//! `MapLayer` composites: the pieces a server endpoint would dispatch a
//! `GetMap`/`GetFeatureInfo` request to. Mirrors mapproxy's `core/layer.py` /
//! `wms/layer.py`: a cached layer backed by a `TileManager`, a direct
//! pass-through to a `Source`, and two routing composites that pick between
//! child layers without serving anything themselves.

mod cache;
mod conditional;
mod direct;
mod wms;

pub use cache::CacheMapLayer;
pub use conditional::{ResolutionConditional, SrsConditional};
pub(crate) use conditional::srs_class;
pub use direct::{DirectInfoLayer, DirectMapLayer};
pub use wms::WmsLayer;

use anyhow::Result;
use async_trait::async_trait;
use tilecask_core::{InfoQuery, MapQuery};
use tilecask_image::ImageSource;

/// A layer that can render a `MapQuery`. Composites (`ResolutionConditional`,
/// `SrsConditional`) implement this by delegating to whichever child layer
/// their routing rule selects.
#[async_trait]
pub trait MapLayer: Send + Sync {
	async fn get_map(&self, query: &MapQuery) -> Result<ImageSource>;
}

/// A layer that can additionally answer `GetFeatureInfo`-style queries.
/// Implemented only by layers whose underlying source actually supports it
/// (`CacheMapLayer`/`DirectMapLayer`/`WmsLayer`, not the routing composites).
#[async_trait]
pub trait InfoLayer: Send + Sync {
	async fn get_info(&self, query: &InfoQuery) -> Result<tilecask_core::Blob>;
}
