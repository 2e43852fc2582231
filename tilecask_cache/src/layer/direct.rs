//! Passes a `MapQuery`/`InfoQuery` straight through to one `Source`, with no
//! caching — used for layers that change too often to cache (live data) or
//! whose upstream is cheap enough not to bother.

use super::{InfoLayer, MapLayer};
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tilecask_core::error::CoreError;
use tilecask_core::{Blob, InfoQuery, MapQuery};
use tilecask_image::ImageSource;

pub struct DirectMapLayer {
	source: Arc<dyn crate::source::Source>,
}

impl DirectMapLayer {
	pub fn new(source: Arc<dyn crate::source::Source>) -> Self {
		DirectMapLayer { source }
	}
}

#[async_trait]
impl MapLayer for DirectMapLayer {
	async fn get_map(&self, query: &MapQuery) -> Result<ImageSource> {
		self.source.get_map(query).await
	}
}

/// A `DirectMapLayer` backed by a WMS source can also answer
/// `GetFeatureInfo`; other `Source` implementations can't, so this is kept
/// separate rather than folded into `Source` itself.
pub struct DirectInfoLayer {
	client: crate::client::WmsClient,
}

impl DirectInfoLayer {
	pub fn new(client: crate::client::WmsClient) -> Self {
		DirectInfoLayer { client }
	}
}

#[async_trait]
impl InfoLayer for DirectInfoLayer {
	async fn get_info(&self, query: &InfoQuery) -> Result<Blob> {
		if query.info_format.is_empty() {
			bail!(CoreError::InvalidSourceQuery("info_format must not be empty".into()));
		}
		self.client.get_info(query).await
	}
}
