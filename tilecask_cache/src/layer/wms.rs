//! A layer backed directly by a `WmsClient`, combining `GetMap` and
//! `GetFeatureInfo` in one type since both come from the same upstream
//! endpoint. Equivalent to pairing a `DirectMapLayer`/`DirectInfoLayer` over
//! a `WmsSource`, but saves callers who only ever talk WMS from wiring the
//! two up separately.

use super::{InfoLayer, MapLayer};
use anyhow::Result;
use async_trait::async_trait;
use tilecask_core::{Blob, InfoQuery, MapQuery};
use tilecask_image::ImageSource;

pub struct WmsLayer {
	client: crate::client::WmsClient,
}

impl WmsLayer {
	pub fn new(client: crate::client::WmsClient) -> Self {
		WmsLayer { client }
	}
}

#[async_trait]
impl MapLayer for WmsLayer {
	async fn get_map(&self, query: &MapQuery) -> Result<ImageSource> {
		self.client.get_map(query).await
	}
}

#[async_trait]
impl InfoLayer for WmsLayer {
	async fn get_info(&self, query: &InfoQuery) -> Result<Blob> {
		self.client.get_info(query).await
	}
}
