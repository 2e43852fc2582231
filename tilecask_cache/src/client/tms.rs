//! A `GET <base>/<z>/<x>/<y>.<ext>` client for XYZ/TMS-style tile endpoints.

use super::{DEFAULT_HTTP_TIMEOUT, build_client};
use anyhow::{Context, Result, bail};
use reqwest::{Client, Url};
use std::time::Duration;
use tilecask_core::TileCoord;
use tilecask_core::error::CoreError;
use tilecask_core::{Blob, TileFormat};
use tilecask_derive::context;
use tilecask_image::ImageSource;

/// A client bound to one tile endpoint template. `origin_top_left` controls
/// whether `y` is flipped before substitution: true for XYZ-style servers
/// (row 0 at the top), false for TMS proper (row 0 at the bottom, matching
/// this workspace's own `TileCoord`/`Grid` convention).
pub struct TmsClient {
	base_url: Url,
	client: Client,
	format: TileFormat,
	origin_top_left: bool,
}

impl TmsClient {
	pub fn new(base_url: Url, format: TileFormat) -> Result<Self> {
		Ok(TmsClient {
			base_url,
			client: build_client(DEFAULT_HTTP_TIMEOUT)?,
			format,
			origin_top_left: true,
		})
	}

	pub fn with_origin_top_left(mut self, origin_top_left: bool) -> Self {
		self.origin_top_left = origin_top_left;
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
		self.client = build_client(timeout)?;
		Ok(self)
	}

	fn tile_url(&self, coord: TileCoord) -> Url {
		let y = if self.origin_top_left {
			let tiles_per_axis: i64 = 1i64 << coord.level;
			tiles_per_axis - 1 - coord.y
		} else {
			coord.y
		};
		let mut url = self.base_url.clone();
		{
			let mut segments = url.path_segments_mut().expect("base_url must not be a cannot-be-a-base URL");
			segments.push(&coord.level.to_string());
			segments.push(&coord.x.to_string());
			segments.push(&format!("{y}{}", self.format.extension()));
		}
		url
	}

	#[context("while fetching tile {} from {}", coord, self.base_url)]
	pub async fn get_tile(&self, coord: TileCoord) -> Result<ImageSource> {
		let url = self.tile_url(coord);
		let response = self.client.get(url.clone()).send().await.context("sending tile request")?;
		let status = response.status();
		if !status.is_success() {
			bail!(CoreError::SourceError(format!("tile request to {url} returned {status}")));
		}
		let bytes = response.bytes().await.context("reading tile response body")?;
		Ok(ImageSource::from_blob(Blob::from(&*bytes), self.format))
	}
}
