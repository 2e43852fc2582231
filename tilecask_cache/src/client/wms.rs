//! A `GetMap`/`GetFeatureInfo` client for a single upstream WMS endpoint.

use super::{DEFAULT_HTTP_TIMEOUT, build_client};
use anyhow::{Context, Result, bail};
use reqwest::{Client, Url};
use std::time::Duration;
use tilecask_core::error::CoreError;
use tilecask_core::{Blob, InfoQuery, MapQuery, TileFormat};
use tilecask_derive::context;
use tilecask_image::ImageSource;

/// Geographic CRSes whose axis order WMS 1.3.0 swaps to lat/lon in `BBOX`
/// (the common case in practice; a full EPSG-registry lookup is out of
/// scope here).
const LAT_LON_SRS: &[&str] = &["EPSG:4326", "CRS:84"];

/// A client bound to one WMS endpoint, one `VERSION`, and one set of layers.
/// `GetMap`/`GetFeatureInfo` parameters that don't vary per request (layers,
/// styles, version) are fixed at construction; everything the caller
/// supplies per call lives on `MapQuery`/`InfoQuery`.
pub struct WmsClient {
	base_url: Url,
	client: Client,
	version: String,
	layers: Vec<String>,
	req_format: String,
}

impl WmsClient {
	pub fn new(base_url: Url, layers: Vec<String>) -> Result<Self> {
		Ok(WmsClient {
			base_url,
			client: build_client(DEFAULT_HTTP_TIMEOUT)?,
			version: "1.1.1".to_string(),
			layers,
			req_format: TileFormat::PNG.mime_type().to_string(),
		})
	}

	pub fn with_version(mut self, version: impl Into<String>) -> Self {
		self.version = version.into();
		self
	}

	pub fn with_format(mut self, format: TileFormat) -> Self {
		self.req_format = format.mime_type().to_string();
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
		self.client = build_client(timeout)?;
		Ok(self)
	}

	fn crs_param_name(&self) -> &'static str {
		if self.version.as_str() >= "1.3.0" { "CRS" } else { "SRS" }
	}

	fn axis_swapped(&self, srs: &str) -> bool {
		self.version.as_str() >= "1.3.0" && LAT_LON_SRS.iter().any(|s| s.eq_ignore_ascii_case(srs))
	}

	fn bbox_param(&self, query: &MapQuery) -> String {
		let b = &query.bbox;
		if self.axis_swapped(&query.srs) {
			format!("{},{},{},{}", b.y_min, b.x_min, b.y_max, b.x_max)
		} else {
			format!("{},{},{},{}", b.x_min, b.y_min, b.x_max, b.y_max)
		}
	}

	#[context("while requesting GetMap from {} for layers {:?}", self.base_url, self.layers)]
	pub async fn get_map(&self, query: &MapQuery) -> Result<ImageSource> {
		let format = query.format.clone().unwrap_or_else(|| self.req_format.clone());
		let request = self
			.client
			.get(self.base_url.clone())
			.query(&[
				("SERVICE", "WMS"),
				("REQUEST", "GetMap"),
				("VERSION", self.version.as_str()),
				("LAYERS", self.layers.join(",").as_str()),
				("STYLES", ""),
				(self.crs_param_name(), query.srs.as_str()),
				("BBOX", self.bbox_param(query).as_str()),
				("WIDTH", query.size.0.to_string().as_str()),
				("HEIGHT", query.size.1.to_string().as_str()),
				("FORMAT", format.as_str()),
				("TRANSPARENT", if query.transparent { "TRUE" } else { "FALSE" }),
			]);

		let response = request.send().await.context("sending GetMap request")?;
		let status = response.status();
		let content_type = response
			.headers()
			.get(reqwest::header::CONTENT_TYPE)
			.and_then(|v| v.to_str().ok())
			.unwrap_or("")
			.to_string();
		let bytes = response.bytes().await.context("reading GetMap response body")?;

		if !status.is_success() || !content_type.starts_with("image/") {
			let snippet = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
			bail!(CoreError::SourceError(format!(
				"GetMap returned {status} ({content_type}): {snippet}"
			)));
		}

		let response_format = TileFormat::parse_str(&content_type).unwrap_or(TileFormat::PNG);
		Ok(ImageSource::from_blob(Blob::from(&*bytes), response_format).with_transparent(query.transparent))
	}

	#[context("while requesting GetFeatureInfo from {} for layers {:?}", self.base_url, self.layers)]
	pub async fn get_info(&self, query: &InfoQuery) -> Result<Blob> {
		let bbox = MapQuery::new(query.bbox, query.size, query.srs.clone());
		let request = self.client.get(self.base_url.clone()).query(&[
			("SERVICE", "WMS"),
			("REQUEST", "GetFeatureInfo"),
			("VERSION", self.version.as_str()),
			("LAYERS", self.layers.join(",").as_str()),
			("QUERY_LAYERS", self.layers.join(",").as_str()),
			(self.crs_param_name(), query.srs.as_str()),
			("BBOX", self.bbox_param(&bbox).as_str()),
			("WIDTH", query.size.0.to_string().as_str()),
			("HEIGHT", query.size.1.to_string().as_str()),
			("X", query.pos.0.to_string().as_str()),
			("Y", query.pos.1.to_string().as_str()),
			("INFO_FORMAT", query.info_format.as_str()),
			("FEATURE_COUNT", "1"),
		]);

		let response = request.send().await.context("sending GetFeatureInfo request")?;
		if !response.status().is_success() {
			let status = response.status();
			bail!(CoreError::SourceError(format!("GetFeatureInfo returned {status}")));
		}
		let bytes = response.bytes().await.context("reading GetFeatureInfo response body")?;
		Ok(Blob::from(&*bytes))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tilecask_core::Extent;

	fn client_at(version: &str) -> WmsClient {
		WmsClient::new(Url::parse("http://example.test/wms").unwrap(), vec!["roads".to_string()])
			.unwrap()
			.with_version(version)
	}

	#[test]
	fn axis_order_swaps_only_for_geographic_srs_at_1_3_0() {
		let c = client_at("1.3.0");
		assert!(c.axis_swapped("EPSG:4326"));
		assert!(!c.axis_swapped("EPSG:3857"));
		assert!(!client_at("1.1.1").axis_swapped("EPSG:4326"));
	}

	#[test]
	fn bbox_param_swaps_axes_when_required() {
		let c = client_at("1.3.0");
		let query = MapQuery::new(Extent::new(10.0, 20.0, 30.0, 40.0).unwrap(), (256, 256), "EPSG:4326");
		assert_eq!(c.bbox_param(&query), "20,10,40,30");
	}

	#[test]
	fn crs_param_name_depends_on_version() {
		assert_eq!(client_at("1.3.0").crs_param_name(), "CRS");
		assert_eq!(client_at("1.1.1").crs_param_name(), "SRS");
	}
}
