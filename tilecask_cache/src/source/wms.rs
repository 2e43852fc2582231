//! Adapts a [`WmsClient`] into a [`Source`], reprojecting the query's bbox
//! into whichever CRS the upstream endpoint actually supports when the
//! query's own SRS isn't one of the SRSes the endpoint advertises.

use super::Source;
use crate::client::WmsClient;
use crate::layer::srs_class;
use anyhow::Result;
use async_trait::async_trait;
use tilecask_core::MapQuery;
use tilecask_geometry::Coverage;
use tilecask_image::{ImageSource, ImageTransformer, Resampling};

/// A WMS-backed source. `supported_srs` is the set of CRSes the upstream
/// endpoint actually accepts; when empty, every query is passed through
/// unchanged. `transparent` and `supports_meta_tiles` mirror the upstream
/// WMS capabilities this source was configured against (a meta-tile-aware
/// WMS can answer one request per metatile instead of one per tile).
pub struct WmsSource {
	client: WmsClient,
	supported_srs: Vec<String>,
	transparent: bool,
	supports_meta_tiles: bool,
	transformer: ImageTransformer,
}

impl WmsSource {
	pub fn new(client: WmsClient, transparent: bool, supports_meta_tiles: bool) -> Self {
		WmsSource {
			client,
			supported_srs: Vec::new(),
			transparent,
			supports_meta_tiles,
			transformer: ImageTransformer::new(8, Resampling::Bilinear),
		}
	}

	/// The CRSes the upstream endpoint supports. A query outside this set is
	/// requested in the nearest supported CRS instead (exact match, then same
	/// projected/geographic class, then the first entry) and the response is
	/// reprojected back to the query's own SRS.
	pub fn with_supported_srs(mut self, supported_srs: Vec<String>) -> Self {
		self.supported_srs = supported_srs;
		self
	}
}

/// The SRS to actually request upstream for `query_srs`: itself if it's
/// supported, else the nearest supported CRS by class (mirrors
/// `SrsConditional`'s fallback chain), else `None` when nothing is
/// configured and the query should pass straight through.
fn nearest_supported_srs<'a>(supported: &'a [String], query_srs: &str) -> Option<&'a str> {
	if supported.is_empty() {
		return None;
	}
	if let Some(exact) = supported.iter().find(|s| s.as_str() == query_srs) {
		return Some(exact.as_str());
	}
	let class = srs_class(query_srs);
	if let Some(same_class) = supported.iter().find(|s| srs_class(s) == class) {
		return Some(same_class.as_str());
	}
	supported.first().map(String::as_str)
}

#[async_trait]
impl Source for WmsSource {
	fn supports_meta_tiles(&self) -> bool {
		self.supports_meta_tiles
	}

	fn transparent(&self) -> bool {
		self.transparent
	}

	async fn get_map(&self, query: &MapQuery) -> Result<ImageSource> {
		let Some(request_srs) = nearest_supported_srs(&self.supported_srs, &query.srs) else {
			return self.client.get_map(query).await;
		};
		if request_srs == query.srs {
			return self.client.get_map(query).await;
		}
		let request_srs = request_srs.to_string();

		let request_bbox = reproject_bbox(query.srs.as_str(), &request_srs, query.bbox)?;
		let request_query = MapQuery::new(request_bbox, query.size, request_srs.clone())
			.with_format(query.format.clone().unwrap_or_default())
			.with_transparent(query.transparent);
		let source = self.client.get_map(&request_query).await?;

		let dst_srs = request_srs.clone();
		let src_srs = query.srs.clone();
		let image = self.transformer.transform(source.as_image()?, request_bbox, query.size, query.bbox, false, move |x, y| {
			reproject_point(&src_srs, &dst_srs, x, y)
		})?;
		Ok(ImageSource::from_image(image, source.format()).with_transparent(self.transparent))
	}
}

fn reproject_bbox(from_srs: &str, to_srs: &str, bbox: tilecask_core::Extent) -> Result<tilecask_core::Extent> {
	if from_srs == to_srs {
		return Ok(bbox);
	}
	let coverage = tilecask_geometry::BBoxCoverage::new(bbox, from_srs)?;
	Ok(coverage.transform_to(to_srs)?.extent().bbox)
}

fn reproject_point(from_srs: &str, to_srs: &str, x: f64, y: f64) -> Result<(f64, f64)> {
	if from_srs == to_srs {
		return Ok((x, y));
	}
	let proj = proj::Proj::new_known_crs(from_srs, to_srs, None)?;
	Ok(proj.convert((x, y))?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use reqwest::Url;

	#[test]
	fn identity_reprojection_is_a_no_op() {
		let bbox = tilecask_core::Extent::new(0.0, 0.0, 10.0, 10.0).unwrap();
		assert_eq!(reproject_bbox("EPSG:3857", "EPSG:3857", bbox).unwrap(), bbox);
	}

	#[test]
	fn no_supported_srs_defaults_to_passthrough() {
		let client = WmsClient::new(Url::parse("http://example.test/wms").unwrap(), vec!["base".to_string()]).unwrap();
		let source = WmsSource::new(client, false, true);
		assert!(source.supported_srs.is_empty());
		assert!(nearest_supported_srs(&source.supported_srs, "EPSG:4326").is_none());
	}

	#[test]
	fn nearest_supported_srs_prefers_exact_then_class_then_first() {
		let supported = vec!["EPSG:25832".to_string(), "EPSG:4326".to_string()];
		assert_eq!(nearest_supported_srs(&supported, "EPSG:4326"), Some("EPSG:4326"));
		assert_eq!(nearest_supported_srs(&supported, "CRS:84"), Some("EPSG:4326"));
		assert_eq!(nearest_supported_srs(&supported, "EPSG:31467"), Some("EPSG:25832"));
	}
}
