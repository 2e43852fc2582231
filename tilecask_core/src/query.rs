//! Query types passed down from a `MapLayer` to a `Source`: what extent,
//! size, and CRS a map or feature-info request is for.

use crate::grid::Extent;

/// A request for a rendered map image over `bbox` at `size` pixels in `srs`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapQuery {
	pub bbox: Extent,
	pub size: (u32, u32),
	pub srs: String,
	pub format: Option<String>,
	pub transparent: bool,
}

impl MapQuery {
	pub fn new(bbox: Extent, size: (u32, u32), srs: impl Into<String>) -> Self {
		MapQuery {
			bbox,
			size,
			srs: srs.into(),
			format: None,
			transparent: false,
		}
	}

	pub fn with_format(mut self, format: impl Into<String>) -> Self {
		self.format = Some(format.into());
		self
	}

	pub fn with_transparent(mut self, transparent: bool) -> Self {
		self.transparent = transparent;
		self
	}

	/// Resolution (units/pixel) this query is asking to be rendered at, the
	/// smaller of the two axis resolutions so neither is under-sampled.
	pub fn resolution(&self) -> f64 {
		self.bbox.resolution_for_size(self.size)
	}
}

/// A `GetFeatureInfo`-style request: a map query plus the pixel position
/// clicked and the desired response format. Response encoding (e.g. GML,
/// text) stays out of scope here — this only carries the query itself.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoQuery {
	pub bbox: Extent,
	pub size: (u32, u32),
	pub srs: String,
	pub pos: (u32, u32),
	pub info_format: String,
}

impl InfoQuery {
	pub fn new(bbox: Extent, size: (u32, u32), srs: impl Into<String>, pos: (u32, u32), info_format: impl Into<String>) -> Self {
		InfoQuery {
			bbox,
			size,
			srs: srs.into(),
			pos,
			info_format: info_format.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn map_query_resolution_picks_finer_axis() {
		let bbox = Extent::new(0.0, 0.0, 100.0, 50.0).unwrap();
		let query = MapQuery::new(bbox, (100, 100), "EPSG:3857");
		// x: 100/100=1.0, y: 50/100=0.5 -> min is 0.5
		assert!((query.resolution() - 0.5).abs() < 1e-9);
	}

	#[test]
	fn builder_methods_set_optional_fields() {
		let bbox = Extent::new(0.0, 0.0, 1.0, 1.0).unwrap();
		let query = MapQuery::new(bbox, (10, 10), "EPSG:4326")
			.with_format("image/png")
			.with_transparent(true);
		assert_eq!(query.format.as_deref(), Some("image/png"));
		assert!(query.transparent);
	}
}
