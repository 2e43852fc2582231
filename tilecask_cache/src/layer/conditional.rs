//! Layer composites that route a query to one of several child layers
//! without serving anything themselves.

use super::MapLayer;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tilecask_core::MapQuery;
use tilecask_image::ImageSource;

/// Picks between two layers by the resolution a query is rendered at: coarse
/// requests (resolution above the threshold) go to `low_res`, fine ones to
/// `high_res`. Typically used to serve a low-detail overview layer at small
/// scales and a detailed one once the viewer has zoomed in.
pub struct ResolutionConditional {
	low_res: Arc<dyn MapLayer>,
	high_res: Arc<dyn MapLayer>,
	threshold: f64,
}

impl ResolutionConditional {
	pub fn new(low_res: Arc<dyn MapLayer>, high_res: Arc<dyn MapLayer>, threshold: f64) -> Self {
		ResolutionConditional { low_res, high_res, threshold }
	}
}

#[async_trait]
impl MapLayer for ResolutionConditional {
	async fn get_map(&self, query: &MapQuery) -> Result<ImageSource> {
		if query.resolution() > self.threshold {
			self.low_res.get_map(query).await
		} else {
			self.high_res.get_map(query).await
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SrsClass {
	Projected,
	Geographic,
}

pub(crate) fn srs_class(srs: &str) -> SrsClass {
	if srs.eq_ignore_ascii_case("EPSG:4326") || srs.eq_ignore_ascii_case("CRS:84") {
		SrsClass::Geographic
	} else {
		SrsClass::Projected
	}
}

/// Picks between layers by the SRS a query asks for: an exact SRS match
/// wins, then a same-class (projected vs. geographic) layer registered under
/// that class, then the first layer of matching class, then the first layer
/// of any kind. Mirrors mapproxy's `SRSConditional._select_layer` fallback
/// chain exactly.
pub struct SrsConditional {
	by_srs: HashMap<String, Arc<dyn MapLayer>>,
	by_class: HashMap<SrsClass, Arc<dyn MapLayer>>,
	first: Arc<dyn MapLayer>,
}

impl SrsConditional {
	/// `layers` is `(layer, srs_list)` pairs; a layer is registered under
	/// every SRS it was listed for (`SRSConditional.PROJECTED`/`GEOGRAPHIC`
	/// are represented by passing `"PROJECTED"`/`"GEOGRAPHIC"` as an srs
	/// entry instead of a concrete code).
	pub fn new(layers: Vec<(Arc<dyn MapLayer>, Vec<String>)>) -> Self {
		let mut by_srs = HashMap::new();
		let mut by_class = HashMap::new();
		let first = layers.first().expect("SrsConditional needs at least one layer").0.clone();

		for (layer, srss) in layers {
			for srs in srss {
				match srs.as_str() {
					"PROJECTED" => {
						by_class.insert(SrsClass::Projected, layer.clone());
					}
					"GEOGRAPHIC" => {
						by_class.insert(SrsClass::Geographic, layer.clone());
					}
					_ => {
						let class = srs_class(&srs);
						by_class.entry(class).or_insert_with(|| layer.clone());
						by_srs.insert(srs, layer.clone());
					}
				}
			}
		}

		SrsConditional { by_srs, by_class, first }
	}

	fn select(&self, query_srs: &str) -> Arc<dyn MapLayer> {
		if let Some(layer) = self.by_srs.get(query_srs) {
			return layer.clone();
		}
		let class = srs_class(query_srs);
		if let Some(layer) = self.by_class.get(&class) {
			return layer.clone();
		}
		self.first.clone()
	}
}

#[async_trait]
impl MapLayer for SrsConditional {
	async fn get_map(&self, query: &MapQuery) -> Result<ImageSource> {
		self.select(&query.srs).get_map(query).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::source::DebugSource;
	use tilecask_core::Extent;

	struct Stub(Arc<dyn crate::source::Source>);

	#[async_trait]
	impl MapLayer for Stub {
		async fn get_map(&self, query: &MapQuery) -> Result<ImageSource> {
			self.0.get_map(query).await
		}
	}

	fn layer() -> Arc<dyn MapLayer> {
		Arc::new(Stub(Arc::new(DebugSource::new(false))))
	}

	#[tokio::test]
	async fn resolution_conditional_picks_low_res_above_threshold() {
		let cond = ResolutionConditional::new(layer(), layer(), 10.0);
		let query = MapQuery::new(Extent::new(0.0, 0.0, 1000.0, 1000.0).unwrap(), (10, 10), "EPSG:3857");
		assert!(query.resolution() > 10.0);
		cond.get_map(&query).await.unwrap();
	}

	#[test]
	fn srs_conditional_falls_back_through_exact_class_then_first() {
		let cond = SrsConditional::new(vec![
			(layer(), vec!["EPSG:3857".to_string()]),
			(layer(), vec!["GEOGRAPHIC".to_string()]),
		]);
		assert!(cond.by_srs.contains_key("EPSG:3857"));
		assert_eq!(srs_class("EPSG:4326"), SrsClass::Geographic);
		assert_eq!(srs_class("EPSG:3857"), SrsClass::Projected);
	}
}
