use super::{Coverage, CoverageExtent};
use anyhow::{Result, ensure};
use tilecask_core::Extent;

/// Aggregates several coverages as their union: contained/intersected if any
/// member is. Grounded on mapproxy's `MultiCoverage`.
pub struct MultiCoverage {
	coverages: Vec<Box<dyn Coverage>>,
	extent: CoverageExtent,
}

impl MultiCoverage {
	pub fn new(coverages: Vec<Box<dyn Coverage>>) -> Result<Self> {
		ensure!(!coverages.is_empty(), "a MultiCoverage needs at least one member coverage");
		let mut extent = *coverages[0].extent();
		for coverage in &coverages[1..] {
			extent = extent + *coverage.extent();
		}
		Ok(Self { coverages, extent })
	}
}

impl Coverage for MultiCoverage {
	fn srs(&self) -> &str {
		self.coverages[0].srs()
	}

	fn contains(&self, bbox: Extent, srs: &str) -> Result<bool> {
		for coverage in &self.coverages {
			if coverage.contains(bbox, srs)? {
				return Ok(true);
			}
		}
		Ok(false)
	}

	fn intersects(&self, bbox: Extent, srs: &str) -> Result<bool> {
		for coverage in &self.coverages {
			if coverage.intersects(bbox, srs)? {
				return Ok(true);
			}
		}
		Ok(false)
	}

	fn transform_to(&self, srs: &str) -> Result<Box<dyn Coverage>> {
		let transformed = self.coverages.iter().map(|c| c.transform_to(srs)).collect::<Result<Vec<_>>>()?;
		Ok(Box::new(MultiCoverage::new(transformed)?))
	}

	fn extent(&self) -> &CoverageExtent {
		&self.extent
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::coverage::BBoxCoverage;

	#[test]
	fn contains_is_true_if_any_member_contains() {
		let a = BBoxCoverage::new(Extent::new(0.0, 0.0, 10.0, 10.0).unwrap(), "EPSG:3857").unwrap();
		let b = BBoxCoverage::new(Extent::new(100.0, 100.0, 110.0, 110.0).unwrap(), "EPSG:3857").unwrap();
		let multi = MultiCoverage::new(vec![Box::new(a), Box::new(b)]).unwrap();
		assert!(multi.contains(Extent::new(2.0, 2.0, 8.0, 8.0).unwrap(), "EPSG:3857").unwrap());
		assert!(!multi.contains(Extent::new(200.0, 200.0, 210.0, 210.0).unwrap(), "EPSG:3857").unwrap());
	}

	#[test]
	fn empty_multi_coverage_is_rejected() {
		assert!(MultiCoverage::new(vec![]).is_err());
	}
}
