use super::{Coverage, CoverageExtent, bbox_contains, bbox_intersects, llbbox_of, reproject_extent};
use anyhow::Result;
use tilecask_core::Extent;

/// A coverage defined by a single rectangle in some SRS.
///
/// Grounded on mapproxy's `BBOXCoverage`: incoming queries are reprojected
/// into this coverage's own SRS before the (axis-aligned) containment or
/// intersection test runs.
pub struct BBoxCoverage {
	bbox: Extent,
	srs: String,
	extent: CoverageExtent,
}

impl BBoxCoverage {
	pub fn new(bbox: Extent, srs: impl Into<String>) -> Result<Self> {
		let srs = srs.into();
		let llbbox = llbbox_of(&srs, bbox)?;
		Ok(Self { bbox, extent: CoverageExtent { bbox, llbbox }, srs })
	}

	pub fn bbox(&self) -> Extent {
		self.bbox
	}
}

impl Coverage for BBoxCoverage {
	fn srs(&self) -> &str {
		&self.srs
	}

	fn contains(&self, bbox: Extent, srs: &str) -> Result<bool> {
		let bbox = reproject_extent(srs, &self.srs, bbox)?;
		Ok(bbox_contains(self.bbox, bbox))
	}

	fn intersects(&self, bbox: Extent, srs: &str) -> Result<bool> {
		let bbox = reproject_extent(srs, &self.srs, bbox)?;
		Ok(bbox_intersects(self.bbox, bbox))
	}

	fn transform_to(&self, srs: &str) -> Result<Box<dyn Coverage>> {
		if srs == self.srs {
			return Ok(Box::new(BBoxCoverage { bbox: self.bbox, srs: self.srs.clone(), extent: self.extent }));
		}
		let bbox = reproject_extent(&self.srs, srs, self.bbox)?;
		Ok(Box::new(BBoxCoverage::new(bbox, srs)?))
	}

	fn extent(&self) -> &CoverageExtent {
		&self.extent
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn contains_requires_full_overlap_in_same_srs() {
		let outer = BBoxCoverage::new(Extent::new(0.0, 0.0, 10.0, 10.0).unwrap(), "EPSG:3857").unwrap();
		let inner = Extent::new(2.0, 2.0, 8.0, 8.0).unwrap();
		let partial = Extent::new(-1.0, 2.0, 8.0, 8.0).unwrap();
		assert!(outer.contains(inner, "EPSG:3857").unwrap());
		assert!(!outer.contains(partial, "EPSG:3857").unwrap());
	}

	#[test]
	fn intersects_detects_disjoint_bbox() {
		let cov = BBoxCoverage::new(Extent::new(0.0, 0.0, 10.0, 10.0).unwrap(), "EPSG:3857").unwrap();
		let disjoint = Extent::new(20.0, 20.0, 30.0, 30.0).unwrap();
		assert!(!cov.intersects(disjoint, "EPSG:3857").unwrap());
	}

	#[test]
	fn transform_to_same_srs_is_a_no_op() {
		let cov = BBoxCoverage::new(Extent::new(0.0, 0.0, 10.0, 10.0).unwrap(), "EPSG:3857").unwrap();
		let same = cov.transform_to("EPSG:3857").unwrap();
		assert_eq!(same.srs(), "EPSG:3857");
	}
}
