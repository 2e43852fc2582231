//! Coverage predicates over `(bbox, srs)`: the bounding-box and polygon-backed
//! implementations that the seeder and cleanup walkers test candidate tiles
//! against, plus a composite for aggregating several of them.
//!
//! Reprojecting a coordinate between two SRS is delegated to `proj`; the
//! actual polygon containment/intersection math is delegated to the `geo`
//! crate's algorithms rather than reimplemented here.

mod bbox;
mod multi;
mod polygon;

pub use bbox::BBoxCoverage;
pub use multi::MultiCoverage;
pub use polygon::GeoCoverage;

use anyhow::Result;
use tilecask_core::{Extent, GeoBBox};
use tilecask_derive::context;

/// A bbox and its WGS84 equivalent, returned by [`Coverage::extent`].
#[derive(Debug, Clone, Copy)]
pub struct CoverageExtent {
	pub bbox: Extent,
	pub llbbox: GeoBBox,
}

impl std::ops::Add for CoverageExtent {
	type Output = CoverageExtent;

	fn add(self, rhs: CoverageExtent) -> CoverageExtent {
		CoverageExtent {
			bbox: Extent {
				x_min: self.bbox.x_min.min(rhs.bbox.x_min),
				y_min: self.bbox.y_min.min(rhs.bbox.y_min),
				x_max: self.bbox.x_max.max(rhs.bbox.x_max),
				y_max: self.bbox.y_max.max(rhs.bbox.y_max),
			},
			llbbox: GeoBBox::new(
				self.llbbox.x_min.min(rhs.llbbox.x_min),
				self.llbbox.y_min.min(rhs.llbbox.y_min),
				self.llbbox.x_max.max(rhs.llbbox.x_max),
				self.llbbox.y_max.max(rhs.llbbox.y_max),
			)
			.expect("union of two valid GeoBBoxes is always a valid GeoBBox"),
		}
	}
}

/// An opaque predicate over `(bbox, srs)`.
///
/// Implementations decide containment/intersection against whatever shape
/// they were built from; callers never need to know whether that shape is a
/// rectangle or an arbitrary polygon.
pub trait Coverage: Send + Sync {
	/// The SRS this coverage's own geometry is stored in.
	fn srs(&self) -> &str;

	/// True if `bbox` (given in `srs`) lies entirely within this coverage.
	fn contains(&self, bbox: Extent, srs: &str) -> Result<bool>;

	/// True if `bbox` (given in `srs`) overlaps this coverage at all.
	fn intersects(&self, bbox: Extent, srs: &str) -> Result<bool>;

	/// Returns an equivalent coverage with its geometry reprojected into `srs`.
	fn transform_to(&self, srs: &str) -> Result<Box<dyn Coverage>>;

	/// This coverage's own bbox, plus its WGS84 (lat/long) equivalent.
	fn extent(&self) -> &CoverageExtent;
}

#[context("reprojecting point from {from_srs} to {to_srs}")]
fn reproject_point(from_srs: &str, to_srs: &str, x: f64, y: f64) -> Result<(f64, f64)> {
	if from_srs == to_srs {
		return Ok((x, y));
	}
	let proj = proj::Proj::new_known_crs(from_srs, to_srs, None)?;
	Ok(proj.convert((x, y))?)
}

fn reproject_extent(from_srs: &str, to_srs: &str, bbox: Extent) -> Result<Extent> {
	if from_srs == to_srs {
		return Ok(bbox);
	}
	let (x_min, y_min) = reproject_point(from_srs, to_srs, bbox.x_min, bbox.y_min)?;
	let (x_max, y_max) = reproject_point(from_srs, to_srs, bbox.x_max, bbox.y_max)?;
	Extent::new(x_min.min(x_max), y_min.min(y_max), x_min.max(x_max), y_min.max(y_max))
}

fn llbbox_of(srs: &str, bbox: Extent) -> Result<GeoBBox> {
	let wgs84 = reproject_extent(srs, "EPSG:4326", bbox)?;
	Ok(GeoBBox::new(wgs84.x_min, wgs84.y_min, wgs84.x_max, wgs84.y_max)?)
}

fn bbox_intersects(a: Extent, b: Extent) -> bool {
	a.x_min < b.x_max && a.x_max > b.x_min && a.y_min < b.y_max && a.y_max > b.y_min
}

fn bbox_contains(outer: Extent, inner: Extent) -> bool {
	outer.x_min <= inner.x_min && outer.y_min <= inner.y_min && outer.x_max >= inner.x_max && outer.y_max >= inner.y_max
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bbox_intersects_detects_overlap_and_disjoint() {
		let a = Extent::new(0.0, 0.0, 10.0, 10.0).unwrap();
		let b = Extent::new(5.0, 5.0, 15.0, 15.0).unwrap();
		let c = Extent::new(20.0, 20.0, 30.0, 30.0).unwrap();
		assert!(bbox_intersects(a, b));
		assert!(!bbox_intersects(a, c));
	}

	#[test]
	fn bbox_contains_requires_full_coverage() {
		let outer = Extent::new(0.0, 0.0, 10.0, 10.0).unwrap();
		let inner = Extent::new(2.0, 2.0, 8.0, 8.0).unwrap();
		let partial = Extent::new(-1.0, 2.0, 8.0, 8.0).unwrap();
		assert!(bbox_contains(outer, inner));
		assert!(!bbox_contains(outer, partial));
	}
}
