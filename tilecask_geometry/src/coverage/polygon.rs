use super::{Coverage, CoverageExtent, llbbox_of, reproject_point};
use anyhow::Result;
use geo::{BoundingRect, Contains, Coord, Intersects, LineString, MultiPolygon, Polygon, Rect};
use tilecask_core::Extent;

/// A coverage defined by an arbitrary polygon (or multipolygon) in some SRS.
///
/// Grounded on mapproxy's `GeomCoverage`: incoming bboxes are turned into a
/// rectangle polygon in this coverage's own SRS, then tested against the
/// stored geometry with `geo`'s `Contains`/`Intersects` algorithms — the
/// polygon math itself is treated as a black box here.
pub struct GeoCoverage {
	geom: MultiPolygon<f64>,
	srs: String,
	extent: CoverageExtent,
}

impl GeoCoverage {
	pub fn new(geom: MultiPolygon<f64>, srs: impl Into<String>) -> Result<Self> {
		let srs = srs.into();
		let bbox = bbox_of(&geom)?;
		let llbbox = llbbox_of(&srs, bbox)?;
		Ok(Self { geom, extent: CoverageExtent { bbox, llbbox }, srs })
	}

	pub fn geom(&self) -> &MultiPolygon<f64> {
		&self.geom
	}
}

impl Coverage for GeoCoverage {
	fn srs(&self) -> &str {
		&self.srs
	}

	fn contains(&self, bbox: Extent, srs: &str) -> Result<bool> {
		let poly = bbox_polygon_in(srs, &self.srs, bbox)?;
		Ok(self.geom.contains(&poly))
	}

	fn intersects(&self, bbox: Extent, srs: &str) -> Result<bool> {
		let poly = bbox_polygon_in(srs, &self.srs, bbox)?;
		Ok(self.geom.intersects(&poly))
	}

	fn transform_to(&self, srs: &str) -> Result<Box<dyn Coverage>> {
		if srs == self.srs {
			return Ok(Box::new(GeoCoverage { geom: self.geom.clone(), srs: self.srs.clone(), extent: self.extent }));
		}
		let geom = reproject_multipolygon(&self.srs, srs, &self.geom)?;
		Ok(Box::new(GeoCoverage::new(geom, srs)?))
	}

	fn extent(&self) -> &CoverageExtent {
		&self.extent
	}
}

fn bbox_of(geom: &MultiPolygon<f64>) -> Result<Extent> {
	let rect = geom.bounding_rect().ok_or_else(|| anyhow::anyhow!("coverage polygon has no bounding rect (empty geometry?)"))?;
	Extent::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
}

fn bbox_polygon_in(from_srs: &str, to_srs: &str, bbox: Extent) -> Result<Polygon<f64>> {
	let (x_min, y_min) = reproject_point(from_srs, to_srs, bbox.x_min, bbox.y_min)?;
	let (x_max, y_max) = reproject_point(from_srs, to_srs, bbox.x_max, bbox.y_max)?;
	Ok(Rect::new(Coord { x: x_min, y: y_min }, Coord { x: x_max, y: y_max }).to_polygon())
}

fn reproject_line_string(from_srs: &str, to_srs: &str, line: &LineString<f64>) -> Result<LineString<f64>> {
	let coords = line
		.coords()
		.map(|c| reproject_point(from_srs, to_srs, c.x, c.y).map(|(x, y)| Coord { x, y }))
		.collect::<Result<Vec<_>>>()?;
	Ok(LineString::new(coords))
}

fn reproject_polygon(from_srs: &str, to_srs: &str, polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
	let exterior = reproject_line_string(from_srs, to_srs, polygon.exterior())?;
	let interiors = polygon.interiors().iter().map(|ring| reproject_line_string(from_srs, to_srs, ring)).collect::<Result<Vec<_>>>()?;
	Ok(Polygon::new(exterior, interiors))
}

fn reproject_multipolygon(from_srs: &str, to_srs: &str, geom: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
	let polygons = geom.iter().map(|polygon| reproject_polygon(from_srs, to_srs, polygon)).collect::<Result<Vec<_>>>()?;
	Ok(MultiPolygon::new(polygons))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn square(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> MultiPolygon<f64> {
		MultiPolygon::new(vec![Rect::new(Coord { x: x_min, y: y_min }, Coord { x: x_max, y: y_max }).to_polygon()])
	}

	#[test]
	fn contains_tests_bbox_against_polygon() {
		let cov = GeoCoverage::new(square(0.0, 0.0, 10.0, 10.0), "EPSG:3857").unwrap();
		assert!(cov.contains(Extent::new(2.0, 2.0, 8.0, 8.0).unwrap(), "EPSG:3857").unwrap());
		assert!(!cov.contains(Extent::new(-1.0, 2.0, 8.0, 8.0).unwrap(), "EPSG:3857").unwrap());
	}

	#[test]
	fn intersects_detects_disjoint_bbox() {
		let cov = GeoCoverage::new(square(0.0, 0.0, 10.0, 10.0), "EPSG:3857").unwrap();
		assert!(!cov.intersects(Extent::new(20.0, 20.0, 30.0, 30.0).unwrap(), "EPSG:3857").unwrap());
	}

	#[test]
	fn transform_to_same_srs_is_a_no_op() {
		let cov = GeoCoverage::new(square(0.0, 0.0, 10.0, 10.0), "EPSG:3857").unwrap();
		let same = cov.transform_to("EPSG:3857").unwrap();
		assert_eq!(same.srs(), "EPSG:3857");
	}
}
