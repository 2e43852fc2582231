//! Coverage predicates for the tilecask workspace: the `(bbox, srs)`
//! containment/intersection tests the seeder and cleanup walkers use to
//! decide which tiles to touch.
//!
//! `BBoxCoverage` covers a single rectangle, `GeoCoverage` an arbitrary
//! polygon, and `MultiCoverage` aggregates several coverages as their union.
//! SRS-to-SRS reprojection runs through `proj`; the polygon math itself is
//! delegated to the `geo` crate's algorithms.

pub mod coverage;

pub use coverage::{BBoxCoverage, Coverage, CoverageExtent, GeoCoverage, MultiCoverage};
