//! The workhorse layer: answers a `MapQuery` by loading every tile the
//! request touches from a `TileManager` (building cache misses along the
//! way), mosaicking them, then cropping/resampling to the exact bbox/size
//! the caller asked for. When the query's SRS differs from the cache's own
//! grid SRS, the bbox is reprojected into the grid's CRS to find the tiles
//! and the mosaic is reprojected back via a mesh warp, the same way
//! `WmsSource` retargets a query to a supported upstream CRS.

use super::MapLayer;
use crate::manager::TileManager;
use anyhow::{Result, bail};
use async_trait::async_trait;
use image::{DynamicImage, Rgba, imageops::overlay};
use std::sync::Arc;
use tilecask_core::error::CoreError;
use tilecask_core::grid::check_tile_count;
use tilecask_core::{MapQuery, TileFormat};
use tilecask_derive::context;
use tilecask_geometry::Coverage;
use tilecask_image::{ImageSource, ImageTransformer, Resampling};

pub struct CacheMapLayer {
	manager: Arc<TileManager>,
	max_tile_limit: u64,
	bgcolor: String,
	transformer: ImageTransformer,
}

impl CacheMapLayer {
	pub fn new(manager: Arc<TileManager>, max_tile_limit: u64) -> Self {
		CacheMapLayer {
			manager,
			max_tile_limit,
			bgcolor: "#ffffff".to_string(),
			transformer: ImageTransformer::new(8, Resampling::Bilinear),
		}
	}

	pub fn with_bgcolor(mut self, bgcolor: impl Into<String>) -> Self {
		self.bgcolor = bgcolor.into();
		self
	}
}

#[async_trait]
impl MapLayer for CacheMapLayer {
	#[context("rendering cached layer for bbox {:?}", query.bbox)]
	async fn get_map(&self, query: &MapQuery) -> Result<ImageSource> {
		let grid_srs = self.manager.grid().srs.clone();
		let grid_bbox = reproject_bbox(&query.srs, &grid_srs, query.bbox)?;

		let (abbox, (cols, rows), tile_coords) = self.manager.grid().affected_tiles(grid_bbox, query.size)?;
		check_tile_count(cols, rows, self.max_tile_limit)?;

		let present: Vec<_> = tile_coords.iter().filter_map(|c| *c).collect();
		if present.is_empty() {
			bail!(CoreError::BlankImage);
		}

		let collection = self.manager.load_tile_coords(&present).await?;
		let tile_size = self.manager.grid().tile_size;
		let transparent = self.manager.transparent();

		let bg = parse_bgcolor(&self.bgcolor, transparent);
		let mut mosaic = DynamicImage::ImageRgba8(image::ImageBuffer::from_pixel(
			cols as u32 * tile_size.0,
			rows as u32 * tile_size.1,
			bg,
		));

		for (i, coord) in tile_coords.iter().enumerate() {
			let Some(coord) = coord else { continue };
			let Some(tile) = collection.get(*coord) else { continue };
			let Some(source) = &tile.source else { continue };
			let row = (i / cols as usize) as i64;
			let col = (i % cols as usize) as i64;
			overlay(&mut mosaic, source.as_image()?, col * tile_size.0 as i64, row * tile_size.1 as i64);
		}

		let same_srs = query.srs == grid_srs;
		let dst_srs = query.srs.clone();
		let image = self.transformer.transform(&mosaic, abbox, query.size, query.bbox, same_srs, move |x, y| {
			reproject_point(&dst_srs, &grid_srs, x, y)
		})?;
		Ok(ImageSource::from_image(image, TileFormat::PNG).with_transparent(transparent))
	}
}

/// Reprojects `bbox` from `from_srs` into `to_srs`, the identity when the two
/// already match. Mirrors `WmsSource::reproject_bbox`.
fn reproject_bbox(from_srs: &str, to_srs: &str, bbox: tilecask_core::Extent) -> Result<tilecask_core::Extent> {
	if from_srs == to_srs {
		return Ok(bbox);
	}
	let coverage = tilecask_geometry::BBoxCoverage::new(bbox, from_srs)?;
	Ok(coverage.transform_to(to_srs)?.extent().bbox)
}

/// Reprojects a single point from `from_srs` into `to_srs`. Mirrors
/// `WmsSource::reproject_point`.
fn reproject_point(from_srs: &str, to_srs: &str, x: f64, y: f64) -> Result<(f64, f64)> {
	if from_srs == to_srs {
		return Ok((x, y));
	}
	let proj = proj::Proj::new_known_crs(from_srs, to_srs, None)?;
	Ok(proj.convert((x, y))?)
}

fn parse_bgcolor(hex: &str, transparent: bool) -> Rgba<u8> {
	let rgb = tilecask_image::color::parse_hex_color(hex).unwrap_or_else(|_| vec![255, 255, 255]);
	Rgba([
		rgb.first().copied().unwrap_or(255),
		rgb.get(1).copied().unwrap_or(255),
		rgb.get(2).copied().unwrap_or(255),
		if transparent { 0 } else { 255 },
	])
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::source::DebugSource;
	use crate::tile_cache::FileTileCache;
	use tempfile::TempDir;
	use tilecask_core::{Extent, Grid, ResolutionPolicy, TileFormat};

	fn layer() -> (TempDir, CacheMapLayer) {
		let dir = TempDir::new().unwrap();
		let grid = Grid::new("EPSG:3857", false, None, (256, 256), ResolutionPolicy::Global, None, 1.15).unwrap();
		let cache = FileTileCache::new(dir.path().to_path_buf(), TileFormat::PNG, false).unwrap();
		let sources: Vec<Arc<dyn crate::source::Source>> = vec![Arc::new(DebugSource::new(false))];
		let manager = Arc::new(TileManager::new(grid, cache, sources));
		(dir, CacheMapLayer::new(manager, 256))
	}

	#[tokio::test]
	async fn same_srs_query_renders_without_reprojection() {
		let (_dir, layer) = layer();
		let bbox = layer.manager.grid().tile_extent(tilecask_core::TileCoord::new(0, 0, 2));
		let query = MapQuery::new(bbox, layer.manager.grid().tile_size, layer.manager.grid().srs.clone());
		layer.get_map(&query).await.unwrap();
	}

	#[test]
	fn reproject_bbox_is_identity_for_matching_srs() {
		let bbox = Extent::new(0.0, 0.0, 10.0, 10.0).unwrap();
		assert_eq!(reproject_bbox("EPSG:3857", "EPSG:3857", bbox).unwrap(), bbox);
	}

	#[test]
	fn reproject_point_is_identity_for_matching_srs() {
		assert_eq!(reproject_point("EPSG:3857", "EPSG:3857", 12.0, 34.0).unwrap(), (12.0, 34.0));
	}
}
