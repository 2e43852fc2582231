//! Adapts an upstream XYZ/TMS tile endpoint into a [`Source`]: answers a
//! query only when it asks for exactly one tile of `grid` — a plain tile
//! endpoint has no means to render an arbitrary bbox/size/SRS, unlike a WMS.

use super::Source;
use crate::client::TmsClient;
use anyhow::{Result, bail};
use async_trait::async_trait;
use tilecask_core::error::CoreError;
use tilecask_core::{Grid, MapQuery};
use tilecask_image::ImageSource;

pub struct TiledSource {
	client: TmsClient,
	grid: Grid,
	transparent: bool,
}

impl TiledSource {
	pub fn new(client: TmsClient, grid: Grid, transparent: bool) -> Self {
		TiledSource { client, grid, transparent }
	}
}

#[async_trait]
impl Source for TiledSource {
	fn supports_meta_tiles(&self) -> bool {
		false
	}

	fn transparent(&self) -> bool {
		self.transparent
	}

	async fn get_map(&self, query: &MapQuery) -> Result<ImageSource> {
		if query.srs != self.grid.srs {
			bail!(CoreError::InvalidSourceQuery(format!(
				"tiled source serves {} only, got {}",
				self.grid.srs, query.srs
			)));
		}

		let center_x = (query.bbox.x_min + query.bbox.x_max) / 2.0;
		let center_y = (query.bbox.y_min + query.bbox.y_max) / 2.0;
		let level = self.grid.closest_level(query.resolution());
		let coord = self.grid.tile(center_x, center_y, level);

		let tile_extent = self.grid.tile_extent(coord);
		if tile_extent != query.bbox || self.grid.tile_size != query.size {
			bail!(CoreError::InvalidSourceQuery(format!(
				"tiled source only answers whole-tile requests: query bbox {:?} size {:?} doesn't match tile {} ({:?})",
				query.bbox, query.size, coord, tile_extent
			)));
		}

		self.client.get_tile(coord).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use reqwest::Url;
	use tilecask_core::{ResolutionPolicy, TileCoord, TileFormat};

	#[test]
	fn picks_the_level_closest_to_the_requested_resolution() {
		let grid = Grid::new("EPSG:3857", false, None, (256, 256), ResolutionPolicy::Global, None, 1.15).unwrap();
		let client = TmsClient::new(Url::parse("http://example.test/tiles").unwrap(), TileFormat::PNG).unwrap();
		let source = TiledSource::new(client, grid.clone(), false);
		let level = source.grid.closest_level(grid.resolution(5));
		assert_eq!(level, 5);
	}

	#[tokio::test]
	async fn rejects_a_query_that_does_not_align_with_a_whole_tile() {
		let grid = Grid::new("EPSG:3857", false, None, (256, 256), ResolutionPolicy::Global, None, 1.15).unwrap();
		let client = TmsClient::new(Url::parse("http://example.test/tiles").unwrap(), TileFormat::PNG).unwrap();
		let source = TiledSource::new(client, grid.clone(), false);

		let tile_extent = grid.tile_extent(TileCoord::new(0, 0, 2));
		let cropped = tilecask_core::Extent::new(
			tile_extent.x_min,
			tile_extent.y_min,
			(tile_extent.x_min + tile_extent.x_max) / 2.0,
			(tile_extent.y_min + tile_extent.y_max) / 2.0,
		)
		.unwrap();
		let query = MapQuery::new(cropped, (128, 128), grid.srs.clone());
		assert!(source.get_map(&query).await.is_err());
	}

	#[tokio::test]
	async fn rejects_a_query_in_a_different_srs() {
		let grid = Grid::new("EPSG:3857", false, None, (256, 256), ResolutionPolicy::Global, None, 1.15).unwrap();
		let client = TmsClient::new(Url::parse("http://example.test/tiles").unwrap(), TileFormat::PNG).unwrap();
		let source = TiledSource::new(client, grid.clone(), false);

		let tile_extent = grid.tile_extent(TileCoord::new(0, 0, 2));
		let query = MapQuery::new(tile_extent, grid.tile_size, "EPSG:4326".to_string());
		assert!(source.get_map(&query).await.is_err());
	}
}
