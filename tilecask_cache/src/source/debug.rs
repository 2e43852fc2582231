//! A synthetic source for exercising a cache/layer stack without a real
//! upstream: renders a bordered tile with a diagonal cross so adjacent tiles
//! visibly line up (or don't) when viewed together. No text is drawn — this
//! workspace carries no font-rendering dependency — the geometry alone is
//! enough to spot seams, y-flips, and off-by-one tile math.

use super::Source;
use anyhow::Result;
use async_trait::async_trait;
use tilecask_core::MapQuery;
use tilecask_core::TileFormat;
use tilecask_image::{DynamicImage, ImageBuffer, ImageSource, Rgba};

const BORDER: Rgba<u8> = Rgba([220, 40, 40, 255]);
const CROSS: Rgba<u8> = Rgba([40, 40, 220, 160]);
const BG: Rgba<u8> = Rgba([245, 245, 245, 255]);
const BORDER_WIDTH: u32 = 2;

pub struct DebugSource {
	transparent: bool,
}

impl DebugSource {
	pub fn new(transparent: bool) -> Self {
		DebugSource { transparent }
	}
}

#[async_trait]
impl Source for DebugSource {
	fn supports_meta_tiles(&self) -> bool {
		true
	}

	fn transparent(&self) -> bool {
		self.transparent
	}

	async fn get_map(&self, query: &MapQuery) -> Result<ImageSource> {
		let (width, height) = query.size;
		let transparent = self.transparent;
		let buffer = ImageBuffer::from_fn(width, height, move |x, y| {
			let on_border = x < BORDER_WIDTH || y < BORDER_WIDTH || x >= width - BORDER_WIDTH || y >= height - BORDER_WIDTH;
			let on_diagonal = x.abs_diff(y) < 1 || (width - x).abs_diff(y) < 1;
			if on_border {
				BORDER
			} else if on_diagonal {
				CROSS
			} else if transparent {
				Rgba([BG.0[0], BG.0[1], BG.0[2], 0])
			} else {
				BG
			}
		});
		Ok(ImageSource::from_image(DynamicImage::ImageRgba8(buffer), TileFormat::PNG).with_transparent(transparent))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tilecask_core::Extent;

	#[tokio::test]
	async fn renders_requested_size_with_a_border() {
		let source = DebugSource::new(false);
		let query = MapQuery::new(Extent::new(0.0, 0.0, 1.0, 1.0).unwrap(), (16, 16), "EPSG:3857");
		let image = source.get_map(&query).await.unwrap();
		assert_eq!(image.size().unwrap(), (16, 16));
	}
}
