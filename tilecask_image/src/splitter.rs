//! Crops a decoded metatile image into its constituent tiles.

use crate::source::ImageSource;
use crate::traits::DynamicImageTraitOperation;
use anyhow::{Context, Result};
use image::DynamicImage;
use tilecask_core::TileFormat;

/// Splits a metatile image into tiles at caller-supplied pixel offsets.
pub struct TileSplitter<'a> {
	meta_image: &'a DynamicImage,
	format: TileFormat,
}

impl<'a> TileSplitter<'a> {
	/// `meta_image` should already be palette-free: callers encoding to a format
	/// that cannot represent an indexed palette (png/gif) must convert to RGBA
	/// before constructing the splitter to avoid palette remapping artifacts.
	pub fn new(meta_image: &'a DynamicImage, format: TileFormat) -> Self {
		Self { meta_image, format }
	}

	/// Crops the region starting at `origin_px` with the given `tile_size` and
	/// returns it as a fresh [`ImageSource`].
	#[allow(clippy::missing_errors_doc)]
	pub fn get_tile(&self, origin_px: (u32, u32), tile_size: (u32, u32)) -> Result<ImageSource> {
		let cropped = self
			.meta_image
			.get_extract(
				f64::from(origin_px.0),
				f64::from(origin_px.1),
				f64::from(tile_size.0),
				f64::from(tile_size.1),
				tile_size.0,
				tile_size.1,
			)
			.with_context(|| format!("splitting tile at pixel offset {origin_px:?}"))?;
		Ok(ImageSource::from_image(cropped, self.format))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::traits::DynamicImageTraitConvert;

	#[test]
	fn splits_metatile_into_quadrants_without_overlap() {
		let meta = DynamicImage::from_fn_rgba8(8, 8, |x, y| [x as u8 * 32, y as u8 * 32, 0, 255]);
		let splitter = TileSplitter::new(&meta, TileFormat::PNG);

		let top_left = splitter.get_tile((0, 0), (4, 4)).unwrap();
		let bottom_right = splitter.get_tile((4, 4), (4, 4)).unwrap();

		assert_eq!(top_left.size().unwrap(), (4, 4));
		assert_eq!(bottom_right.size().unwrap(), (4, 4));
		assert_ne!(
			top_left.as_image().unwrap().as_bytes(),
			bottom_right.as_image().unwrap().as_bytes()
		);
	}
}
