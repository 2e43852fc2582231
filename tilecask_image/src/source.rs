//! A uniform handle over "raster at rest": a tile whose pixels may come from a
//! freshly-decoded upstream response, a cache file on disk, or an in-memory
//! [`DynamicImage`] built during compositing. Conversions are cached so that a
//! cache hit that is only ever re-encoded never pays the decode cost, and a
//! chain of compositing steps never decodes the same bytes twice.

use crate::traits::DynamicImageTraitConvert;
use anyhow::{Context, Result};
use image::DynamicImage;
use std::sync::OnceLock;
use tilecask_core::{Blob, TileFormat};

enum Payload {
	Encoded(Blob),
	Decoded(DynamicImage),
}

/// A tile image that is either already decoded or still sitting as encoded bytes.
///
/// `as_image()` and `as_blob()` decode/encode on first use and memoize the result,
/// so calling either repeatedly (e.g. once to composite, once to write to cache)
/// never repeats the codec work.
pub struct ImageSource {
	payload: Payload,
	format: TileFormat,
	transparent: bool,
	decoded: OnceLock<DynamicImage>,
	encoded: OnceLock<Blob>,
}

impl ImageSource {
	pub fn from_blob(blob: Blob, format: TileFormat) -> Self {
		Self {
			payload: Payload::Encoded(blob),
			format,
			transparent: false,
			decoded: OnceLock::new(),
			encoded: OnceLock::new(),
		}
	}

	pub fn from_image(image: DynamicImage, format: TileFormat) -> Self {
		Self {
			payload: Payload::Decoded(image),
			format,
			transparent: false,
			decoded: OnceLock::new(),
			encoded: OnceLock::new(),
		}
	}

	pub fn with_transparent(mut self, transparent: bool) -> Self {
		self.transparent = transparent;
		self
	}

	pub fn format(&self) -> TileFormat {
		self.format
	}

	pub fn transparent(&self) -> bool {
		self.transparent
	}

	/// Returns the decoded image, decoding and memoizing it on first access.
	#[allow(clippy::missing_errors_doc)]
	pub fn as_image(&self) -> Result<&DynamicImage> {
		match &self.payload {
			Payload::Decoded(image) => Ok(image),
			Payload::Encoded(blob) => {
				if let Some(image) = self.decoded.get() {
					return Ok(image);
				}
				let image = DynamicImage::from_blob(blob, self.format).context("decoding image source")?;
				Ok(self.decoded.get_or_init(|| image))
			}
		}
	}

	/// Returns the encoded bytes in `format`, re-encoding from the decoded form
	/// (or reusing the stored bytes when `format` matches and no decode has
	/// happened) and memoizing the result.
	#[allow(clippy::missing_errors_doc)]
	pub fn as_blob(&self, format: Option<TileFormat>) -> Result<&Blob> {
		let format = format.unwrap_or(self.format);
		if format == self.format {
			if let Payload::Encoded(blob) = &self.payload {
				return Ok(blob);
			}
		}
		if let Some(blob) = self.encoded.get() {
			return Ok(blob);
		}
		let image = self.as_image()?;
		let blob = image.to_blob(format).context("encoding image source")?;
		Ok(self.encoded.get_or_init(|| blob))
	}

	pub fn size(&self) -> Result<(u32, u32)> {
		let image = self.as_image()?;
		Ok((image.width(), image.height()))
	}
}

/// Detects whether an image is a solid single color, returning the color's bytes
/// (one value per channel) if so. Used to dedup single-color tiles onto a shared
/// file via hardlinks instead of storing an identical copy per coordinate.
pub fn is_single_color_image(image: &DynamicImage) -> Option<Vec<u8>> {
	let mut pixels = image.iter_pixels();
	let first = pixels.next()?.to_vec();
	if pixels.all(|p| p == first) { Some(first) } else { None }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::traits::DynamicImageTraitTest;
	use image::GenericImageView;

	#[test]
	fn single_color_image_is_detected() {
		let img = DynamicImage::from_fn_rgba8(4, 4, |_, _| [10, 20, 30, 255]);
		assert_eq!(is_single_color_image(&img), Some(vec![10, 20, 30, 255]));
	}

	#[test]
	fn gradient_image_is_not_single_color() {
		assert_eq!(is_single_color_image(&DynamicImage::new_test_rgba()), None);
	}

	#[test]
	fn as_blob_memoizes_and_reuses_stored_bytes() {
		let img = DynamicImage::new_test_rgba();
		let blob = img.to_blob(TileFormat::PNG).unwrap();
		let source = ImageSource::from_blob(blob.clone(), TileFormat::PNG);
		let out = source.as_blob(None).unwrap();
		assert_eq!(out.as_slice(), blob.as_slice());
	}

	#[test]
	fn as_image_decodes_once() {
		let img = DynamicImage::new_test_rgb();
		let blob = img.to_blob(TileFormat::PNG).unwrap();
		let source = ImageSource::from_blob(blob, TileFormat::PNG);
		let decoded1 = source.as_image().unwrap();
		assert_eq!(decoded1.dimensions(), (256, 256));
		let decoded2 = source.as_image().unwrap();
		assert_eq!(decoded1.as_bytes(), decoded2.as_bytes());
	}
}
