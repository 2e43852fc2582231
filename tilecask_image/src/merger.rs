//! Alpha-compositing multiple [`ImageSource`]s into one, bottom layer first.

use crate::color::parse_hex_color;
use crate::source::ImageSource;
use crate::traits::DynamicImageTraitConvert;
use anyhow::{Context, Result, ensure};
use image::{DynamicImage, Rgba, imageops::overlay};
use tilecask_core::TileFormat;

/// Merges one or more layers, bottom layer first, into a single [`ImageSource`].
pub struct LayerMerger {
	layers: Vec<ImageSource>,
}

impl Default for LayerMerger {
	fn default() -> Self {
		Self::new()
	}
}

impl LayerMerger {
	pub fn new() -> Self {
		Self { layers: Vec::new() }
	}

	/// Adds a layer to merge. Layers are composited bottom-to-top in add order.
	pub fn add(&mut self, layer: ImageSource) {
		self.layers.push(layer);
	}

	/// Merges the accumulated layers into one [`ImageSource`].
	///
	/// If there is exactly one layer and its transparency already matches the
	/// requested `transparent`, it is returned unchanged rather than re-composited.
	/// `bgcolor` is a hex color string (see [`parse_hex_color`]) used to fill the
	/// background when `transparent` is `false`.
	#[allow(clippy::missing_errors_doc)]
	pub fn merge_into(self, format: TileFormat, size: Option<(u32, u32)>, bgcolor: &str, transparent: bool) -> Result<ImageSource> {
		ensure!(!self.layers.is_empty(), "cannot merge an empty layer stack");

		if self.layers.len() == 1 {
			let only = &self.layers[0];
			if only.transparent() == transparent {
				let mut layers = self.layers;
				return Ok(layers.pop().unwrap());
			}
		}

		let (width, height) = match size {
			Some(size) => size,
			None => self.layers[0].size()?,
		};

		let rgb = parse_hex_color(bgcolor).context("parsing background color")?;
		let bg = Rgba([
			rgb.first().copied().unwrap_or(255),
			rgb.get(1).copied().unwrap_or(255),
			rgb.get(2).copied().unwrap_or(255),
			if transparent { 0 } else { 255 },
		]);

		let mut canvas = DynamicImage::from_fn_rgba8(width, height, move |_, _| bg.0);

		for layer in &self.layers {
			let layer_img = layer.as_image()?;
			if layer_img.color().has_alpha() {
				overlay(&mut canvas, layer_img, 0, 0);
			} else {
				overlay(&mut canvas, &layer_img.clone().into_rgba8().into(), 0, 0);
			}
		}

		let canvas = if transparent {
			canvas
		} else {
			DynamicImage::ImageRgb8(canvas.into_rgb8())
		};

		Ok(ImageSource::from_image(canvas, format).with_transparent(transparent))
	}
}
