//! Reprojects/crops a source image between a source and destination bbox.
//!
//! The transformation does not reproject each pixel individually: it divides
//! the destination image into an `N x N` mesh, computes the source pixel
//! coordinates for each mesh-cell corner, and warps each quad independently
//! with an affine transform. This gives good results once the mesh is fine
//! enough — denser meshes stop improving the result well before the cell
//! count gets expensive.
//!
//! Actual coordinate reprojection across CRS is not this crate's concern: the
//! caller supplies a `to_src` closure that maps a destination-SRS world point
//! to a source-SRS world point (identity when the two SRS are the same).

use anyhow::Result;
use image::{DynamicImage, Luma, LumaA, Rgb, Rgba};
use imageproc::definitions::Image;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into_with};
use tilecask_core::Extent;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resampling {
	Nearest,
	Bilinear,
}

impl Resampling {
	fn interpolation(self) -> Interpolation {
		match self {
			Resampling::Nearest => Interpolation::Nearest,
			Resampling::Bilinear => Interpolation::Bilinear,
		}
	}
}

pub struct ImageTransformer {
	mesh_div: u32,
	resampling: Resampling,
}

impl ImageTransformer {
	pub fn new(mesh_div: u32, resampling: Resampling) -> Self {
		Self { mesh_div: mesh_div.max(1), resampling }
	}

	/// Transforms `src_img` (covering `src_bbox`) into an image of `dst_size`
	/// covering `dst_bbox`. `same_srs` selects the simple crop/affine path
	/// (skipping `to_src` reprojection, which may be a no-op closure in that
	/// case); `to_src` is only invoked in the cross-SRS mesh-warp path.
	#[allow(clippy::missing_errors_doc, clippy::too_many_arguments)]
	pub fn transform(
		&self,
		src_img: &DynamicImage,
		src_bbox: Extent,
		dst_size: (u32, u32),
		dst_bbox: Extent,
		same_srs: bool,
		to_src: impl Fn(f64, f64) -> Result<(f64, f64)>,
	) -> Result<DynamicImage> {
		let src_size = (src_img.width(), src_img.height());
		if no_transformation_needed(src_size, src_bbox, dst_size, dst_bbox, same_srs) {
			return Ok(src_img.clone());
		}
		if same_srs {
			self.transform_simple(src_img, src_bbox, dst_size, dst_bbox)
		} else {
			self.transform_mesh(src_img, src_bbox, dst_size, dst_bbox, to_src)
		}
	}

	fn transform_simple(&self, src_img: &DynamicImage, src_bbox: Extent, dst_size: (u32, u32), dst_bbox: Extent) -> Result<DynamicImage> {
		let src_size = (src_img.width(), src_img.height());
		let to_src_px = LinearPixelTransform::new(src_bbox, src_size);
		let (min_x, min_y) = to_src_px.apply(dst_bbox.x_min, dst_bbox.y_max);
		let (max_x, max_y) = to_src_px.apply(dst_bbox.x_max, dst_bbox.y_min);

		let src_res = src_bbox.width() / f64::from(src_size.0);
		let dst_res = dst_bbox.width() / f64::from(dst_size.0);
		let tenth_px_res = (dst_res / (f64::from(dst_size.0) * 10.0)).abs();

		if (src_res - dst_res).abs() < tenth_px_res {
			let x = min_x.round() as i64;
			let y = min_y.round() as i64;
			Ok(crop_or_pad(src_img, x, y, dst_size))
		} else {
			let src_quad = [(min_x as f32, min_y as f32), (max_x as f32, min_y as f32), (max_x as f32, max_y as f32), (min_x as f32, max_y as f32)];
			self.warp_quad(src_img, src_quad, dst_size)
		}
	}

	fn transform_mesh(
		&self,
		src_img: &DynamicImage,
		src_bbox: Extent,
		dst_size: (u32, u32),
		dst_bbox: Extent,
		to_src: impl Fn(f64, f64) -> Result<(f64, f64)>,
	) -> Result<DynamicImage> {
		let src_size = (src_img.width(), src_img.height());
		let to_src_px = LinearPixelTransform::new(src_bbox, src_size);
		let to_dst_world = LinearWorldTransform::new(dst_size, dst_bbox);

		let mut mesh_div = self.mesh_div;
		while mesh_div > 1 && (dst_size.0 / mesh_div < 10 || dst_size.1 / mesh_div < 10) {
			mesh_div -= 1;
		}

		let mut canvas = blank_like(src_img, dst_size);
		for quad in griddify(dst_size, mesh_div) {
			let mut src_quad = [(0.0f32, 0.0f32); 4];
			for (i, (dx, dy)) in quad.dst_corners().into_iter().enumerate() {
				let (wx, wy) = to_dst_world.apply(dx, dy);
				let (sx, sy) = to_src(wx, wy)?;
				let (px, py) = to_src_px.apply(sx, sy);
				src_quad[i] = (px as f32, py as f32);
			}
			let warped = self.warp_quad(src_img, src_quad, (quad.w, quad.h))?;
			image::imageops::overlay(&mut canvas, &warped, i64::from(quad.x), i64::from(quad.y));
		}
		Ok(canvas)
	}

	/// Warps the region of `src_img` bounded by `src_quad` (in source pixel
	/// coordinates, clockwise from top-left) into a freshly allocated image of
	/// `out_size`, where `out_size`'s own corners (clockwise from `(0, 0)`) are
	/// the projection's destination points.
	fn warp_quad(&self, src_img: &DynamicImage, src_quad: [(f32, f32); 4], out_size: (u32, u32)) -> Result<DynamicImage> {
		let local_quad = [
			(0.0, 0.0),
			(out_size.0 as f32, 0.0),
			(out_size.0 as f32, out_size.1 as f32),
			(0.0, out_size.1 as f32),
		];
		let projection = Projection::from_control_points(local_quad, src_quad)
			.ok_or_else(|| anyhow::anyhow!("degenerate mesh quad during reprojection"))?;
		let interpolation = self.resampling.interpolation();
		let mapping = move |x: f32, y: f32| projection * (x, y);

		Ok(match src_img {
			DynamicImage::ImageLuma8(img) => DynamicImage::from(warp_quad_buffer(img, mapping, interpolation, Luma([0u8]), out_size)),
			DynamicImage::ImageLumaA8(img) => DynamicImage::from(warp_quad_buffer(img, mapping, interpolation, LumaA([0u8, 0u8]), out_size)),
			DynamicImage::ImageRgb8(img) => DynamicImage::from(warp_quad_buffer(img, mapping, interpolation, Rgb([0u8, 0, 0]), out_size)),
			DynamicImage::ImageRgba8(img) => DynamicImage::from(warp_quad_buffer(img, mapping, interpolation, Rgba([0u8, 0, 0, 0]), out_size)),
			_ => anyhow::bail!("unsupported image type for mesh-warp reprojection: {:?}", src_img.color()),
		})
	}
}

fn warp_quad_buffer<P>(img: &Image<P>, mapping: impl Fn(f32, f32) -> (f32, f32), interpolation: Interpolation, default: P, out_size: (u32, u32)) -> Image<P>
where
	P: image::Pixel<Subpixel = u8> + 'static,
{
	let mut out = Image::from_pixel(out_size.0, out_size.1, default);
	warp_into_with(img, mapping, interpolation, default, &mut out);
	out
}

struct Quad {
	x: u32,
	y: u32,
	w: u32,
	h: u32,
}

impl Quad {
	fn dst_corners(&self) -> [(f64, f64); 4] {
		let (x0, y0) = (f64::from(self.x), f64::from(self.y));
		let (x1, y1) = (f64::from(self.x + self.w), f64::from(self.y + self.h));
		[(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
	}
}

fn griddify(size: (u32, u32), steps: u32) -> Vec<Quad> {
	let x_step = size.0 / steps;
	let y_step = size.1 / steps;
	let mut quads = Vec::with_capacity((steps * steps) as usize);
	for row in 0..steps {
		for col in 0..steps {
			quads.push(Quad {
				x: col * x_step,
				y: row * y_step,
				w: if col + 1 == steps { size.0 - col * x_step } else { x_step },
				h: if row + 1 == steps { size.1 - row * y_step } else { y_step },
			});
		}
	}
	quads
}

struct LinearPixelTransform {
	bbox: Extent,
	size: (u32, u32),
}

impl LinearPixelTransform {
	fn new(bbox: Extent, size: (u32, u32)) -> Self {
		Self { bbox, size }
	}

	/// Maps a world coordinate to a pixel coordinate, with pixel row 0 at `y_max`.
	fn apply(&self, x: f64, y: f64) -> (f64, f64) {
		let px = (x - self.bbox.x_min) / self.bbox.width() * f64::from(self.size.0);
		let py = (self.bbox.y_max - y) / self.bbox.height() * f64::from(self.size.1);
		(px, py)
	}
}

struct LinearWorldTransform {
	bbox: Extent,
	size: (u32, u32),
}

impl LinearWorldTransform {
	fn new(size: (u32, u32), bbox: Extent) -> Self {
		Self { bbox, size }
	}

	fn apply(&self, px: f64, py: f64) -> (f64, f64) {
		let x = self.bbox.x_min + px / f64::from(self.size.0) * self.bbox.width();
		let y = self.bbox.y_max - py / f64::from(self.size.1) * self.bbox.height();
		(x, y)
	}
}

fn no_transformation_needed(src_size: (u32, u32), src_bbox: Extent, dst_size: (u32, u32), dst_bbox: Extent, same_srs: bool) -> bool {
	if src_size != dst_size || !same_srs {
		return false;
	}
	let xres = dst_bbox.width() / f64::from(dst_size.0);
	let yres = dst_bbox.height() / f64::from(dst_size.1);
	(src_bbox.x_min - dst_bbox.x_min).abs() < xres / 10.0
		&& (src_bbox.x_max - dst_bbox.x_max).abs() < xres / 10.0
		&& (src_bbox.y_min - dst_bbox.y_min).abs() < yres / 10.0
		&& (src_bbox.y_max - dst_bbox.y_max).abs() < yres / 10.0
}

fn crop_or_pad(image: &DynamicImage, x: i64, y: i64, size: (u32, u32)) -> DynamicImage {
	let mut canvas = blank_like(image, size);
	image::imageops::overlay(&mut canvas, image, -x, -y);
	canvas
}

fn blank_like(image: &DynamicImage, size: (u32, u32)) -> DynamicImage {
	DynamicImage::new(size.0, size.1, image.color())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::traits::DynamicImageTraitTest;

	fn mercator_world() -> Extent {
		Extent::new(-20_037_508.3428, -20_037_508.3428, 20_037_508.3428, 20_037_508.3428).unwrap()
	}

	#[test]
	fn identical_bbox_and_size_returns_source_unchanged() {
		let img = DynamicImage::new_test_rgba();
		let bbox = mercator_world();
		let transformer = ImageTransformer::new(8, Resampling::Bilinear);
		let out = transformer.transform(&img, bbox, (256, 256), bbox, true, |x, y| Ok((x, y))).unwrap();
		assert_eq!(out.as_bytes(), img.as_bytes());
	}

	#[test]
	fn same_srs_crop_produces_requested_size() {
		let img = DynamicImage::new_test_rgb();
		let full = mercator_world();
		let half = Extent::new(full.x_min, full.y_min, 0.0, 0.0).unwrap();
		let transformer = ImageTransformer::new(8, Resampling::Nearest);
		let out = transformer.transform(&img, full, (128, 128), half, true, |x, y| Ok((x, y))).unwrap();
		assert_eq!((out.width(), out.height()), (128, 128));
	}

	#[test]
	fn cross_srs_mesh_warp_produces_requested_size() {
		let img = DynamicImage::new_test_rgba();
		let full = mercator_world();
		let transformer = ImageTransformer::new(4, Resampling::Bilinear);
		let out = transformer.transform(&img, full, (64, 64), full, false, |x, y| Ok((x, y))).unwrap();
		assert_eq!((out.width(), out.height()), (64, 64));
	}
}
