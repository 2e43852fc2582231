//! Image codec bridges and tile-composition primitives for the tilecask workspace.
//!
//! This crate provides utilities and trait extensions built around the
//! [`image::DynamicImage`] type. It standardizes image encoding/decoding and the
//! higher-level operations a tile cache needs on top of them:
//!
//! ### Features
//! - Unified access to multiple codecs (`PNG`, `JPEG`, `WEBP`, `AVIF`).
//! - Trait extensions for:
//!   - Conversion and encoding (`traits::convert`)
//!   - Metadata and pixel introspection (`traits::info`)
//!   - Common transformations (scaling, flattening, cropping; `traits::operation`)
//!   - Deterministic test image generation (`traits::test`)
//! - [`ImageSource`], a lazily-decoded handle threaded through the cache/source/manager
//!   boundary, [`LayerMerger`] for alpha-compositing multiple sources, [`TileSplitter`]
//!   for cropping a metatile into its constituent tiles, and [`ImageTransformer`] for
//!   mesh-warp reprojection between a source and destination bbox.

pub mod color;
pub mod format;
pub mod merger;
pub mod source;
pub mod splitter;
pub mod traits;
pub mod transform;

pub use format::*;
pub use image::{DynamicImage, GenericImageView, ImageBuffer, Luma, LumaA, Rgb, Rgba};
pub use merger::LayerMerger;
pub use source::{ImageSource, is_single_color_image};
pub use splitter::TileSplitter;
pub use traits::*;
pub use transform::ImageTransformer;
