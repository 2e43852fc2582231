//! Raster tile encodings handled by the image codec bridges.
//!
//! Scoped to the formats a rendered map tile can actually be encoded as; vector
//! tile encodings (PBF, GeoJSON, ...) have no counterpart here.

use anyhow::{bail, Result};
use std::fmt::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TileFormat {
	AVIF,
	JPG,
	PNG,
	WEBP,
}

impl Display for TileFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(match self {
			TileFormat::AVIF => "avif",
			TileFormat::JPG => "jpg",
			TileFormat::PNG => "png",
			TileFormat::WEBP => "webp",
		})
	}
}

impl TileFormat {
	pub fn extension(&self) -> &'static str {
		match self {
			TileFormat::AVIF => ".avif",
			TileFormat::JPG => ".jpg",
			TileFormat::PNG => ".png",
			TileFormat::WEBP => ".webp",
		}
	}

	/// The `image/...` MIME type used in `MapQuery::format` and WMS `GetMap` requests.
	pub fn mime_type(&self) -> &'static str {
		match self {
			TileFormat::AVIF => "image/avif",
			TileFormat::JPG => "image/jpeg",
			TileFormat::PNG => "image/png",
			TileFormat::WEBP => "image/webp",
		}
	}

	pub fn parse_str(value: &str) -> Result<Self> {
		let value = value.to_lowercase();
		let value = value.trim_matches([' ', '.']);
		let value = value.strip_prefix("image/").unwrap_or(value);
		Ok(match value {
			"avif" => TileFormat::AVIF,
			"jpg" | "jpeg" => TileFormat::JPG,
			"png" | "png8" | "png24" | "png32" => TileFormat::PNG,
			"webp" => TileFormat::WEBP,
			_ => bail!("Unknown tile format '{value}'. Expected one of: png, jpg, webp, avif"),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_mime_and_bare_extensions() {
		assert_eq!(TileFormat::parse_str("image/png").unwrap(), TileFormat::PNG);
		assert_eq!(TileFormat::parse_str("PNG8").unwrap(), TileFormat::PNG);
		assert_eq!(TileFormat::parse_str(".jpeg").unwrap(), TileFormat::JPG);
		assert_eq!(TileFormat::parse_str("image/webp").unwrap(), TileFormat::WEBP);
	}

	#[test]
	fn rejects_unknown_format() {
		assert!(TileFormat::parse_str("image/tiff").is_err());
	}

	#[test]
	fn mime_type_roundtrips_through_parse_str() {
		for fmt in [TileFormat::AVIF, TileFormat::JPG, TileFormat::PNG, TileFormat::WEBP] {
			assert_eq!(TileFormat::parse_str(fmt.mime_type()).unwrap(), fmt);
		}
	}
}
