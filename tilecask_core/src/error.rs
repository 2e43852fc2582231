//! Error taxonomy for the tile cache/rendering core.
//!
//! Most fallible operations in this workspace return a plain `anyhow::Error`
//! carrying context strings. A handful of call sites (the HTTP layer, the
//! seed CLI) need to branch on *kind* rather than just log a message, so the
//! cases that matter are represented here and can be recovered with
//! `err.downcast_ref::<CoreError>()`. Everything else stays opaque.

use std::fmt;

/// The subset of failures a caller may need to distinguish by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
	/// A `GeoBBox`/`TileCoord` was malformed (NaN, inverted, out of range).
	InvalidBBox(String),
	/// A requested operation would touch more tiles than the configured cap.
	TooManyTiles { requested: u64, limit: u64 },
	/// A `MapQuery`/`InfoQuery` was missing a required parameter or used an
	/// unsupported combination (e.g. unknown CRS, zero-size image).
	InvalidSourceQuery(String),
	/// A `FileLock` could not be acquired before its timeout elapsed.
	LockTimeout { path: String, waited_ms: u64 },
	/// An upstream source (WMS/TMS) returned a non-success response or
	/// unparsable payload.
	SourceError(String),
	/// Reprojection between two CRSes failed or produced non-finite output.
	TransformationError(String),
	/// A decoded tile was recognized as the cache's blank/no-data sentinel.
	BlankImage,
}

impl fmt::Display for CoreError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CoreError::InvalidBBox(msg) => write!(f, "invalid bounding box: {msg}"),
			CoreError::TooManyTiles { requested, limit } => {
				write!(f, "request covers {requested} tiles, limit is {limit}")
			}
			CoreError::InvalidSourceQuery(msg) => write!(f, "invalid source query: {msg}"),
			CoreError::LockTimeout { path, waited_ms } => {
				write!(f, "timed out after {waited_ms}ms waiting for lock at {path}")
			}
			CoreError::SourceError(msg) => write!(f, "upstream source error: {msg}"),
			CoreError::TransformationError(msg) => write!(f, "reprojection failed: {msg}"),
			CoreError::BlankImage => write!(f, "tile is blank"),
		}
	}
}

impl std::error::Error for CoreError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn downcast_roundtrip() {
		let err: anyhow::Error = CoreError::TooManyTiles {
			requested: 500_000,
			limit: 100_000,
		}
		.into();
		let kind = err.downcast_ref::<CoreError>().unwrap();
		assert!(matches!(
			kind,
			CoreError::TooManyTiles {
				requested: 500_000,
				limit: 100_000
			}
		));
	}

	#[test]
	fn display_messages() {
		assert_eq!(CoreError::BlankImage.to_string(), "tile is blank");
		assert_eq!(
			CoreError::InvalidBBox("x_min > x_max".into()).to_string(),
			"invalid bounding box: x_min > x_max"
		);
	}
}
