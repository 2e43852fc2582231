//! Persists tile payloads on disk: the six-level zero-padded directory split
//! that bounds directory fan-out, single-color hardlink dedup, and the
//! atomic write every store goes through.

use crate::lock::{FileLock, lock_path};
use crate::tile::Tile;
use anyhow::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tilecask_core::TileCoord;
use tilecask_core::TileFormat;
use tilecask_image::{ImageSource, is_single_color_image};

/// Default per-lock acquisition timeout (spec.md §5).
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// A tile store over the default six-level directory layout:
/// `<cache_dir>/<ZZ>/<XXX>/<XXX>/<XXX>/<YYY>/<YYY>/<YYY>.<ext>`. Alternative
/// layouts (`tms`, `arcgis`) are isomorphic transforms of this key function
/// and are out of scope here — only the default layout is implemented.
#[derive(Clone)]
pub struct FileTileCache {
	cache_dir: PathBuf,
	lock_dir: PathBuf,
	format: TileFormat,
	link_single_color_images: bool,
	cache_id: String,
}

impl FileTileCache {
	pub fn new(cache_dir: PathBuf, format: TileFormat, link_single_color_images: bool) -> Result<Self> {
		let lock_dir = cache_dir.join("tile_locks");
		let cache_id = hash_hex(cache_dir.to_string_lossy().as_ref());
		Ok(FileTileCache {
			cache_dir,
			lock_dir,
			format,
			link_single_color_images,
			cache_id,
		})
	}

	pub fn with_lock_dir(mut self, lock_dir: PathBuf) -> Self {
		self.lock_dir = lock_dir;
		self
	}

	/// The directory holding every tile at `level`.
	pub fn level_location(&self, level: u8) -> PathBuf {
		self.cache_dir.join(format!("{level:02}"))
	}

	/// The file a tile's payload lives at, independent of whether it exists yet.
	pub fn tile_location(&self, coord: TileCoord) -> PathBuf {
		let x = coord.x.max(0) as u64;
		let y = coord.y.max(0) as u64;
		self
			.level_location(coord.level)
			.join(format!("{:03}", x / 1_000_000))
			.join(format!("{:03}", (x / 1_000) % 1_000))
			.join(format!("{:03}", x % 1_000))
			.join(format!("{:03}", y / 1_000_000))
			.join(format!("{:03}", (y / 1_000) % 1_000))
			.join(format!("{:03}{}", y % 1_000, self.format.extension()))
	}

	fn single_color_tile_location(&self, color: &[u8]) -> PathBuf {
		let hex: String = color.iter().map(|b| format!("{b:02x}")).collect();
		self.cache_dir.join("single_color_tiles").join(format!("{hex}{}", self.format.extension()))
	}

	/// True if the tile already carries a payload, or — failing that — a
	/// payload file exists on disk at its location.
	pub fn is_cached(&self, tile: &Tile) -> bool {
		if !tile.is_missing() {
			return true;
		}
		self.tile_location(tile.coord).exists()
	}

	/// Fills `tile.source` from disk if a payload exists there. Returns
	/// `true` on a hit. With `with_metadata`, also sets `size`/`timestamp`
	/// from the file's metadata.
	pub fn load(&self, tile: &mut Tile, with_metadata: bool) -> Result<bool> {
		if !tile.is_missing() {
			return Ok(true);
		}
		let location = self.tile_location(tile.coord);
		if !location.exists() {
			return Ok(false);
		}
		if with_metadata {
			let meta = std::fs::symlink_metadata(&location)?;
			tile.size = Some(meta.len());
			tile.timestamp = Some(meta.modified()?);
		}
		let blob = tilecask_core::Blob::load_from_file(&location)?;
		tile.source = Some(ImageSource::from_blob(blob, self.format));
		tile.location = Some(location);
		Ok(true)
	}

	/// Idempotent: a no-op if `tile.stored` already. Writes the tile's
	/// payload atomically (temp file + rename); if single-color linking is
	/// enabled and the image is monochromatic, the payload is written once
	/// under `single_color_tiles/<hex>.<ext>` and every matching tile
	/// hardlinks to it instead of storing its own copy.
	pub fn store(&self, tile: &mut Tile) -> Result<()> {
		if tile.stored {
			return Ok(());
		}
		let location = self.tile_location(tile.coord);
		let source = tile.source.as_ref().expect("store() called on a tile with no payload");

		if self.link_single_color_images {
			if let Some(color) = is_single_color_image(source.as_image()?) {
				let canonical = self.single_color_tile_location(&color);
				if !canonical.exists() {
					write_atomic(&canonical, source.as_blob(Some(self.format))?.as_slice())?;
				}
				link_or_copy(&canonical, &location)?;
				tile.stored = true;
				tile.timestamp = Some(SystemTime::now());
				tile.location = Some(location);
				return Ok(());
			}
		}

		write_atomic(&location, source.as_blob(Some(self.format))?.as_slice())?;
		tile.stored = true;
		tile.timestamp = Some(SystemTime::now());
		tile.size = Some(source.as_blob(Some(self.format))?.len());
		tile.location = Some(location);
		Ok(())
	}

	pub fn remove(&self, coord: TileCoord) -> Result<()> {
		let location = self.tile_location(coord);
		match std::fs::remove_file(&location) {
			Ok(()) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => return Err(e.into()),
		}
		Ok(())
	}

	pub fn timestamp_created(&self, coord: TileCoord) -> Result<SystemTime> {
		Ok(std::fs::symlink_metadata(self.tile_location(coord))?.modified()?)
	}

	/// A lock scoped to `coord`, derived from `(cache_id, coord)` so two
	/// caches sharing a `lock_dir` never collide.
	pub fn lock(&self, coord: TileCoord) -> FileLock {
		FileLock::new(lock_path(&self.lock_dir, &self.cache_id, coord), DEFAULT_LOCK_TIMEOUT)
	}

	pub fn format(&self) -> TileFormat {
		self.format
	}

	pub fn cache_dir(&self) -> &Path {
		&self.cache_dir
	}
}

fn hash_hex(value: &str) -> String {
	let mut hasher = DefaultHasher::new();
	value.hash(&mut hasher);
	format!("{:016x}", hasher.finish())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	let tmp = path.with_extension(format!(
		"{}.tmp-{}",
		path.extension().and_then(|e| e.to_str()).unwrap_or(""),
		std::process::id()
	));
	std::fs::write(&tmp, bytes)?;
	std::fs::rename(&tmp, path)?;
	Ok(())
}

/// Hardlinks `dest` to `canonical`, falling back to a full copy when
/// hardlinking isn't available (cross-device, unsupported filesystem) —
/// sidesteps the Windows-symlink-privilege issue entirely since hardlinks
/// need no special privilege.
fn link_or_copy(canonical: &Path, dest: &Path) -> Result<()> {
	if let Some(parent) = dest.parent() {
		std::fs::create_dir_all(parent)?;
	}
	match std::fs::remove_file(dest) {
		Ok(()) | Err(_) => {}
	}
	if std::fs::hard_link(canonical, dest).is_err() {
		log::debug!("hardlinking {canonical:?} to {dest:?} failed, falling back to a full copy");
		std::fs::copy(canonical, dest)?;
	}
	Ok(())
}
