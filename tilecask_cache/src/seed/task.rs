//! `SeedTask`/`CleanupTask`: drives a `TileWalker` over a `TileManager`'s
//! grid, building stale/missing tiles or removing old ones. Mirrors
//! mapproxy's `seed.seeder.SeedTask`/`CleanupTask`: a coverage-scoped,
//! level-bounded walk with progress reporting and bounded-concurrency
//! builds.

use super::walker::TileWalker;
use crate::manager::TileManager;
use crate::pool::WorkerPool;
use crate::tile_cache::FileTileCache;
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tilecask_core::{Eta, ProgressHandle, TileCoord};
use tilecask_geometry::Coverage;

const DEFAULT_MAX_REPEAT: u32 = 10;
const DEFAULT_START_BACKOFF: Duration = Duration::from_secs(2);

/// Retries `attempt` with a doubling backoff (`start * 2^n`), matching
/// `mapproxy.seed.util.exp_backoff`: a transient upstream failure (a flaky
/// WMS endpoint, a dropped connection) shouldn't abort the whole seed run.
async fn exp_backoff<F, Fut>(max_repeat: u32, start: Duration, mut attempt: F) -> Result<()>
where
	F: FnMut() -> Fut,
	Fut: std::future::Future<Output = Result<()>>,
{
	let mut n = 0;
	loop {
		match attempt().await {
			Ok(()) => return Ok(()),
			Err(err) if n + 1 >= max_repeat => return Err(err),
			Err(err) => {
				let wait_for = start * 2u32.pow(n);
				log::warn!("seed build failed, retrying in {wait_for:?}: {err:#}");
				tokio::time::sleep(wait_for).await;
				n += 1;
			}
		}
	}
}

/// Builds every missing or stale tile in `levels` within `coverage`.
pub struct SeedTask {
	manager: Arc<TileManager>,
	levels: Vec<u8>,
	coverage: Option<Arc<dyn Coverage>>,
	skip_geoms_for_last_levels: u8,
	pool: WorkerPool,
	max_repeat: u32,
	start_backoff: Duration,
}

impl SeedTask {
	pub fn new(manager: Arc<TileManager>, levels: Vec<u8>) -> Self {
		SeedTask {
			manager,
			levels,
			coverage: None,
			skip_geoms_for_last_levels: 0,
			pool: WorkerPool::io_bound(),
			max_repeat: DEFAULT_MAX_REPEAT,
			start_backoff: DEFAULT_START_BACKOFF,
		}
	}

	pub fn with_coverage(mut self, coverage: Arc<dyn Coverage>) -> Self {
		self.coverage = Some(coverage);
		self
	}

	pub fn with_skip_geoms_for_last_levels(mut self, n: u8) -> Self {
		self.skip_geoms_for_last_levels = n;
		self
	}

	pub fn with_pool(mut self, pool: WorkerPool) -> Self {
		self.pool = pool;
		self
	}

	pub fn with_retry(mut self, max_repeat: u32, start_backoff: Duration) -> Self {
		self.max_repeat = max_repeat;
		self.start_backoff = start_backoff;
		self
	}

	async fn build(&self, coord: TileCoord) -> Result<()> {
		if !self.manager.is_stale(coord)? {
			return Ok(());
		}
		exp_backoff(self.max_repeat, self.start_backoff, || async {
			self.pool.run(self.manager.load_tile_coords(&[coord])).await?;
			Ok(())
		})
		.await
	}

	/// Walks every tile the task covers, skipping ones that are already
	/// cached and fresh, and reports progress/ETA as it goes via
	/// `on_progress`.
	pub async fn run(&self, mut on_progress: impl FnMut(&ProgressHandle, &Eta)) -> Result<()> {
		let mut walker = TileWalker::new(self.manager.grid(), self.coverage.clone(), self.levels.clone())
			.with_skip_geoms_for_last_levels(self.skip_geoms_for_last_levels);
		if let Some(meta_size) = self.manager.meta_size() {
			walker = walker.with_meta_tiles(meta_size);
		}
		let progress = ProgressHandle::new("seeding", 0);
		let mut eta = Eta::new();

		walker.walk(&progress, |coord| self.build(coord)).await?;

		eta.update(progress.fraction());
		on_progress(&progress, &eta);
		progress.finish();
		Ok(())
	}
}

/// Removes every cached tile in `levels` within `coverage` that's older
/// than `remove_timestamp`, then prunes any directories the removals left
/// empty. Mirrors `seed.cleanup.CleanupTask`.
pub struct CleanupTask {
	grid: tilecask_core::Grid,
	cache: FileTileCache,
	levels: Vec<u8>,
	coverage: Option<Arc<dyn Coverage>>,
	remove_timestamp: SystemTime,
}

impl CleanupTask {
	pub fn new(grid: tilecask_core::Grid, cache: FileTileCache, levels: Vec<u8>, remove_timestamp: SystemTime) -> Self {
		CleanupTask { grid, cache, levels, coverage: None, remove_timestamp }
	}

	pub fn with_coverage(mut self, coverage: Arc<dyn Coverage>) -> Self {
		self.coverage = Some(coverage);
		self
	}

	pub async fn run(&self) -> Result<()> {
		let walker = TileWalker::new(&self.grid, self.coverage.clone(), self.levels.clone());
		let progress = ProgressHandle::new("cleanup", 0);

		walker
			.walk(&progress, |coord| {
				let cache = self.cache.clone();
				let remove_timestamp = self.remove_timestamp;
				async move {
					if let Ok(created) = cache.timestamp_created(coord) {
						if created < remove_timestamp {
							cache.remove(coord)?;
						}
					}
					Ok(())
				}
			})
			.await?;

		progress.finish();
		prune_empty_dirs(self.cache.cache_dir())?;
		Ok(())
	}
}

/// Recursively removes directories left empty by tile removal. Stops at
/// `root` itself — the cache directory is never removed.
fn prune_empty_dirs(dir: &std::path::Path) -> Result<bool> {
	if !dir.is_dir() {
		return Ok(false);
	}
	let mut empty = true;
	for entry in std::fs::read_dir(dir)? {
		let entry = entry?;
		let path = entry.path();
		if path.is_dir() {
			if prune_empty_dirs(&path)? {
				std::fs::remove_dir(&path)?;
			} else {
				empty = false;
			}
		} else {
			empty = false;
		}
	}
	Ok(empty)
}

/// Atomically replaces every tile at `level` with the contents of
/// `staging_dir`, so concurrent readers never see a partially-rebuilt
/// level: the old level directory is renamed aside, the staging directory
/// renamed into its place, then the old one removed. Used for a "secure"
/// reseed of a level that's served live.
pub fn swap_level_atomically(cache: &FileTileCache, level: u8, staging_dir: &std::path::Path) -> Result<()> {
	let live = cache.level_location(level);
	let backup = live.with_file_name(format!("{:02}.bak-{}", level, std::process::id()));

	if live.exists() {
		std::fs::rename(&live, &backup)?;
	}
	if let Some(parent) = live.parent() {
		std::fs::create_dir_all(parent)?;
	}
	if let Err(e) = std::fs::rename(staging_dir, &live) {
		if backup.exists() {
			let _ = std::fs::rename(&backup, &live);
		}
		return Err(e.into());
	}
	if backup.exists() {
		std::fs::remove_dir_all(&backup)?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::source::DebugSource;
	use std::time::Duration;
	use tempfile::TempDir;
	use tilecask_core::{ResolutionPolicy, TileCoord, TileFormat};

	fn setup() -> (TempDir, Arc<TileManager>) {
		let dir = TempDir::new().unwrap();
		let grid = tilecask_core::Grid::new("EPSG:3857", false, None, (256, 256), ResolutionPolicy::Global, None, 1.15).unwrap();
		let cache = FileTileCache::new(dir.path().to_path_buf(), TileFormat::PNG, false).unwrap();
		let sources: Vec<Arc<dyn crate::source::Source>> = vec![Arc::new(DebugSource::new(false))];
		(dir, Arc::new(TileManager::new(grid, cache, sources)))
	}

	#[tokio::test]
	async fn seed_task_builds_every_tile_in_range() {
		let (_dir, manager) = setup();
		let task = SeedTask::new(manager.clone(), vec![0, 1]);
		task.run(|_, _| {}).await.unwrap();

		for level in 0..=1u8 {
			let (cols, rows) = manager.grid().grid_size(level);
			for y in 0..rows as i64 {
				for x in 0..cols as i64 {
					assert!(manager.is_cached(TileCoord::new(x, y, level)));
				}
			}
		}
	}

	#[tokio::test]
	async fn cleanup_task_removes_tiles_older_than_the_cutoff() {
		let (_dir, manager) = setup();
		let task = SeedTask::new(manager.clone(), vec![0]);
		task.run(|_, _| {}).await.unwrap();

		let cleanup = CleanupTask::new(manager.grid().clone(), manager.cache().clone(), vec![0], SystemTime::now() + Duration::from_secs(1));
		cleanup.run().await.unwrap();

		let (cols, rows) = manager.grid().grid_size(0);
		for y in 0..rows as i64 {
			for x in 0..cols as i64 {
				assert!(!manager.is_cached(TileCoord::new(x, y, 0)));
			}
		}
	}
}
