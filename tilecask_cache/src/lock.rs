//! A directory-based advisory lock coordinating at-most-one metatile build
//! across every process sharing a cache directory.
//!
//! Acquisition is a blocking operation (it polls the filesystem), so callers
//! on the async path run it through `tokio::task::spawn_blocking`.

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tilecask_core::error::CoreError;

/// How stale a lock artifact must be before a new acquirer is allowed to
/// reclaim it, regardless of whether the holding process is still alive.
const DEFAULT_MAX_LOCK_TIME: Duration = Duration::from_secs(300);
const POLL_STEP: Duration = Duration::from_millis(10);
const POLL_STEP_CAP: Duration = Duration::from_millis(250);

/// A lock on a single metatile build, identified by a deterministic path
/// under `lock_dir`. `std::fs::create_dir` is the atomicity primitive: only
/// one caller can ever create a given directory, making it a portable
/// exclusive-artifact lock with no platform-specific primitive needed.
pub struct FileLock {
	path: PathBuf,
	timeout: Duration,
	max_lock_time: Duration,
}

/// Held for the duration of a build; releases the lock (removes its
/// directory) on drop, including on a panicking unwind, so a metatile build
/// can never leak a lock no matter how it exits.
pub struct FileLockGuard {
	path: PathBuf,
}

impl FileLock {
	pub fn new(path: PathBuf, timeout: Duration) -> Self {
		FileLock {
			path,
			timeout,
			max_lock_time: DEFAULT_MAX_LOCK_TIME,
		}
	}

	pub fn with_max_lock_time(mut self, max_lock_time: Duration) -> Self {
		self.max_lock_time = max_lock_time;
		self
	}

	/// Blocks until the lock is acquired or `timeout` elapses.
	pub fn lock(&self) -> Result<FileLockGuard> {
		let deadline = Instant::now() + self.timeout;
		let mut step = POLL_STEP;

		loop {
			if let Some(parent) = self.path.parent() {
				fs::create_dir_all(parent)?;
			}

			match fs::create_dir(&self.path) {
				Ok(()) => {
					self.write_pid();
					return Ok(FileLockGuard { path: self.path.clone() });
				}
				Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
					if self.is_stale() {
						// Multiple stale acquirers race here; only one
						// `remove_dir` succeeds, the rest loop back to a
						// fresh `create_dir` attempt.
						let _ = fs::remove_dir_all(&self.path);
						continue;
					}
				}
				Err(e) => return Err(e.into()),
			}

			if Instant::now() >= deadline {
				return Err(
					CoreError::LockTimeout {
						path: self.path.display().to_string(),
						waited_ms: self.timeout.as_millis() as u64,
					}
					.into(),
				);
			}

			std::thread::sleep(step.min(POLL_STEP_CAP));
			step *= 2;
		}
	}

	fn write_pid(&self) {
		let pid_path = self.path.join("pid");
		if let Ok(mut f) = fs::File::create(pid_path) {
			let _ = write!(f, "{}", std::process::id());
		}
	}

	/// True if the lock artifact is old enough, or its holder PID is no
	/// longer running, that a new acquirer should reclaim it.
	fn is_stale(&self) -> bool {
		let Ok(meta) = fs::metadata(&self.path) else {
			return false;
		};
		let Ok(modified) = meta.modified() else {
			return false;
		};
		let age = SystemTime::now().duration_since(modified).unwrap_or(Duration::ZERO);
		if age > self.max_lock_time {
			return true;
		}
		match fs::read_to_string(self.path.join("pid")) {
			Ok(contents) => match contents.trim().parse::<u32>() {
				Ok(pid) => !pid_is_running(pid),
				Err(_) => false,
			},
			Err(_) => false,
		}
	}
}

impl Drop for FileLockGuard {
	fn drop(&mut self) {
		let _ = fs::remove_dir_all(&self.path);
	}
}

#[cfg(target_os = "linux")]
fn pid_is_running(pid: u32) -> bool {
	// `/proc/<pid>` existing is the same liveness check `os.kill(pid, 0)`
	// performs in the original, without reaching for a libc binding.
	Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_is_running(_pid: u32) -> bool {
	// No portable liveness check outside /proc; fall back to the mtime
	// threshold alone, treating every lock as "possibly still held".
	true
}

/// The lock artifact path for one tile, scoped by a per-cache id so two
/// caches sharing a `lock_dir` never collide.
pub fn lock_path(lock_dir: &Path, cache_id: &str, coord: tilecask_core::TileCoord) -> PathBuf {
	lock_dir.join(format!("{cache_id}-{}-{}-{}.lck", coord.x, coord.y, coord.level))
}
