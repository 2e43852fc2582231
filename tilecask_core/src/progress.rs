//! Progress reporting for long-running operations (seeding, cleanup): a
//! cheaply-cloneable handle tracking position/total, plus the weighted
//! moving-average ETA estimator the seeder uses to pace its reporting.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct ProgressState {
	message: String,
	position: u64,
	total: u64,
	finished: bool,
}

/// A handle for tracking the position/total of one operation. Clones share
/// the same underlying state, so a handle can be moved into worker tasks and
/// polled from the reporting loop.
#[derive(Clone)]
pub struct ProgressHandle {
	state: Arc<Mutex<ProgressState>>,
}

impl ProgressHandle {
	pub fn new(message: impl Into<String>, total: u64) -> Self {
		ProgressHandle {
			state: Arc::new(Mutex::new(ProgressState {
				message: message.into(),
				position: 0,
				total,
				finished: false,
			})),
		}
	}

	pub fn set_position(&self, position: u64) {
		let mut state = self.state.lock().unwrap();
		state.position = position.min(state.total);
	}

	pub fn inc(&self, delta: u64) {
		let mut state = self.state.lock().unwrap();
		state.position = state.position.saturating_add(delta).min(state.total);
	}

	pub fn set_max_value(&self, total: u64) {
		let mut state = self.state.lock().unwrap();
		state.total = total;
		if state.position > total {
			state.position = total;
		}
	}

	pub fn finish(&self) {
		let mut state = self.state.lock().unwrap();
		state.position = state.total;
		state.finished = true;
	}

	pub fn position(&self) -> u64 {
		self.state.lock().unwrap().position
	}

	pub fn total(&self) -> u64 {
		self.state.lock().unwrap().total
	}

	pub fn is_finished(&self) -> bool {
		self.state.lock().unwrap().finished
	}

	/// Fraction complete in `[0.0, 1.0]`; `0.0` when `total` is zero.
	pub fn fraction(&self) -> f64 {
		let state = self.state.lock().unwrap();
		if state.total == 0 {
			0.0
		} else {
			state.position as f64 / state.total as f64
		}
	}

	pub fn message(&self) -> String {
		self.state.lock().unwrap().message.clone()
	}
}

/// Estimates time remaining from a weighted moving average of recent
/// progress ticks, weighting recent ticks more heavily (`(i+1)^1.2`) so the
/// estimate adapts as throughput changes over a long seed run rather than
/// averaging in early, unrepresentative ticks forever.
pub struct Eta {
	avgs: Vec<Duration>,
	tick_start: Instant,
	progress: f64,
	/// Number of progress buckets tracked; matches the granularity the
	/// original reporter samples at.
	ticks: u32,
}

impl Eta {
	pub fn new() -> Self {
		Eta {
			avgs: Vec::new(),
			tick_start: Instant::now(),
			progress: 0.0,
			ticks: 1000,
		}
	}

	/// Record a new overall progress fraction (`0.0..=1.0`). Appends a
	/// sample to the moving average whenever progress has advanced past the
	/// next `1/ticks` bucket.
	pub fn update(&mut self, progress: f64) {
		self.progress = progress;
		if (progress * self.ticks as f64 - 1.0) > self.avgs.len() as f64 {
			self.avgs.push(self.tick_start.elapsed());
			self.tick_start = Instant::now();
		}
	}

	/// Estimated remaining duration, or `None` until at least one sample has
	/// been recorded.
	pub fn remaining(&self) -> Option<Duration> {
		if self.avgs.is_empty() {
			return None;
		}
		let mut weight_sum = 0.0;
		let mut weighted_avg = 0.0;
		for (i, avg) in self.avgs.iter().enumerate() {
			let weight = ((i + 1) as f64).powf(1.2);
			weight_sum += weight;
			weighted_avg += avg.as_secs_f64() * weight;
		}
		let per_tick = weighted_avg / weight_sum;
		let remaining_secs = (1.0 - self.progress).max(0.0) * per_tick * self.ticks as f64;
		Some(Duration::from_secs_f64(remaining_secs.max(0.0)))
	}
}

impl Default for Eta {
	fn default() -> Self {
		Self::new()
	}
}
