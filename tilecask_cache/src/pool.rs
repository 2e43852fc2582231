//! A bounded pool of concurrent tasks, reimplementing mapproxy's
//! `ThreadedExecutor` (a fixed-size thread pool fed through a queue) as a
//! `tokio` semaphore-gated task pool: each `spawn` acquires a permit before
//! running, so the number of in-flight futures never exceeds `capacity`
//! regardless of how many are queued.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct WorkerPool {
	semaphore: Arc<Semaphore>,
}

impl WorkerPool {
	pub fn new(capacity: usize) -> Self {
		WorkerPool {
			semaphore: Arc::new(Semaphore::new(capacity.max(1))),
		}
	}

	/// Sized for I/O-bound work (upstream fetches, cache writes) per
	/// `ConcurrencyLimits::default().io_bound`.
	pub fn io_bound() -> Self {
		Self::new(tilecask_core::ConcurrencyLimits::default().io_bound)
	}

	/// Runs `task` once a permit is free, returning its result. Callers that
	/// need many tasks run concurrently should use [`WorkerPool::run_all`]
	/// instead of spawning each one individually, so the bound applies across
	/// the whole batch rather than per call.
	pub async fn run<F, T>(&self, task: F) -> T
	where
		F: Future<Output = T>,
	{
		let _permit = self.semaphore.acquire().await.expect("semaphore is never closed");
		task.await
	}

	/// Runs every task in `tasks` concurrently, bounded to `capacity`
	/// in-flight at a time, and returns their results in the original order.
	pub async fn run_all<F, T>(&self, tasks: impl IntoIterator<Item = F>) -> Vec<T>
	where
		F: Future<Output = T>,
	{
		join_all(tasks.into_iter().map(|task| self.run(task))).await
	}

	pub fn capacity(&self) -> usize {
		self.semaphore.available_permits()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	#[tokio::test]
	async fn run_all_never_exceeds_capacity() {
		let pool = WorkerPool::new(2);
		let in_flight = Arc::new(AtomicUsize::new(0));
		let max_seen = Arc::new(AtomicUsize::new(0));

		let tasks: Vec<_> = (0..8)
			.map(|_| {
				let in_flight = in_flight.clone();
				let max_seen = max_seen.clone();
				async move {
					let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
					max_seen.fetch_max(now, Ordering::SeqCst);
					tokio::time::sleep(Duration::from_millis(5)).await;
					in_flight.fetch_sub(1, Ordering::SeqCst);
				}
			})
			.collect();

		pool.run_all(tasks).await;
		assert!(max_seen.load(Ordering::SeqCst) <= 2);
	}
}
