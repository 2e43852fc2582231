use crate::config;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tilecask_cache::{CleanupTask, SeedTask, TileManager, WorkerPool};
use tilecask_core::{Eta, ProgressHandle};
use tilecask_derive::context;
use tilecask_geometry::Coverage;

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true)]
pub struct Subcommand {
	/// Path to the mapproxy-style config (grids/caches/sources)
	#[arg(short = 'f', long, value_name = "FILE")]
	pub mapproxy_config: PathBuf,

	/// Path to the seed config (coverages/seeds/cleanups)
	#[arg(short = 's', long, value_name = "FILE")]
	pub seed_config: PathBuf,

	/// Only run these named seed tasks (default: all of them)
	#[arg(long = "seed", value_name = "NAMES", value_delimiter = ',')]
	pub seed_names: Vec<String>,

	/// Only run these named cleanup tasks (default: all of them)
	#[arg(long = "cleanup", value_name = "NAMES", value_delimiter = ',')]
	pub cleanup_names: Vec<String>,

	/// Number of tiles to build/remove concurrently
	#[arg(short = 'c', long, default_value_t = 2)]
	pub concurrency: usize,

	/// Walk the tasks and report what would happen without touching the cache
	#[arg(short = 'n', long = "dry-run")]
	pub dry_run: bool,

	/// Print a summary of tiles visited/built/removed per task
	#[arg(long)]
	pub summary: bool,

	/// Ask for confirmation before each task runs
	#[arg(short = 'i', long)]
	pub interactive: bool,

	/// Stop checking coverage this many levels before a task's deepest level
	#[arg(short = 'l', long = "skip-geoms-for-last-levels", default_value_t = 0)]
	pub skip_geoms_for_last_levels: u8,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	let mapproxy = config::load_mapproxy_config(&arguments.mapproxy_config)?;
	let seed = config::load_seed_config(&arguments.seed_config)?;

	let grids = config::build_grids(&mapproxy)?;
	let sources = config::build_sources(&mapproxy, &grids)?;
	let caches: HashMap<String, Arc<TileManager>> =
		config::build_caches(&mapproxy, &grids, &sources)?.into_iter().map(|(n, m)| (n, Arc::new(m))).collect();

	let seed_names = select_names(&arguments.seed_names, seed.seeds.keys());
	let cleanup_names = select_names(&arguments.cleanup_names, seed.cleanups.keys());

	let mut total_visited = 0u64;

	for name in &seed_names {
		let task_cfg = seed.seeds.get(name).with_context(|| format!("unknown seed task {name:?}"))?;
		if arguments.interactive && !confirm(&format!("run seed task {name:?}?"))? {
			log::info!("skipping seed task {name:?}");
			continue;
		}

		let coverage = config::build_coverage_union(&task_cfg.coverages, &seed.coverages)?;

		for cache_name in &task_cfg.caches {
			let manager = caches.get(cache_name).with_context(|| format!("seed task {name:?} references unknown cache {cache_name:?}"))?;
			let levels = task_cfg.levels.resolve(manager.grid());

			if arguments.dry_run {
				let visited = count_stale(manager, coverage.clone(), &levels, arguments.skip_geoms_for_last_levels).await?;
				log::info!("[dry-run] seed {name}/{cache_name}: {visited} stale tile(s) across {} level(s)", levels.len());
				total_visited += visited;
				continue;
			}

			let pool = WorkerPool::new(arguments.concurrency);
			let mut task = SeedTask::new(manager.clone(), levels).with_pool(pool).with_skip_geoms_for_last_levels(arguments.skip_geoms_for_last_levels);
			if let Some(coverage) = &coverage {
				task = task.with_coverage(coverage.clone());
			}

			task.run(|progress: &ProgressHandle, eta: &Eta| {
				if arguments.summary {
					log::info!(
						"seed {name}/{cache_name}: {}/{} tiles, eta {:?}",
						progress.position(),
						progress.total(),
						eta.remaining()
					);
				}
			})
			.await?;
		}
	}

	for name in &cleanup_names {
		let task_cfg = seed.cleanups.get(name).with_context(|| format!("unknown cleanup task {name:?}"))?;
		if arguments.interactive && !confirm(&format!("run cleanup task {name:?}?"))? {
			log::info!("skipping cleanup task {name:?}");
			continue;
		}

		let coverage = config::build_coverage_union(&task_cfg.coverages, &seed.coverages)?;
		let remove_timestamp = match task_cfg.remove_before_secs {
			Some(secs) => SystemTime::now() - Duration::from_secs(secs),
			None => SystemTime::now(),
		};

		for cache_name in &task_cfg.caches {
			let manager = caches
				.get(cache_name)
				.with_context(|| format!("cleanup task {name:?} references unknown cache {cache_name:?}"))?;
			let levels = task_cfg.levels.resolve(manager.grid());

			if arguments.dry_run {
				log::info!(
					"[dry-run] cleanup {name}/{cache_name}: would remove tiles older than {remove_timestamp:?} across {} level(s)",
					levels.len()
				);
				continue;
			}

			let mut task = CleanupTask::new(manager.grid().clone(), manager.cache().clone(), levels, remove_timestamp);
			if let Some(coverage) = &coverage {
				task = task.with_coverage(coverage.clone());
			}
			task.run().await?;
		}
	}

	if arguments.summary && arguments.dry_run {
		log::info!("total stale tiles across dry-run: {total_visited}");
	}

	Ok(())
}

/// `--seed`/`--cleanup NAMES` filters to that explicit set; an empty filter
/// (the flag wasn't given) runs every task the config defines.
fn select_names<'a>(filter: &'a [String], all: impl Iterator<Item = &'a String>) -> Vec<String> {
	if filter.is_empty() {
		all.cloned().collect()
	} else {
		filter.to_vec()
	}
}

/// Walks `levels` the same way `SeedTask` would, counting tiles that are
/// missing or stale without building anything — backs `seed --dry-run`.
#[context("counting stale tiles")]
async fn count_stale(
	manager: &TileManager,
	coverage: Option<Arc<dyn Coverage>>,
	levels: &[u8],
	skip_geoms_for_last_levels: u8,
) -> Result<u64> {
	let walker = tilecask_cache::seed::TileWalker::new(manager.grid(), coverage, levels.to_vec())
		.with_skip_geoms_for_last_levels(skip_geoms_for_last_levels);
	let progress = ProgressHandle::new("counting", 0);
	let mut stale = 0u64;
	walker
		.walk(&progress, |coord| {
			if manager.is_stale(coord).unwrap_or(true) {
				stale += 1;
			}
			async { Ok(()) }
		})
		.await?;
	Ok(stale)
}

fn confirm(prompt: &str) -> Result<bool> {
	print!("{prompt} [y/N] ");
	std::io::stdout().flush()?;
	let mut answer = String::new();
	std::io::stdin().read_line(&mut answer)?;
	Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
