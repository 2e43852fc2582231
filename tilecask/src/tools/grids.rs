//! `grids`: lists configured grids, or (with `-s`/`-c`) estimates how many
//! tiles a coverage touches in each one by walking it the same way a seed
//! task would, without needing a cache on disk.

use crate::config;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tilecask_cache::seed::TileWalker;
use tilecask_core::{Grid, ProgressHandle};

#[derive(clap::Args, Debug)]
pub struct Subcommand {
	/// Path to the mapproxy-style config (grids/caches/sources)
	#[arg(short = 'f', long, value_name = "FILE")]
	pub mapproxy_config: PathBuf,

	/// Show only this grid
	#[arg(short = 'g', long)]
	pub grid: Option<String>,

	/// Show every configured grid (the default when -g is omitted)
	#[arg(long)]
	pub all: bool,

	/// Also list each level's resolution and grid size
	#[arg(short = 'l', long)]
	pub list_levels: bool,

	/// Seed config to read a named coverage from, for a tile-count estimate
	#[arg(short = 's', long, value_name = "FILE", requires = "coverage")]
	pub seed_config: Option<PathBuf>,

	/// Coverage name (from --seed-config) to estimate tile counts for
	#[arg(short = 'c', long, requires = "seed_config")]
	pub coverage: Option<String>,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	let mapproxy = config::load_mapproxy_config(&arguments.mapproxy_config)?;
	let grids = config::build_grids(&mapproxy)?;

	let selected: Vec<(&String, &Grid)> = match &arguments.grid {
		Some(name) => {
			let (name, grid) = grids.get_key_value(name).with_context(|| format!("unknown grid {name:?}"))?;
			vec![(name, grid)]
		}
		None => {
			let mut all: Vec<_> = grids.iter().collect();
			all.sort_by(|a, b| a.0.cmp(b.0));
			all
		}
	};

	let coverage = match (&arguments.seed_config, &arguments.coverage) {
		(Some(seed_path), Some(name)) => {
			let seed = config::load_seed_config(seed_path)?;
			Some(config::build_coverage(name, &seed.coverages)?)
		}
		_ => None,
	};

	for (name, grid) in selected {
		println!("{name}: srs={} levels={} tile_size={}x{}", grid.srs, grid.levels(), grid.tile_size.0, grid.tile_size.1);

		if arguments.list_levels {
			for level in 0..grid.levels() as u8 {
				let (cols, rows) = grid.grid_size(level);
				println!("  level {level}: resolution={:.6} grid_size={cols}x{rows}", grid.resolution(level));
			}
		}

		if let Some(coverage) = &coverage {
			let levels: Vec<u8> = (0..grid.levels() as u8).collect();
			let walker = TileWalker::new(grid, Some(coverage.clone()), levels);
			let progress = ProgressHandle::new("estimating", 0);
			let mut count = 0u64;
			walker
				.walk(&progress, |_coord| {
					count += 1;
					async { Ok(()) }
				})
				.await?;
			println!("  estimated tiles under coverage {:?}: {count}", arguments.coverage.as_deref().unwrap_or(""));
		}
	}

	Ok(())
}
