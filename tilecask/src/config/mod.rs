//! YAML configuration: a `mapproxy.yaml`-shaped file describing grids,
//! sources and caches, and a `seed.yaml`-shaped file describing coverages,
//! seed tasks and cleanup tasks. Only this bin crate touches YAML — the
//! library crates never parse configuration themselves.

mod build;
mod schema;

pub use build::{
	build_cache, build_caches, build_coverage, build_coverage_union, build_grid, build_grids, build_source, build_sources,
	load_coverage_file_as_coverage, load_mapproxy_config, load_seed_config,
};
pub use schema::{CacheConfig, CoverageConfig, GridConfig, LevelsConfig, MapproxyConfig, SeedConfig, SourceConfig};

impl LevelsConfig {
	/// Resolves to an explicit, sorted, deduplicated level list. `All`
	/// expands to every level the grid actually has.
	pub fn resolve(&self, grid: &tilecask_core::Grid) -> Vec<u8> {
		let mut levels: Vec<u8> = match self {
			LevelsConfig::All => (0..grid.levels() as u8).collect(),
			LevelsConfig::Range { from, to } => {
				if from <= to {
					(*from..=*to).collect()
				} else {
					(*to..=*from).collect()
				}
			}
			LevelsConfig::List(list) => list.clone(),
		};
		levels.sort_unstable();
		levels.dedup();
		levels
	}
}
