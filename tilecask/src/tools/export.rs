//! `export`: copies (or builds) tiles from a configured cache or source into
//! a standalone directory store. Container formats (mbtiles/sqlite/
//! geopackage/compact-v1/compact-v2) would need their own writer crates —
//! intentionally out of scope for this core — so only the two directory-tree
//! layouts (`tms`, `arcgis`) this workspace can already write are supported.

use super::parse_levels_spec;
use crate::config;
use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tilecask_cache::seed::TileWalker;
use tilecask_cache::{FileTileCache, SeedTask, Source, Tile, TileManager, WorkerPool};
use tilecask_core::{Grid, ProgressHandle, TileFormat};
use tilecask_geometry::Coverage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ExportType {
	Mbtile,
	Sqlite,
	Geopackage,
	CompactV1,
	CompactV2,
	Tms,
	Arcgis,
}

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true)]
pub struct Subcommand {
	/// Path to the mapproxy-style config (grids/caches/sources)
	#[arg(short = 'f', long, value_name = "FILE")]
	pub mapproxy_config: PathBuf,

	/// Cache or source name to export from
	#[arg(long)]
	pub source: String,

	/// Grid name from the config, or an inline "SRS:WxH:xmin,ymin,xmax,ymax"
	/// spec. Defaults to the source cache's own grid.
	#[arg(long)]
	pub grid: Option<String>,

	/// Destination directory
	#[arg(long)]
	pub dest: PathBuf,

	#[arg(long, value_enum)]
	pub r#type: ExportType,

	/// Levels to export, e.g. "1..6,8"
	#[arg(long)]
	pub levels: String,

	/// Coverage file ("minx,miny,maxx,maxy,srs" per line)
	#[arg(long)]
	pub coverage: Option<PathBuf>,

	/// Expected SRS of the resolved grid; only checked as a sanity warning,
	/// since the grid itself is always authoritative.
	#[arg(long)]
	pub srs: Option<String>,

	#[arg(long, default_value_t = 2)]
	pub concurrency: usize,

	/// Build tiles missing from the source instead of only copying what's
	/// already cached
	#[arg(long)]
	pub fetch_missing_tiles: bool,

	/// Overwrite an existing destination directory
	#[arg(long)]
	pub force: bool,

	#[arg(short = 'n', long = "dry-run")]
	pub dry_run: bool,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	if !matches!(arguments.r#type, ExportType::Tms | ExportType::Arcgis) {
		bail!(
			"export --type {:?} needs a container-writer crate (sqlite/mbtiles/geopackage) this core deliberately doesn't carry; supported types are tms, arcgis",
			arguments.r#type
		);
	}

	if arguments.dest.exists() {
		if !arguments.force {
			bail!("destination {:?} already exists; pass --force to overwrite", arguments.dest);
		}
		std::fs::remove_dir_all(&arguments.dest)?;
	}

	let mapproxy = config::load_mapproxy_config(&arguments.mapproxy_config)?;
	let grids = config::build_grids(&mapproxy)?;
	let sources = config::build_sources(&mapproxy, &grids)?;

	let levels = parse_levels_spec(&arguments.levels)?;
	let coverage = arguments.coverage.as_deref().map(load_coverage_file).transpose()?;

	if let Some(cache_cfg) = mapproxy.caches.get(&arguments.source) {
		let src_manager = config::build_cache(&arguments.source, cache_cfg, &grids, &sources)?;
		let grid = resolve_grid(arguments.grid.as_deref(), &grids, src_manager.grid())?;
		warn_on_srs_mismatch(arguments.srs.as_deref(), &grid);
		let dest_cache = FileTileCache::new(arguments.dest.clone(), src_manager.cache().format(), false)?;

		if arguments.dry_run {
			log::info!("[dry-run] would export {} level(s) from cache {:?} into {:?}", levels.len(), arguments.source, arguments.dest);
			return Ok(());
		}

		if arguments.fetch_missing_tiles {
			let cache_sources: Vec<Arc<dyn Source>> =
				cache_cfg.sources.iter().map(|s| sources.get(s).cloned().context("missing source")).collect::<Result<_>>()?;
			let dest_manager = Arc::new(TileManager::new(grid, dest_cache, cache_sources));
			let mut task = SeedTask::new(dest_manager, levels).with_pool(WorkerPool::new(arguments.concurrency));
			if let Some(coverage) = coverage.clone() {
				task = task.with_coverage(coverage);
			}
			task.run(|_, _| {}).await?;
		} else {
			copy_existing_tiles(&grid, src_manager.cache(), &dest_cache, coverage, &levels, arguments.concurrency).await?;
		}
	} else if let Some(src) = sources.get(&arguments.source).cloned() {
		if !arguments.fetch_missing_tiles {
			bail!("source {:?} has no on-disk cache to copy from; pass --fetch-missing-tiles to build tiles from it directly", arguments.source);
		}
		let grid = resolve_grid(arguments.grid.as_deref(), &grids, &default_grid())?;
		warn_on_srs_mismatch(arguments.srs.as_deref(), &grid);
		if arguments.dry_run {
			log::info!("[dry-run] would build {} level(s) from source {:?} into {:?}", levels.len(), arguments.source, arguments.dest);
			return Ok(());
		}
		let dest_cache = FileTileCache::new(arguments.dest.clone(), TileFormat::PNG, false)?;
		let dest_manager = Arc::new(TileManager::new(grid, dest_cache, vec![src]));
		let mut task = SeedTask::new(dest_manager, levels).with_pool(WorkerPool::new(arguments.concurrency));
		if let Some(coverage) = coverage {
			task = task.with_coverage(coverage);
		}
		task.run(|_, _| {}).await?;
	} else {
		bail!("unknown cache or source {:?}", arguments.source);
	}

	Ok(())
}

/// A grid with no configuration to fall back on: only reachable when
/// `--source` names a raw source and `--grid` was neither a config name nor
/// a parseable inline spec.
fn default_grid() -> Grid {
	Grid::new("EPSG:3857", false, None, (256, 256), tilecask_core::ResolutionPolicy::Global, None, 1.15).expect("default grid is always valid")
}

/// `--srs` is a sanity check, not an override: the grid's own SRS always
/// wins, this just warns when they disagree since that's almost always a
/// copy-paste mistake in the invocation.
fn warn_on_srs_mismatch(srs: Option<&str>, grid: &Grid) {
	if let Some(srs) = srs {
		if !srs.eq_ignore_ascii_case(&grid.srs) {
			log::warn!("--srs {srs:?} does not match grid srs {:?}; the grid's srs is authoritative", grid.srs);
		}
	}
}

fn resolve_grid(spec: Option<&str>, grids: &HashMap<String, Grid>, fallback: &Grid) -> Result<Grid> {
	match spec {
		None => Ok(fallback.clone()),
		Some(spec) => {
			if let Some(grid) = grids.get(spec) {
				return Ok(grid.clone());
			}
			parse_inline_grid(spec)
		}
	}
}

/// Parses `"SRS:WxH:xmin,ymin,xmax,ymax"` (bbox segment optional, defaulting
/// to the SRS's natural world extent).
fn parse_inline_grid(spec: &str) -> Result<Grid> {
	let parts: Vec<&str> = spec.split(':').collect();
	if parts.len() < 2 {
		bail!("unrecognized --grid {spec:?}: expected a config grid name or \"SRS:WxH[:xmin,ymin,xmax,ymax]\"");
	}
	let srs = parts[0].to_string();
	let (w, h) = parts[1].split_once('x').context("grid tile size must be \"WxH\"")?;
	let tile_size = (w.parse()?, h.parse()?);
	let is_geodetic = srs.eq_ignore_ascii_case("EPSG:4326");

	let extent = match parts.get(2) {
		None => None,
		Some(bbox) => {
			let nums: Vec<f64> = bbox.split(',').map(str::parse).collect::<Result<_, _>>()?;
			if nums.len() != 4 {
				bail!("grid bbox must have 4 components");
			}
			Some(tilecask_core::Extent::new(nums[0], nums[1], nums[2], nums[3])?)
		}
	};

	Grid::new(srs, is_geodetic, extent, tile_size, tilecask_core::ResolutionPolicy::Global, None, 1.15)
}

fn load_coverage_file(path: &std::path::Path) -> Result<Arc<dyn Coverage>> {
	config::load_coverage_file_as_coverage(path)
}

/// Copies every already-cached tile within `levels`/`coverage` from `src`
/// into `dest`, re-encoding to `dest`'s format if it differs. Tiles missing
/// from `src` are logged and skipped — use `--fetch-missing-tiles` to build
/// them instead.
async fn copy_existing_tiles(
	grid: &Grid,
	src: &FileTileCache,
	dest: &FileTileCache,
	coverage: Option<Arc<dyn Coverage>>,
	levels: &[u8],
	_concurrency: usize,
) -> Result<()> {
	let walker = TileWalker::new(grid, coverage, levels.to_vec());
	let progress = ProgressHandle::new("export", 0);
	let mut missing = 0u64;

	walker
		.walk(&progress, |coord| {
			let mut tile = Tile::new(coord);
			let result = match src.load(&mut tile, false) {
				Ok(true) => dest.store(&mut tile),
				Ok(false) => {
					missing += 1;
					Ok(())
				}
				Err(e) => Err(e),
			};
			async move { result }
		})
		.await?;

	if missing > 0 {
		log::warn!("{missing} tile(s) were not cached in the source and were skipped");
	}
	Ok(())
}
