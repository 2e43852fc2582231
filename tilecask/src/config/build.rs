//! Turns the serde config shapes into the runtime objects `tilecask_cache`
//! and `tilecask_core` actually operate on: `Grid`s, `Source`s, `FileTileCache`s
//! wrapped in `TileManager`s, and `Coverage`s for the seeder/cleanup walkers.

use super::schema::{
	CacheConfig, CoverageConfig, GridConfig, MapproxyConfig, ResFactorConfig, SeedConfig, SourceConfig,
};
use anyhow::{Context, Result, bail};
use reqwest::Url;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tilecask_cache::{DebugSource, FileTileCache, Source, TiledSource, TileManager, TmsClient, WmsClient, WmsSource};
use tilecask_core::{Extent, Grid, ResolutionPolicy, TileFormat};
use tilecask_derive::context;
use tilecask_geometry::{BBoxCoverage, Coverage, MultiCoverage};

pub fn load_mapproxy_config(path: &Path) -> Result<MapproxyConfig> {
	load_yaml(path)
}

pub fn load_seed_config(path: &Path) -> Result<SeedConfig> {
	load_yaml(path)
}

#[context("reading config file {path:?}")]
fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
	let raw = std::fs::read_to_string(path)?;
	Ok(serde_yaml_ng::from_str(&raw)?)
}

#[context("building grid {name:?}")]
pub fn build_grid(name: &str, cfg: &GridConfig) -> Result<Grid> {
	let extent = cfg
		.bbox
		.map(|[x_min, y_min, x_max, y_max]| Extent::new(x_min, y_min, x_max, y_max))
		.transpose()?;

	let resolutions = if let Some(list) = &cfg.resolutions {
		ResolutionPolicy::Custom(list.clone())
	} else {
		match cfg.res_factor {
			Some(ResFactorConfig::Global) | None => ResolutionPolicy::Global,
			Some(ResFactorConfig::Sqrt2) => ResolutionPolicy::Sqrt2,
			Some(ResFactorConfig::Factor(f)) => ResolutionPolicy::Factor(f),
		}
	};

	Grid::new(
		cfg.srs.clone(),
		cfg.is_geodetic,
		extent,
		(cfg.tile_size[0], cfg.tile_size[1]),
		resolutions,
		cfg.num_levels,
		cfg.stretch_factor.unwrap_or(1.15),
	)
}

pub fn build_grids(cfg: &MapproxyConfig) -> Result<HashMap<String, Grid>> {
	cfg.grids.iter().map(|(name, g)| Ok((name.clone(), build_grid(name, g)?))).collect()
}

#[context("building source {name:?}")]
pub fn build_source(name: &str, cfg: &SourceConfig, grids: &HashMap<String, Grid>) -> Result<Arc<dyn Source>> {
	Ok(match cfg {
		SourceConfig::Wms {
			url,
			layers,
			version,
			format,
			supported_srs,
			supports_meta_tiles,
			transparent,
			timeout_secs,
		} => {
			let mut client = WmsClient::new(Url::parse(url)?, layers.clone())?;
			if let Some(version) = version {
				client = client.with_version(version.clone());
			}
			if let Some(format) = format {
				client = client.with_format(TileFormat::parse_str(format)?);
			}
			if let Some(timeout) = timeout_secs {
				client = client.with_timeout(Duration::from_secs(*timeout))?;
			}
			let mut source = WmsSource::new(client, *transparent, *supports_meta_tiles);
			if !supported_srs.is_empty() {
				source = source.with_supported_srs(supported_srs.clone());
			}
			Arc::new(source)
		}
		SourceConfig::Tms {
			url,
			grid: grid_name,
			format,
			origin_top_left,
			transparent,
			timeout_secs,
		} => {
			let grid = grids
				.get(grid_name)
				.with_context(|| format!("tms source {name:?} references unknown grid {grid_name:?}"))?
				.clone();
			let mut client = TmsClient::new(Url::parse(url)?, TileFormat::parse_str(format)?)?.with_origin_top_left(*origin_top_left);
			if let Some(timeout) = timeout_secs {
				client = client.with_timeout(Duration::from_secs(*timeout))?;
			}
			Arc::new(TiledSource::new(client, grid, *transparent))
		}
		SourceConfig::Debug { transparent } => Arc::new(DebugSource::new(*transparent)),
	})
}

pub fn build_sources(cfg: &MapproxyConfig, grids: &HashMap<String, Grid>) -> Result<HashMap<String, Arc<dyn Source>>> {
	cfg.sources.iter().map(|(name, s)| Ok((name.clone(), build_source(name, s, grids)?))).collect()
}

#[context("building cache {name:?}")]
pub fn build_cache(
	name: &str,
	cfg: &CacheConfig,
	grids: &HashMap<String, Grid>,
	sources: &HashMap<String, Arc<dyn Source>>,
) -> Result<TileManager> {
	let grid = grids.get(&cfg.grid).with_context(|| format!("cache {name:?} references unknown grid {:?}", cfg.grid))?.clone();
	let format = TileFormat::parse_str(&cfg.format)?;

	let cache_sources: Vec<Arc<dyn Source>> = cfg
		.sources
		.iter()
		.map(|s| sources.get(s).cloned().with_context(|| format!("cache {name:?} references unknown source {s:?}")))
		.collect::<Result<_>>()?;
	if cache_sources.is_empty() {
		bail!("cache {name:?} has no sources");
	}

	let file_cache = FileTileCache::new(cfg.cache_dir.clone(), format, cfg.link_single_color_images)?;
	let mut manager = TileManager::new(grid, file_cache, cache_sources).with_transparent(cfg.transparent);
	if let Some(bgcolor) = &cfg.bgcolor {
		manager = manager.with_bgcolor(bgcolor.clone());
	}
	if let Some(meta_size) = cfg.meta_size {
		manager = manager.with_meta_tiles((meta_size[0], meta_size[1]), cfg.meta_buffer.unwrap_or(0));
	}
	Ok(manager)
}

pub fn build_caches(
	cfg: &MapproxyConfig,
	grids: &HashMap<String, Grid>,
	sources: &HashMap<String, Arc<dyn Source>>,
) -> Result<HashMap<String, TileManager>> {
	cfg.caches.iter().map(|(name, c)| Ok((name.clone(), build_cache(name, c, grids, sources)?))).collect()
}

/// Resolves a coverage by name, following `union` references recursively.
/// Mirrors mapproxy's `seed/config_loader.py` coverage lookup, minus WKT/
/// shapefile support: `file` reads the line-based `minx,miny,maxx,maxy,srs`
/// format documented alongside the `export --coverage` flag.
pub fn build_coverage(name: &str, coverages: &HashMap<String, CoverageConfig>) -> Result<Arc<dyn Coverage>> {
	Ok(Arc::from(build_coverage_inner(name, coverages, &mut Vec::new())?))
}

/// Resolves a list of coverage names into a single coverage, unioning them
/// via `MultiCoverage` when there's more than one. `None` if `names` is
/// empty — callers treat that as "no coverage restriction".
pub fn build_coverage_union(names: &[String], coverages: &HashMap<String, CoverageConfig>) -> Result<Option<Arc<dyn Coverage>>> {
	match names {
		[] => Ok(None),
		[name] => Ok(Some(build_coverage(name, coverages)?)),
		names => {
			let parts = names.iter().map(|n| build_coverage_inner(n, coverages, &mut Vec::new())).collect::<Result<Vec<_>>>()?;
			Ok(Some(Arc::new(MultiCoverage::new(parts)?)))
		}
	}
}

fn build_coverage_inner(name: &str, coverages: &HashMap<String, CoverageConfig>, seen: &mut Vec<String>) -> Result<Box<dyn Coverage>> {
	if seen.contains(&name.to_string()) {
		bail!("coverage {name:?} is part of a union cycle");
	}
	seen.push(name.to_string());

	let cfg = coverages.get(name).with_context(|| format!("unknown coverage {name:?}"))?;

	if let Some(members) = &cfg.union {
		let parts = members.iter().map(|m| build_coverage_inner(m, coverages, seen)).collect::<Result<Vec<_>>>()?;
		return Ok(Box::new(MultiCoverage::new(parts)?));
	}

	if let Some(path) = &cfg.file {
		return Ok(Box::new(load_coverage_file(path)?));
	}

	let bbox = cfg.bbox.with_context(|| format!("coverage {name:?} has no bbox, file, or union"))?;
	let srs = cfg.srs.clone().with_context(|| format!("coverage {name:?} needs an srs alongside its bbox"))?;
	let extent = Extent::new(bbox[0], bbox[1], bbox[2], bbox[3])?;
	Ok(Box::new(BBoxCoverage::new(extent, srs)?))
}

/// Public entry point for `export --coverage FILE`, which names a file
/// directly rather than a `seed.yaml` coverage entry.
pub fn load_coverage_file_as_coverage(path: &Path) -> Result<Arc<dyn Coverage>> {
	Ok(Arc::new(load_coverage_file(path)?))
}

/// Parses a coverage file: one `minx,miny,maxx,maxy,srs` line. Blank lines
/// and lines starting with `#` are ignored.
fn load_coverage_file(path: &Path) -> Result<BBoxCoverage> {
	let raw = std::fs::read_to_string(path).with_context(|| format!("reading coverage file {path:?}"))?;
	let line = raw
		.lines()
		.map(str::trim)
		.find(|l| !l.is_empty() && !l.starts_with('#'))
		.with_context(|| format!("coverage file {path:?} has no data line"))?;

	let parts: Vec<&str> = line.split(',').map(str::trim).collect();
	if parts.len() != 5 {
		bail!("coverage file {path:?}: expected \"minx,miny,maxx,maxy,srs\", got {line:?}");
	}
	let nums: Vec<f64> = parts[..4].iter().map(|p| p.parse()).collect::<Result<_, _>>()?;
	let extent = Extent::new(nums[0], nums[1], nums[2], nums[3])?;
	BBoxCoverage::new(extent, parts[4].to_string())
}
