//! Serde shape of `mapproxy.yaml` (grids/caches/sources) and `seed.yaml`
//! (coverages/seeds/cleanups), trimmed to the subset this crate actually
//! builds a runtime object from. Modeled on mapproxy's own YAML layout —
//! keys and nesting match what a mapproxy config author already knows,
//! even though most of mapproxy's optional knobs aren't represented here.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct MapproxyConfig {
	pub grids: HashMap<String, GridConfig>,
	pub caches: HashMap<String, CacheConfig>,
	#[serde(default)]
	pub sources: HashMap<String, SourceConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GridConfig {
	pub srs: String,
	#[serde(default)]
	pub bbox: Option<[f64; 4]>,
	#[serde(default)]
	pub is_geodetic: bool,
	#[serde(default = "default_tile_size")]
	pub tile_size: [u32; 2],
	#[serde(default)]
	pub res_factor: Option<ResFactorConfig>,
	#[serde(default)]
	pub resolutions: Option<Vec<f64>>,
	#[serde(default)]
	pub num_levels: Option<usize>,
	#[serde(default)]
	pub stretch_factor: Option<f64>,
}

fn default_tile_size() -> [u32; 2] {
	[256, 256]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResFactorConfig {
	Global,
	Sqrt2,
	Factor(f64),
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
	pub grid: String,
	#[serde(default)]
	pub sources: Vec<String>,
	pub cache_dir: PathBuf,
	#[serde(default = "default_format")]
	pub format: String,
	#[serde(default)]
	pub meta_size: Option<[u32; 2]>,
	#[serde(default)]
	pub meta_buffer: Option<u32>,
	#[serde(default)]
	pub transparent: bool,
	#[serde(default)]
	pub bgcolor: Option<String>,
	#[serde(default)]
	pub link_single_color_images: bool,
}

fn default_format() -> String {
	"png".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
	Wms {
		url: String,
		layers: Vec<String>,
		#[serde(default)]
		version: Option<String>,
		#[serde(default)]
		format: Option<String>,
		#[serde(default)]
		supported_srs: Vec<String>,
		#[serde(default)]
		supports_meta_tiles: bool,
		#[serde(default)]
		transparent: bool,
		#[serde(default)]
		timeout_secs: Option<u64>,
	},
	Tms {
		url: String,
		/// Name of the `grids` entry whose tiling this upstream follows.
		grid: String,
		#[serde(default = "default_format")]
		format: String,
		#[serde(default = "default_true")]
		origin_top_left: bool,
		#[serde(default)]
		transparent: bool,
		#[serde(default)]
		timeout_secs: Option<u64>,
	},
	Debug {
		#[serde(default)]
		transparent: bool,
	},
}

fn default_true() -> bool {
	true
}

#[derive(Debug, Deserialize)]
pub struct SeedConfig {
	#[serde(default)]
	pub coverages: HashMap<String, CoverageConfig>,
	#[serde(default)]
	pub seeds: HashMap<String, SeedEntryConfig>,
	#[serde(default)]
	pub cleanups: HashMap<String, CleanupEntryConfig>,
}

#[derive(Debug, Deserialize)]
pub struct CoverageConfig {
	#[serde(default)]
	pub bbox: Option<[f64; 4]>,
	#[serde(default)]
	pub srs: Option<String>,
	#[serde(default)]
	pub file: Option<PathBuf>,
	#[serde(default)]
	pub union: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SeedEntryConfig {
	pub caches: Vec<String>,
	#[serde(default)]
	pub coverages: Vec<String>,
	#[serde(default)]
	pub levels: LevelsConfig,
	#[serde(default)]
	pub skip_geoms_for_last_levels: u8,
}

#[derive(Debug, Deserialize)]
pub struct CleanupEntryConfig {
	pub caches: Vec<String>,
	#[serde(default)]
	pub coverages: Vec<String>,
	#[serde(default)]
	pub levels: LevelsConfig,
	/// Remove tiles created before this many seconds ago. Absent means "all".
	#[serde(default)]
	pub remove_before_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
pub enum LevelsConfig {
	#[default]
	All,
	Range {
		from: u8,
		to: u8,
	},
	List(Vec<u8>),
}
