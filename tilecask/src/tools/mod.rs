pub mod export;
pub mod grids;
pub mod seed;

/// Parses the `export --levels` syntax: comma-separated mix of single
/// numbers and `a..b` inclusive ranges, e.g. `"1..6,8"` -> `[1,2,3,4,5,6,8]`.
pub fn parse_levels_spec(spec: &str) -> anyhow::Result<Vec<u8>> {
	let mut levels = Vec::new();
	for part in spec.split(',') {
		let part = part.trim();
		if part.is_empty() {
			continue;
		}
		if let Some((from, to)) = part.split_once("..") {
			let from: u8 = from.trim().parse()?;
			let to: u8 = to.trim().parse()?;
			if from <= to {
				levels.extend(from..=to);
			} else {
				levels.extend(to..=from);
			}
		} else {
			levels.push(part.parse()?);
		}
	}
	levels.sort_unstable();
	levels.dedup();
	Ok(levels)
}
