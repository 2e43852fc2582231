mod config;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Increase logging verbosity (-v, -vv, -vvv). Default level is "warn".
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Pre-build cache tiles ahead of serving them live
	Seed(tools::seed::Subcommand),

	/// Export a cache (or a live source) into a standalone tile store
	Export(tools::export::Subcommand),

	/// List configured grids, or estimate a seed/cleanup task's tile count
	Grids(tools::grids::Subcommand),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let level = match cli.verbose {
		0 => log::LevelFilter::Warn,
		1 => log::LevelFilter::Info,
		2 => log::LevelFilter::Debug,
		_ => log::LevelFilter::Trace,
	};
	env_logger::Builder::new().filter_level(level).format_timestamp(None).init();

	run(cli)
}

fn run(cli: Cli) -> Result<()> {
	match &cli.command {
		Commands::Seed(arguments) => tools::seed::run(arguments),
		Commands::Export(arguments) => tools::export::run(arguments),
		Commands::Grids(arguments) => tools::grids::run(arguments),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn run_command(arg_vec: Vec<&str>) -> Result<String> {
		let cli = Cli::try_parse_from(arg_vec)?;
		let msg = format!("{cli:?}");
		run(cli)?;
		Ok(msg)
	}

	#[test]
	fn help() {
		let err = run_command(vec!["tilecask"]).unwrap_err().to_string();
		assert!(err.contains("\nUsage: tilecask"));
	}

	#[test]
	fn version() {
		let err = run_command(vec!["tilecask", "-V"]).unwrap_err().to_string();
		assert!(err.starts_with("tilecask "));
	}

	#[test]
	fn seed_subcommand_requires_config() {
		let err = run_command(vec!["tilecask", "seed"]).unwrap_err().to_string();
		assert!(err.contains("required") || err.contains("Usage"));
	}

	#[test]
	fn export_subcommand_requires_args() {
		let err = run_command(vec!["tilecask", "export"]).unwrap_err().to_string();
		assert!(err.contains("required") || err.contains("Usage"));
	}

	#[test]
	fn grids_subcommand_requires_config() {
		let err = run_command(vec!["tilecask", "grids"]).unwrap_err().to_string();
		assert!(err.contains("required") || err.contains("Usage"));
	}
}
