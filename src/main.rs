// Command line runner: load a config (or use the reference run), simulate, dump the series as JSON for plotting
use std::{fs::File, io::{self, BufWriter, Write}, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spring_pendulum::prelude::*;

#[derive(Parser, Debug)]
#[command(version, about = "Spring pendulum on a pulley block: trajectory and reaction forces")]
struct Args {
	/// YAML run configuration, built-in reference run when omitted
	#[arg(short, long)]
	config: Option<PathBuf>,
	/// Where to write the JSON series, stdout when omitted
	#[arg(short, long)]
	output: Option<PathBuf>,
	/// Log filter, overridden by RUST_LOG
	#[arg(long, default_value = "info")]
	log_level: String,
	/// Only log ranges of x, phi and the reaction forces, no series output
	#[arg(long)]
	summary: bool,
	/// Print the effective configuration as YAML and exit
	#[arg(long)]
	print_config: bool
}

fn init_logging(level: &str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.init();
}

fn load_config(args: &Args) -> Result<SimulationConfig> {
	match &args.config {
		Some(path) => SimulationConfig::from_path(path).with_context(|| format!("loading {}", path.display())),
		None => Ok(SimulationConfig::default())
	}
}

fn write_series(report: &SimulationReport, output: Option<&PathBuf>) -> Result<()> {
	let series = report.series();
	match output {
		Some(path) => {
			let mut writer = BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
			serde_json::to_writer(&mut writer, &series)?;
			writer.flush()?;
			info!(path = %path.display(), "wrote series");
		},
		None => {
			let stdout = io::stdout();
			let mut lock = stdout.lock();
			serde_json::to_writer(&mut lock, &series)?;
			writeln!(lock)?;
		}
	}
	Ok(())
}

fn main() -> Result<()> {
	let args = Args::parse();
	init_logging(&args.log_level);
	let config = load_config(&args)?;
	if args.print_config {
		print!("{}", config.to_yaml_string()?);
		return Ok(());
	}
	let simulation = config.build().context("invalid configuration")?;
	let report = simulation.run().context("simulation failed")?;
	if args.summary {
		for line in report.summary().to_string().lines() {
			info!("{}", line);
		}
		return Ok(());
	}
	write_series(&report, args.output.as_ref())
}
