use anyhow::{Context, Result};
use clap::Parser;
use flowguard_detection::{init_tracing, load_scenarios, load_settings, AnalysisPipeline};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "flowguard-detect")]
#[command(about = "Detect, classify and model traffic anomalies in case-study documents")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Scenario document (YAML or JSON). Defaults to the `scenario_file` setting.
    scenario: Option<PathBuf>,
    /// Configuration file layered over the defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(args.config.as_deref())?;
    init_tracing(&settings.service_name, &settings.log_level)?;
    info!(?settings, "config loaded");

    let path = args
        .scenario
        .or_else(|| settings.scenario_file.clone())
        .context("no scenario file: pass one as an argument or set `scenario_file`")?;
    let scenarios = load_scenarios(&path)?;
    info!(path = %path.display(), cases = scenarios.cases.len(), "scenarios loaded");

    let pipeline = AnalysisPipeline::new(&settings)?;
    let report = pipeline.run_batch(&scenarios.cases);

    let mut out = std::io::stdout().lock();
    if args.pretty || settings.pretty {
        serde_json::to_writer_pretty(&mut out, &report)?;
    } else {
        serde_json::to_writer(&mut out, &report)?;
    }
    writeln!(out)?;
    info!(run_id = %report.run_id, analyzed = report.analyzed, failed = report.failed, "batch complete");
    Ok(())
}
