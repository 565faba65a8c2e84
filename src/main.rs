// Phoneme Decoding CLI entry point
// Parses arguments, sets up logging and runs every configured condition

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use phoneme_decoding::{AnalysisConfig, AnalysisRunner};

/// Time-resolved logistic-regression decoding of phoneme categories
#[derive(Debug, Parser)]
#[command(name = "phoneme-decoding", version, about)]
struct Cli {
    /// JSON configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Candidate project root; may be repeated, the first existing one is used
    #[arg(short, long = "root")]
    roots: Vec<PathBuf>,

    /// Append JSONL progress entries to this file
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Skip chart rendering
    #[arg(long)]
    no_plots: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if cli.no_plots {
        config.render_plots = false;
    }

    let mut runner = AnalysisRunner::from_candidates(config, &cli.roots)?;
    if let Some(trace) = cli.trace {
        runner = runner.with_trace(trace);
    }

    let summary = runner.run().context("Decoding run failed")?;
    log::info!(
        "Accuracy summary written to {} ({} rows)",
        summary.summary_path.display(),
        summary.rows_written
    );

    Ok(())
}
