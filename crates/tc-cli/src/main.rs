//! transcore CLI

mod feed;
mod run;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use run::AccumulationMode;

#[derive(Parser)]
#[command(name = "transcore")]
#[command(about = "transcore - run-scoped energy deposition and exit spectrum scoring")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a step-event feed and write the result histograms
    Run {
        /// Scoring config (YAML, or JSON by extension). Defaults to the built-in config.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Step-event feed (JSON lines)
        #[arg(short, long)]
        events: PathBuf,

        /// Output directory for `.dat` result files (created if missing)
        #[arg(short, long)]
        output: PathBuf,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,

        /// Accumulation strategy
        #[arg(long, value_enum, default_value = "shared")]
        mode: AccumulationMode,

        /// Write the run summary here (pretty JSON). Defaults to stdout.
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Parse and validate a scoring config, printing the resolved form as JSON
    Validate {
        /// Scoring config (YAML, or JSON by extension)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Print the built-in scoring config as YAML
    DefaultConfig {
        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { config, events, output, threads, mode, summary } => {
            let result = run::cmd_run(config.as_deref(), &events, &output, threads, mode)?;
            write_json(summary.as_ref(), serde_json::to_value(&result)?)
        }
        Commands::Validate { config } => cmd_validate(&config),
        Commands::DefaultConfig { output } => cmd_default_config(output.as_ref()),
    }
}

fn cmd_validate(config: &Path) -> Result<()> {
    let cfg = run::load_config(Some(config))?;
    tracing::info!(path = %config.display(), "scoring config is valid");
    write_json(None, serde_json::to_value(&cfg)?)
}

fn cmd_default_config(output: Option<&PathBuf>) -> Result<()> {
    let yaml = tc_score::ScoringConfig::default().to_yaml()?;
    match output {
        Some(path) => std::fs::write(path, yaml)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{yaml}"),
    }
    Ok(())
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
