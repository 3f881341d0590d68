//! Runs rational-miner trials for one lookback value.
//!
//! A single trial is drawn as a DOT graph. With more than one trial, the mean
//! of each statistic is printed as a table instead.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ec_sim::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Pretty,
    Csv,
}

impl From<OutputFormat> for Format {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Pretty => Format::PrettyPrint,
            OutputFormat::Csv => Format::CSV,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ec-sim")]
#[command(about = "Simulate rational mining under Expected Consensus", long_about = None)]
struct Args {
    /// Lookback parameter for election randomness
    #[arg(long, default_value_t = 1)]
    lbp: usize,

    /// Rounds per trial
    #[arg(short, long, default_value_t = 100)]
    rounds: usize,

    /// Number of miners, sharing power equally
    #[arg(short, long, default_value_t = 10)]
    miners: usize,

    /// Number of independent trials
    #[arg(short, long, default_value_t = 1)]
    trials: usize,

    /// Directory for DOT and JSON output
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Seed for reproducible runs (random if omitted)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Format of the results table
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    /// Write a JSON snapshot of every trial
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut builder = SimulationBuilder::new()
        .lookback(args.lbp)
        .miners(args.miners)
        .rounds(args.rounds)
        .trials(args.trials);
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }

    let results = builder.build()?.run_all()?;

    let formats = ExportFormats {
        dot: args.trials == 1,
        json: args.json,
    };
    if formats.dot || formats.json {
        for output in results.outputs() {
            let written = export_trial(output, &args.output, formats)
                .with_context(|| {
                    format!("exporting trial {} to {}", output.index, args.output.display())
                })?;
            info!(trial = output.index, seed = output.seed, files = written.len(), "trial exported");
        }
    }

    if args.trials > 1 {
        let table = results
            .average(Average::Mean)
            .all()
            .format(args.format.into())
            .build();

        println!("{}", table);
    }

    Ok(())
}
