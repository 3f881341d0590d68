//! Measures how the lookback parameter affects forking, for small and large
//! groups of miners.

use anyhow::Result;
use clap::Parser;
use ec_sim::prelude::*;
use tracing_subscriber::EnvFilter;

const LOOKBACKS: [usize; 6] = [1, 10, 40, 70, 100, 130];
const MINER_COUNTS: [usize; 2] = [10, 100];

#[derive(Parser, Debug)]
#[command(name = "lookback-sweep")]
#[command(about = "Sweep lookback values across miner counts", long_about = None)]
struct Args {
    /// Rounds per trial
    #[arg(short, long, default_value_t = 300)]
    rounds: usize,

    /// Trials per configuration
    #[arg(short, long, default_value_t = 20)]
    trials: usize,

    /// Seed for reproducible runs (random if omitted)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Print CSV instead of a human-readable table
    #[arg(long)]
    csv: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Miner count varies fastest within each lookback value
    let mut builder = SimulationBuilder::new()
        .lookback_iter(LOOKBACKS)
        .miners_iter(MINER_COUNTS)
        .rounds(args.rounds)
        .trials(args.trials);
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }

    let format = if args.csv { Format::CSV } else { Format::PrettyPrint };
    let results = builder
        .build()?
        .run_all()?
        .average(Average::Mean)
        .live_forks()
        .head_weight()
        .null_blocks()
        .format(format)
        .build();

    println!("{}", results);

    Ok(())
}
