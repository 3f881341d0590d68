//! Building/running simulations and collecting their output

use std::{num::NonZeroUsize, sync::mpsc};

use rand::{rngs::OsRng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::{error, info};

use crate::{
    block::BlockId,
    results::ResultsBuilder,
    tipset::{TipsetError, TipsetKey},
};

pub mod builder;
pub mod trial;

pub use builder::{SimulationBuildError, SimulationBuilder};
pub use trial::{Trial, TrialConfig, TrialOutput};

/// Container for a group of trial configurations, each of which is run
/// `trials` times. Simulations should be run using this struct's `run_all`
/// method.
#[derive(Debug, Clone)]
pub struct SimulationGroup {
    configs: Vec<TrialConfig>,
    trials: NonZeroUsize,
    seed: Option<u64>,
}

/// Violated simulation invariants. These point at a logic error rather than
/// a runtime condition, and abort the trial they occur in.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(
        "blocks published in one round do not share a height: {}",
        describe_blocks(.0)
    )]
    MixedRoundHeights(Vec<(BlockId, u64)>),
    #[error("lookback of {lookback} runs past the genesis chain from tipset {tipset}")]
    LookbackUnderflow { tipset: TipsetKey, lookback: usize },
    #[error("tipset {0} has no live ancestor")]
    NoLiveAncestor(TipsetKey),
    #[error("tipset invariant violated")]
    TipsetError(#[from] TipsetError),
    #[error("trial {index} failed")]
    TrialFailed {
        index: usize,
        #[source]
        source: Box<SimulationError>,
    },
}

fn describe_blocks(blocks: &[(BlockId, u64)]) -> String {
    blocks
        .iter()
        .map(|(id, height)| format!("b{} at height {}", id, height))
        .collect::<Vec<_>>()
        .join(", ")
}

impl SimulationGroup {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    /// Configurations run by this group, in order.
    pub fn configs(&self) -> &[TrialConfig] {
        &self.configs
    }

    /// Runs every trial of every configuration, in parallel when the `rayon`
    /// feature is enabled.
    ///
    /// Trials share nothing. Each one draws its root randomness from the
    /// operating system, or from the group seed if one was given. A failing
    /// trial does not stop the others, but its error is returned once all of
    /// them have finished.
    pub fn run_all(self) -> Result<ResultsBuilder, SimulationError> {
        let SimulationGroup { configs, trials, seed } = self;

        let mut seeder = seed.map(ChaCha8Rng::seed_from_u64);
        let jobs: Vec<_> = configs
            .into_iter()
            // Clone each configuration `trials` times
            .flat_map(|config| vec![config; trials.get()])
            .enumerate()
            .map(|(index, config)| {
                let seed = match seeder.as_mut() {
                    Some(rng) => rng.next_u64(),
                    None => OsRng.next_u64(),
                };
                Trial::new(index, config, seed)
            })
            .collect();

        info!(trials = jobs.len(), "starting trials");

        let (tx, rx) = mpsc::sync_channel(jobs.len());

        #[cfg(feature = "rayon")]
        jobs.into_par_iter().for_each_with(tx, |tx, trial| {
            let index = trial.index();
            // The receiver outlives every sender
            let _ = tx.send((index, trial.run()));
        });

        #[cfg(not(feature = "rayon"))]
        {
            for trial in jobs {
                let index = trial.index();
                let _ = tx.send((index, trial.run()));
            }
            drop(tx);
        }

        let mut results: Vec<_> = rx.into_iter().collect();
        results.sort_by_key(|(index, _)| *index);

        let mut outputs = Vec::with_capacity(results.len());
        let mut failure = None;
        for (index, result) in results {
            match result {
                Ok(output) => outputs.push(output),
                Err(source) => {
                    error!(trial = index, error = %source, "trial failed");
                    if failure.is_none() {
                        failure = Some(SimulationError::TrialFailed {
                            index,
                            source: Box::new(source),
                        });
                    }
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(ResultsBuilder::new(outputs, trials)),
        }
    }
}
