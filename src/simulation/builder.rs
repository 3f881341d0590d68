use std::num::NonZeroUsize;

use crate::power_dist::{PowerDistribution, PowerDistributionError};

use super::{SimulationGroup, TrialConfig};

/// Builds a [`SimulationGroup`].
///
/// Every combination of the given lookback values and miner counts becomes
/// one trial configuration, in order of lookback first. Each configuration is
/// run [`SimulationBuilder::trials`] times.
///
/// ```
/// use ec_sim::prelude::*;
///
/// let sim = SimulationBuilder::new()
///     .lookback_iter([1, 5])
///     .miners(10)
///     .rounds(50)
///     .trials(4)
///     .build()
///     .unwrap();
///
/// assert_eq!(sim.configs().len(), 2);
/// ```
#[derive(Debug, Default, Clone)]
pub struct SimulationBuilder {
    lookbacks: Vec<usize>,
    miner_counts: Vec<usize>,
    rounds: Option<usize>,
    trials: Option<usize>,
    power_dist: PowerDistribution,
    seed: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationBuildError {
    #[error("number of miners must be greater than 0")]
    NoMinersGiven,
    #[error("number of simulation rounds must be greater than 0")]
    ZeroRounds,
    #[error("number of trials must be greater than 0")]
    ZeroTrials,
    #[error("lookback must be at least 1")]
    ZeroLookback,
    #[error(transparent)]
    PowerDistributionError(#[from] PowerDistributionError),
}

impl SimulationBuilder {
    /// Default lookback when none is given.
    pub const DEFAULT_LOOKBACK: usize = 1;
    /// Default number of miners when none is given.
    pub const DEFAULT_MINERS: usize = 10;
    /// Default number of rounds per trial.
    pub const DEFAULT_ROUNDS: usize = 100;

    /// Creates a new [`SimulationBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lookback value to simulate.
    pub fn lookback(mut self, lookback: usize) -> Self {
        self.lookbacks.push(lookback);

        self
    }

    /// Call [`SimulationBuilder::lookback`] once for each element of
    /// `values`.
    pub fn lookback_iter<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        self.lookbacks.extend(values);

        self
    }

    /// Add a miner count to simulate.
    pub fn miners(mut self, count: usize) -> Self {
        self.miner_counts.push(count);

        self
    }

    /// Call [`SimulationBuilder::miners`] once for each element of `values`.
    pub fn miners_iter<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        self.miner_counts.extend(values);

        self
    }

    /// Sets the number of rounds each trial will last for (default 100).
    pub fn rounds(mut self, rounds: usize) -> Self {
        self.rounds = Some(rounds);

        self
    }

    /// Sets the number of independent trials run per configuration
    /// (default 1).
    pub fn trials(mut self, trials: usize) -> Self {
        self.trials = Some(trials);

        self
    }

    /// Sets how mining power is split between miners (equal by default).
    pub fn power_dist(mut self, power_dist: PowerDistribution) -> Self {
        self.power_dist = power_dist;

        self
    }

    /// Derive the randomness of every trial from `seed` instead of the
    /// operating system, making the whole group reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);

        self
    }

    /// Creates a [`SimulationGroup`] from the specified parameters.
    pub fn build(self) -> Result<SimulationGroup, SimulationBuildError> {
        use SimulationBuildError::*;

        let SimulationBuilder {
            mut lookbacks,
            mut miner_counts,
            rounds,
            trials,
            power_dist,
            seed,
        } = self;

        if lookbacks.is_empty() {
            lookbacks.push(Self::DEFAULT_LOOKBACK);
        }
        if miner_counts.is_empty() {
            miner_counts.push(Self::DEFAULT_MINERS);
        }

        let rounds = NonZeroUsize::new(rounds.unwrap_or(Self::DEFAULT_ROUNDS))
            .ok_or(ZeroRounds)?;
        let trials = NonZeroUsize::new(trials.unwrap_or(1)).ok_or(ZeroTrials)?;

        let mut configs = vec![];
        for &lookback in lookbacks.iter() {
            let lookback = NonZeroUsize::new(lookback).ok_or(ZeroLookback)?;

            for &count in miner_counts.iter() {
                if count == 0 {
                    return Err(NoMinersGiven);
                }

                configs.push(TrialConfig {
                    lookback,
                    rounds,
                    powers: power_dist.values(count)?,
                });
            }
        }

        Ok(SimulationGroup {
            configs,
            trials,
            seed,
        })
    }
}
