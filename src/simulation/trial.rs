//! A single isolated run of the round loop

use std::{num::NonZeroUsize, sync::Arc};

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::{
    block::{Block, BlockIdAllocator},
    chain::ChainTracker,
    fork::enumerate_forks,
    miner::{Action, MinerId, MiningContext, RationalMiner},
    power_dist::PowerValue,
    ticket::{TicketGenerator, TICKET_SPACE},
    tipset::Tipset,
};

use super::SimulationError;

/// Parameters of a single trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialConfig {
    /// Distance back from a block's parent at which its election randomness
    /// is sampled. A lookback of 1 samples the parent itself.
    pub lookback: NonZeroUsize,
    pub rounds: NonZeroUsize,
    /// Mining power of each miner, in order of [`MinerId`].
    pub powers: Vec<PowerValue>,
}

impl TrialConfig {
    #[inline]
    pub fn num_miners(&self) -> usize {
        self.powers.len()
    }
}

/// One run of the round loop over a fresh set of miners.
#[derive(Debug, Clone)]
pub struct Trial {
    index: usize,
    config: TrialConfig,
    seed: u64,
}

/// Contains the output data from a single trial.
#[derive(Debug, Clone)]
pub struct TrialOutput {
    /// Position of the trial within its
    /// [`SimulationGroup`](super::SimulationGroup).
    pub index: usize,
    /// Seed of the trial's random number generator. Rerunning the trial with
    /// the same seed and configuration reproduces this output.
    pub seed: u64,
    pub config: TrialConfig,
    pub chain: ChainTracker,
    pub miners: Vec<RationalMiner>,
}

impl Trial {
    pub fn new(index: usize, config: TrialConfig, seed: u64) -> Self {
        Self { index, config, seed }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Executes the trial.
    ///
    /// # Details
    /// Every round, the blocks published in the previous round are grouped
    /// into tipsets and their forks are offered to each miner in order of
    /// [`MinerId`]. Blocks published by the miners form the input of the next
    /// round, and the head is updated from them once all miners have acted.
    pub fn run(self) -> Result<TrialOutput, SimulationError> {
        let Trial { index, config, seed } = self;
        let TrialConfig { lookback, rounds, powers } = &config;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let tickets = TicketGenerator::new(rng.next_u64());
        let mut ids = BlockIdAllocator::new();

        let genesis = make_genesis(*lookback, &mut rng, &mut ids)?;
        let mut chain = ChainTracker::new(genesis.clone());
        let mut ancestor = genesis.parent();
        while let Some(tipset) = ancestor {
            chain.record(tipset.blocks());
            ancestor = tipset.parent();
        }
        let mut miners: Vec<_> = powers
            .iter()
            .enumerate()
            .map(|(i, &power)| RationalMiner::new(MinerId::from(i + 1), power))
            .collect();

        info!(
            trial = index,
            lookback = lookback.get(),
            rounds = rounds.get(),
            miners = miners.len(),
            "trial started"
        );

        let mut blocks = genesis.blocks().to_vec();
        for round in 0..rounds.get() {
            chain.record_published(&blocks)?;
            debug!(trial = index, round, new_blocks = blocks.len(), "round");

            let forks = enumerate_forks(&blocks)?;
            let mut ctx = MiningContext {
                lookback: *lookback,
                tickets: &tickets,
                ids: &mut ids,
            };

            let mut published = vec![];
            for miner in miners.iter_mut() {
                match miner.mine(&forks, &mut ctx)? {
                    Action::Publish(block) => published.push(block),
                    Action::Wait(null_blocks) => chain.record(&null_blocks),
                }
            }

            chain.advance_head(&published)?;
            blocks = published;
        }
        chain.record(&blocks);

        chain.max_height = rounds.get() as u64 - 1;
        info!(
            trial = index,
            blocks = chain.num_blocks(),
            head = %chain.head().key(),
            head_weight = chain.head().weight(),
            "trial finished"
        );

        Ok(TrialOutput {
            index,
            seed,
            config,
            chain,
            miners,
        })
    }
}

/// Makes the genesis tipset, preceded by `lookback - 1` ancestors so that
/// blocks in the first rounds have randomness to sample.
fn make_genesis(
    lookback: NonZeroUsize,
    rng: &mut impl Rng,
    ids: &mut BlockIdAllocator,
) -> Result<Arc<Tipset>, SimulationError> {
    let mut genesis_block = |parent| {
        Arc::new(Block {
            id: ids.next_id(),
            parent,
            owner: MinerId::GENESIS,
            height: 0,
            is_null: false,
            parent_weight: 0,
            seed: rng.gen_range(0..TICKET_SPACE),
        })
    };

    let mut genesis = Arc::new(Tipset::new(vec![genesis_block(None)])?);
    for _ in 1..lookback.get() {
        genesis = Arc::new(Tipset::new(vec![genesis_block(Some(genesis))])?);
    }

    Ok(genesis)
}
