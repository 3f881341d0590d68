/*!
Rational miners

A [`RationalMiner`] does not follow a single chain. Every round it takes each
non-slashable fork offered by the network, adds it to its set of private
forks, and tries to extend all of them at once. Lost lotteries produce null
blocks, which are never published but become the new private tip of the fork
they extended, so the miner keeps trying on it in later rounds.

A miner publishes at most one block per round, since publishing two would get
it slashed for equivocation. Among all winning candidates it keeps the one
with the greatest parent weight.

# Examples
```
use std::{num::NonZeroUsize, sync::Arc};

use ec_sim::prelude::*;

let mut ids = BlockIdAllocator::new();
let tickets = TicketGenerator::new(7);
let genesis = Arc::new(
    Tipset::new(vec![Arc::new(Block {
        id: ids.next_id(),
        parent: None,
        owner: MinerId::GENESIS,
        height: 0,
        is_null: false,
        parent_weight: 0,
        seed: 12,
    })])
    .unwrap(),
);

let mut miner = RationalMiner::new(MinerId::from(1), 1.0);
let mut ctx = MiningContext {
    lookback: NonZeroUsize::MIN,
    tickets: &tickets,
    ids: &mut ids,
};

match miner.mine(&[vec![genesis]], &mut ctx).unwrap() {
    Action::Publish(block) => assert_eq!(block.height, 1),
    Action::Wait(_) => unreachable!("a miner with all the power always wins"),
}
```
*/

use std::{collections::BTreeMap, num::NonZeroUsize, sync::Arc};

use tracing::trace;

use crate::{
    block::{Block, BlockIdAllocator},
    power_dist::PowerValue,
    simulation::SimulationError,
    ticket::{is_winning, TicketGenerator, TicketKind},
    tipset::{Tipset, TipsetKey},
};

/// The outcome of a miner's turn in a round.
#[derive(Debug, Clone)]
pub enum Action {
    /// Publish the given winning block.
    Publish(Arc<Block>),
    /// Publish nothing. Holds the null blocks created while extending private
    /// forks, so that the history of the trial can be reconstructed.
    Wait(Vec<Arc<Block>>),
}

/// Trial state a miner needs to produce blocks.
#[derive(Debug)]
pub struct MiningContext<'a> {
    /// Number of tipsets walked back from a candidate's parent, itself
    /// included, to find the randomness for its election proof.
    pub lookback: NonZeroUsize,
    pub tickets: &'a TicketGenerator,
    pub ids: &'a mut BlockIdAllocator,
}

/// A miner which privately tracks and extends every fork it may safely build
/// on.
#[derive(Debug, Clone)]
pub struct RationalMiner {
    id: MinerId,
    power: PowerValue,
    private_forks: BTreeMap<TipsetKey, Arc<Tipset>>,
}

impl RationalMiner {
    pub fn new(id: MinerId, power: PowerValue) -> Self {
        Self {
            id,
            power,
            private_forks: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> MinerId {
        self.id
    }

    /// Fraction of the total mining power held by this miner.
    #[inline]
    pub fn power(&self) -> PowerValue {
        self.power
    }

    /// Tips of every fork this miner is currently trying to extend.
    #[inline]
    pub fn private_forks(&self) -> &BTreeMap<TipsetKey, Arc<Tipset>> {
        &self.private_forks
    }

    /// Adds every offered fork to this miner's private forks. Forks which are
    /// already known are replaced by the offered copy.
    pub fn consider_forks(&mut self, offered: &[Vec<Arc<Tipset>>]) {
        for fork in offered.iter().flatten() {
            self.private_forks.insert(fork.key().clone(), fork.clone());
        }
    }

    /// Runs the mining protocol for one round on top of the `offered` forks.
    pub fn mine(
        &mut self,
        offered: &[Vec<Arc<Tipset>>],
        ctx: &mut MiningContext<'_>,
    ) -> Result<Action, SimulationError> {
        self.consider_forks(offered);
        trace!(
            miner = %self.id,
            forks = self.private_forks.len(),
            "extending private forks"
        );

        let mut best: Option<Block> = None;
        let mut null_blocks = vec![];
        for parent in self.private_forks.values() {
            let block = self.generate_block(parent, ctx)?;

            if block.is_null {
                null_blocks.push(block);
            } else if best
                .as_ref()
                .map_or(true, |best| block.parent_weight > best.parent_weight)
            {
                best = Some(block);
            }
        }

        if let Some(block) = best {
            // Every other fork is superseded by the published block
            self.private_forks.clear();
            return Ok(Action::Publish(Arc::new(block)));
        }

        let mut chained = Vec::with_capacity(null_blocks.len());
        for block in null_blocks {
            let block = Arc::new(block);
            if let Some(parent) = block.parent_key() {
                self.private_forks.remove(parent);
            }

            let tipset = Tipset::new(vec![block.clone()])?;
            self.private_forks
                .insert(tipset.key().clone(), Arc::new(tipset));
            chained.push(block);
        }

        Ok(Action::Wait(chained))
    }

    /// Creates this miner's candidate block on top of `parent`.
    fn generate_block(
        &self,
        parent: &Arc<Tipset>,
        ctx: &mut MiningContext<'_>,
    ) -> Result<Block, SimulationError> {
        let lookback = parent.ancestor(ctx.lookback.get() - 1).ok_or_else(|| {
            SimulationError::LookbackUnderflow {
                tipset: parent.key().clone(),
                lookback: ctx.lookback.get(),
            }
        })?;
        let live_parent = parent
            .live_ancestor()
            .ok_or_else(|| SimulationError::NoLiveAncestor(parent.key().clone()))?;

        let election = ctx.tickets.draw(
            lookback.min_ticket(),
            self.id,
            TicketKind::Election,
        );
        let seed =
            ctx.tickets
                .draw(parent.min_ticket(), self.id, TicketKind::Chain);

        Ok(Block {
            id: ctx.ids.next_id(),
            parent: Some(parent.clone()),
            owner: self.id,
            height: parent.height() + 1,
            is_null: !is_winning(election, self.power),
            parent_weight: live_parent.weight(),
            seed,
        })
    }
}

/// Unique identifier of a miner within a trial. Corresponds to a [`usize`].
///
/// # Invariants
///
/// `MinerId(0)` is reserved for [`MinerId::GENESIS`], and as such cannot be
/// instantiated outside of this crate.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MinerId(usize);

impl MinerId {
    /// Owner of the genesis ancestor chain.
    pub const GENESIS: MinerId = MinerId(0);

    /// Returns the [`usize`] corresponding to this [`MinerId`].
    pub fn get(&self) -> usize {
        self.0
    }
}

impl From<usize> for MinerId {
    fn from(value: usize) -> Self {
        assert_ne!(value, 0, "newly made MinerId must be greater than 0");
        Self(value)
    }
}

impl std::fmt::Display for MinerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, sync::Arc};

    use super::{Action, MinerId, MiningContext, RationalMiner};
    use crate::{
        block::BlockIdAllocator,
        fork::enumerate_forks,
        simulation::SimulationError,
        ticket::{is_winning, TicketGenerator, TicketKind, TICKET_SPACE},
        tipset::Tipset,
        utils::testing::{child, genesis},
    };

    fn lookback(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn publishes_once_on_heaviest_fork() {
        let gen = genesis(1);
        let b1 = child(1, &gen, 1, 5, false);
        let b2 = child(2, &gen, 2, 9, false);
        let offered = enumerate_forks(&[b1, b2]).unwrap();

        let tickets = TicketGenerator::new(3);
        let mut ids = BlockIdAllocator::new();
        let mut ctx = MiningContext {
            lookback: lookback(1),
            tickets: &tickets,
            ids: &mut ids,
        };

        let mut miner = RationalMiner::new(MinerId::from(1), 1.0);
        let block = match miner.mine(&offered, &mut ctx).unwrap() {
            Action::Publish(block) => block,
            Action::Wait(_) => panic!("full power must win"),
        };

        assert_eq!(block.parent_key().unwrap().to_string(), "1-2");
        assert_eq!(block.parent_weight, 3);
        assert_eq!(block.height, 2);
        assert!(miner.private_forks().is_empty());
        // one candidate per fork
        assert_eq!(ids.allocated(), 2);
    }

    #[test]
    fn heavier_winner_beats_earlier_fork() {
        let gen = genesis(1);
        let b2 = child(2, &gen, 1, 9, false);
        let b5 = child(5, &gen, 2, 5, false);
        let offered = enumerate_forks(&[b2, b5]).unwrap();

        let tickets = TicketGenerator::new(3);
        let mut ids = BlockIdAllocator::new();
        let mut ctx = MiningContext {
            lookback: lookback(1),
            tickets: &tickets,
            ids: &mut ids,
        };

        let mut miner = RationalMiner::new(MinerId::from(1), 1.0);
        miner.consider_forks(&offered);
        let order: Vec<_> =
            miner.private_forks().keys().map(|key| key.to_string()).collect();
        // The lighter fork is tried first
        assert_eq!(order, vec!["2", "2-5"]);

        let block = match miner.mine(&offered, &mut ctx).unwrap() {
            Action::Publish(block) => block,
            Action::Wait(_) => panic!("full power must win"),
        };

        assert_eq!(block.parent_key().unwrap().to_string(), "2-5");
        assert_eq!(block.parent_weight, 3);
    }

    #[test]
    fn win_discards_losing_candidates() {
        let gen = genesis(1);
        let b2 = child(2, &gen, 1, 9, false);
        let b5 = child(5, &gen, 2, 5, false);
        let offered = enumerate_forks(&[b2, b5]).unwrap();

        let tickets = TicketGenerator::new(3);
        let id = MinerId::from(1);
        // Fork "2" samples ticket 9, fork "2-5" samples ticket 5
        let light = tickets.draw(9, id, TicketKind::Election);
        let heavy = tickets.draw(5, id, TicketKind::Election);
        assert_ne!(light, heavy);

        // Only the fork with the smaller election ticket wins
        let power = light.max(heavy) as f64 / TICKET_SPACE as f64;
        let winning_fork = if light < heavy { "2" } else { "2-5" };

        let mut ids = BlockIdAllocator::new();
        let mut ctx = MiningContext {
            lookback: lookback(1),
            tickets: &tickets,
            ids: &mut ids,
        };

        let mut miner = RationalMiner::new(id, power);
        let block = match miner.mine(&offered, &mut ctx).unwrap() {
            Action::Publish(block) => block,
            Action::Wait(_) => panic!("one fork must win"),
        };

        assert!(!block.is_null);
        assert_eq!(block.parent_key().unwrap().to_string(), winning_fork);
        assert!(miner.private_forks().is_empty());
        // The losing candidate used an id but is not kept anywhere
        assert_eq!(ids.allocated(), 2);
    }

    #[test]
    fn losses_chain_null_forks() {
        let gen = genesis(1);
        let b1 = child(1, &gen, 1, 5, false);
        let b2 = child(2, &gen, 2, 9, false);
        let offered = enumerate_forks(&[b1, b2]).unwrap();

        let tickets = TicketGenerator::new(3);
        let mut ids = BlockIdAllocator::new();
        for _ in 0..10 {
            ids.next_id();
        }
        let mut ctx = MiningContext {
            lookback: lookback(1),
            tickets: &tickets,
            ids: &mut ids,
        };

        let mut miner = RationalMiner::new(MinerId::from(4), 1e-15);
        let nulls = match miner.mine(&offered, &mut ctx).unwrap() {
            Action::Wait(nulls) => nulls,
            Action::Publish(_) => panic!("negligible power should not win"),
        };

        assert_eq!(nulls.len(), 2);
        assert!(nulls.iter().all(|b| b.is_null && b.height == 2));
        assert_eq!(miner.private_forks().len(), 2);
        for fork in miner.private_forks().values() {
            assert!(fork.is_null());
            assert_eq!(fork.len(), 1);
        }

        // Nothing new is offered; the null chains keep growing
        let nulls = match miner.mine(&[], &mut ctx).unwrap() {
            Action::Wait(nulls) => nulls,
            Action::Publish(_) => panic!("negligible power should not win"),
        };
        assert_eq!(nulls.len(), 2);
        assert!(nulls.iter().all(|b| b.height == 3));
        assert!(nulls
            .iter()
            .all(|b| b.parent.as_ref().map_or(false, |p| p.is_null())));
        assert_eq!(miner.private_forks().len(), 2);
    }

    #[test]
    fn weight_skips_null_ancestors() {
        let gen = genesis(1);
        let null = Arc::new(Tipset::new(vec![child(1, &gen, 1, 5, true)]).unwrap());

        let tickets = TicketGenerator::new(3);
        let mut ids = BlockIdAllocator::new();
        let mut ctx = MiningContext {
            lookback: lookback(2),
            tickets: &tickets,
            ids: &mut ids,
        };

        let mut miner = RationalMiner::new(MinerId::from(1), 1.0);
        let block = match miner.mine(&[vec![null]], &mut ctx).unwrap() {
            Action::Publish(block) => block,
            Action::Wait(_) => panic!("full power must win"),
        };

        assert_eq!(block.parent_weight, gen.weight());
        assert_eq!(block.height, 2);
        assert_eq!(block.live_parent().unwrap().key(), gen.key());
    }

    #[test]
    fn election_uses_lookback_tipset() {
        let gen = genesis(17);
        let a = Arc::new(Tipset::new(vec![child(1, &gen, 1, 23, false)]).unwrap());
        let b = Arc::new(Tipset::new(vec![child(2, &a, 1, 31, false)]).unwrap());

        let tickets = TicketGenerator::new(99);
        let id = MinerId::from(2);
        let power = 0.5;

        for (depth, expected_source) in [(1, &b), (2, &a), (3, &gen)] {
            let mut ids = BlockIdAllocator::new();
            let mut ctx = MiningContext {
                lookback: lookback(depth),
                tickets: &tickets,
                ids: &mut ids,
            };

            let election = tickets.draw(
                expected_source.min_ticket(),
                id,
                TicketKind::Election,
            );
            let seed = tickets.draw(b.min_ticket(), id, TicketKind::Chain);

            let mut miner = RationalMiner::new(id, power);
            let block = match miner.mine(&[vec![b.clone()]], &mut ctx).unwrap() {
                Action::Publish(block) => block,
                Action::Wait(mut nulls) => nulls.pop().unwrap(),
            };

            assert_eq!(block.is_null, !is_winning(election, power));
            assert_eq!(block.seed, seed);
        }
    }

    #[test]
    fn lookback_past_genesis_is_fatal() {
        let gen = genesis(1);
        let tickets = TicketGenerator::new(3);
        let mut ids = BlockIdAllocator::new();
        let mut ctx = MiningContext {
            lookback: lookback(3),
            tickets: &tickets,
            ids: &mut ids,
        };

        let mut miner = RationalMiner::new(MinerId::from(1), 1.0);
        let err = miner.mine(&[vec![gen]], &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::LookbackUnderflow { lookback: 3, .. }
        ));
    }

    #[test]
    #[should_panic]
    fn genesis_miner_id_reserved() {
        let _ = MinerId::from(0);
    }
}
