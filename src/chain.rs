use std::{
    collections::{BTreeMap, HashSet},
    ops::Index,
    sync::Arc,
};

use tracing::debug;

use crate::{
    block::{Block, BlockId},
    fork::group_into_tipsets,
    simulation::SimulationError,
    tipset::{Tipset, TipsetKey},
};

/// Record of everything that happened during a single trial: every block
/// produced (null blocks included), the blocks published at each height, and
/// the heaviest tipset seen so far.
#[derive(Debug, Clone)]
pub struct ChainTracker {
    /// Height of the last simulated round. Set once the trial finishes.
    pub max_height: u64,
    /// Map from the ID of a block to the block itself.
    all_blocks: BTreeMap<BlockId, Arc<Block>>,
    /// Blocks published at each height, in the order they were published.
    /// Heights at which nothing was published are absent.
    live_blocks_by_height: BTreeMap<u64, Vec<Arc<Block>>>,
    /// The heaviest tipset seen so far.
    head: Arc<Tipset>,
    /// Key of the head after each round.
    head_history: Vec<TipsetKey>,
    /// Blocks which have been part of the head at some point.
    in_head: HashSet<BlockId>,
}

impl ChainTracker {
    /// Creates a tracker whose head is the given genesis tipset.
    pub fn new(genesis: Arc<Tipset>) -> Self {
        let in_head = genesis.blocks().iter().map(|block| block.id).collect();

        Self {
            max_height: 0,
            all_blocks: BTreeMap::new(),
            live_blocks_by_height: BTreeMap::new(),
            head: genesis,
            head_history: vec![],
            in_head,
        }
    }

    /// Returns true iff the given block ID is associated with a block in this
    /// trial.
    #[inline]
    pub fn contains(&self, id: BlockId) -> bool {
        self.all_blocks.contains_key(&id)
    }

    /// Every block produced during the trial, in order of [`BlockId`].
    pub fn blocks(&self) -> impl Iterator<Item = &Arc<Block>> {
        self.all_blocks.values()
    }

    /// Returns the number of blocks produced during the trial, null blocks
    /// included.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.all_blocks.len()
    }

    /// Returns the blocks published at `height`, which is empty if no block
    /// was published there.
    #[inline]
    pub fn at_height(&self, height: u64) -> &[Arc<Block>] {
        self.live_blocks_by_height
            .get(&height)
            .map_or(&[], Vec::as_slice)
    }

    /// Published blocks indexed by height.
    #[inline]
    pub fn live_blocks_by_height(&self) -> &BTreeMap<u64, Vec<Arc<Block>>> {
        &self.live_blocks_by_height
    }

    #[inline]
    pub fn head(&self) -> &Arc<Tipset> {
        &self.head
    }

    /// Key of the head after each simulated round.
    #[inline]
    pub fn head_history(&self) -> &[TipsetKey] {
        &self.head_history
    }

    /// Returns true if the block was part of the head at any point.
    #[inline]
    pub fn is_in_head(&self, id: BlockId) -> bool {
        self.in_head.contains(&id)
    }

    /// Records the blocks published in a round. All blocks must share a
    /// height.
    pub fn record_published(
        &mut self,
        blocks: &[Arc<Block>],
    ) -> Result<(), SimulationError> {
        let Some(first) = blocks.first() else {
            return Ok(());
        };

        let height = first.height;
        if blocks.iter().any(|block| block.height != height) {
            return Err(SimulationError::MixedRoundHeights(
                blocks.iter().map(|block| (block.id, block.height)).collect(),
            ));
        }

        for block in blocks {
            self.all_blocks.insert(block.id, block.clone());
        }
        self.live_blocks_by_height.insert(height, blocks.to_vec());

        Ok(())
    }

    /// Adds blocks to the block table without indexing them by height. Used
    /// for null blocks and for blocks published in the final round.
    pub fn record(&mut self, blocks: &[Arc<Block>]) {
        for block in blocks {
            self.all_blocks.insert(block.id, block.clone());
        }
    }

    /// Replaces the head with the heaviest tipset formed by `published`, if
    /// that tipset beats the current head. Returns true if the head changed.
    pub fn advance_head(
        &mut self,
        published: &[Arc<Block>],
    ) -> Result<bool, SimulationError> {
        let mut candidate = &self.head;
        let tipsets = group_into_tipsets(published)?;
        for tipset in tipsets.iter() {
            if tipset.is_heavier_than(candidate) {
                candidate = tipset;
            }
        }

        let changed = !Arc::ptr_eq(candidate, &self.head);
        if changed {
            let candidate = candidate.clone();
            debug!(
                head = %candidate.key(),
                weight = candidate.weight(),
                "new head"
            );

            self.in_head
                .extend(candidate.blocks().iter().map(|block| block.id));
            self.head = candidate;
        }
        self.head_history.push(self.head.key().clone());

        Ok(changed)
    }

    /// Mean number of published blocks per height, over heights
    /// `0..=max_height`.
    pub fn average_live_forks_per_round(&self) -> f64 {
        let live: usize = self
            .live_blocks_by_height
            .range(..=self.max_height)
            .map(|(_, blocks)| blocks.len())
            .sum();

        live as f64 / (self.max_height + 1) as f64
    }

    /// Number of blocks published by miners during the trial. Genesis blocks
    /// are not counted.
    pub fn num_live_blocks(&self) -> usize {
        self.all_blocks
            .values()
            .filter(|block| !block.is_null && !block.is_genesis())
            .count()
    }

    /// Number of null blocks produced during the trial.
    pub fn num_null_blocks(&self) -> usize {
        self.all_blocks.values().filter(|block| block.is_null).count()
    }
}

impl Index<BlockId> for ChainTracker {
    type Output = Arc<Block>;

    fn index(&self, index: BlockId) -> &Self::Output {
        self.all_blocks.index(&index)
    }
}

impl Index<&BlockId> for ChainTracker {
    type Output = Arc<Block>;

    fn index(&self, index: &BlockId) -> &Self::Output {
        self.all_blocks.index(index)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::ChainTracker;
    use crate::{
        simulation::SimulationError,
        tipset::Tipset,
        utils::testing::{child, genesis},
    };

    #[test]
    fn heavier_tipset_becomes_head() {
        let gen = genesis(1);
        let mut chain = ChainTracker::new(gen.clone());
        assert!(chain.is_in_head(0.into()));

        let a = child(1, &gen, 1, 50, false);
        let b = child(2, &gen, 2, 40, false);
        assert!(chain.advance_head(&[a.clone(), b.clone()]).unwrap());

        assert_eq!(chain.head().key().to_string(), "1-2");
        assert_eq!(chain.head().weight(), 3);
        assert!(chain.is_in_head(a.id) && chain.is_in_head(b.id));
    }

    #[test]
    fn equal_weight_prefers_smaller_ticket() {
        let gen = genesis(1);
        let mut chain = ChainTracker::new(gen.clone());

        let a = child(1, &gen, 1, 50, false);
        let b = child(2, &gen, 2, 40, false);
        let left = Arc::new(Tipset::new(vec![a]).unwrap());
        let right = Arc::new(Tipset::new(vec![b]).unwrap());

        let c = child(3, &left, 1, 7, false);
        let d = child(4, &right, 2, 3, false);
        chain.advance_head(&[c, d.clone()]).unwrap();
        assert_eq!(chain.head().key().ids(), &[d.id]);

        // A later tipset of equal weight but larger ticket does not win
        let e = child(5, &left, 3, 9, false);
        assert!(!chain.advance_head(&[e]).unwrap());
        assert_eq!(chain.head().key().ids(), &[d.id]);
    }

    #[test]
    fn empty_round_keeps_head() {
        let gen = genesis(1);
        let mut chain = ChainTracker::new(gen.clone());

        assert!(!chain.advance_head(&[]).unwrap());
        assert_eq!(chain.head().key(), gen.key());
        assert_eq!(chain.head_history().len(), 1);
    }

    #[test]
    fn mixed_heights_rejected() {
        let gen = genesis(1);
        let mut chain = ChainTracker::new(gen.clone());

        let a = child(1, &gen, 1, 50, false);
        let ts = Arc::new(Tipset::new(vec![a.clone()]).unwrap());
        let b = child(2, &ts, 1, 50, false);

        let err = chain.record_published(&[a, b]).unwrap_err();
        match err {
            SimulationError::MixedRoundHeights(found) => {
                assert_eq!(found, vec![(1.into(), 1), (2.into(), 2)]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(chain.num_blocks(), 0);
    }

    #[test]
    fn private_blocks_not_live() {
        let gen = genesis(1);
        let mut chain = ChainTracker::new(gen.clone());
        let null = child(1, &gen, 1, 50, true);

        chain.record(&[null.clone()]);
        chain.max_height = 1;

        assert!(chain.contains(null.id));
        assert!(chain.at_height(1).is_empty());
        assert_eq!(chain.num_null_blocks(), 1);
        assert_eq!(chain.average_live_forks_per_round(), 0.0);
    }
}
