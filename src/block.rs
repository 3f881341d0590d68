use std::sync::Arc;

use crate::{miner::MinerId, ticket::Ticket, tipset::Tipset};

/// Representation of a block produced during a trial. Null blocks stand for
/// lost lotteries and are only ever known to the miner who produced them.
///
/// Blocks are immutable once created and shared through [`Arc`].
#[derive(Clone)]
pub struct Block {
    /// Trial-unique identifier of this block.
    pub id: BlockId,
    /// The tipset this block extends. `None` only for the first block of the
    /// genesis ancestor chain.
    pub parent: Option<Arc<Tipset>>,
    /// The miner of this block, or [`MinerId::GENESIS`].
    pub owner: MinerId,
    /// Parent tipset height + 1. Genesis blocks have height 0.
    pub height: u64,
    /// True if the owner lost the lottery for this slot.
    pub is_null: bool,
    /// Weight of the nearest live ancestor tipset.
    pub parent_weight: u64,
    /// Ticket drawn for this block.
    pub seed: Ticket,
}

/// A unique identifier assigned to each [`Block`] within a single trial.
#[repr(transparent)]
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct BlockId(u64);

impl BlockId {
    /// Returns the [`u64`] corresponding to this [`BlockId`].
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for BlockId {
    fn from(value: u64) -> Self {
        BlockId(value)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Hands out monotonically increasing [`BlockId`]s. Each trial owns exactly
/// one allocator.
#[derive(Debug, Default, Clone)]
pub struct BlockIdAllocator {
    next: u64,
}

impl BlockIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> BlockId {
        let id = BlockId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next
    }
}

impl Block {
    /// Returns the key of this block's parent tipset, if it has one.
    #[inline]
    pub fn parent_key(&self) -> Option<&crate::tipset::TipsetKey> {
        self.parent.as_deref().map(Tipset::key)
    }

    /// Returns true if this block belongs to the genesis ancestor chain.
    #[inline]
    pub fn is_genesis(&self) -> bool {
        self.owner == MinerId::GENESIS
    }

    /// Walks back from this block's parent until a tipset of live blocks is
    /// found. Null blocks only ever form single-block tipsets, so checking
    /// the first member suffices.
    pub fn live_parent(&self) -> Option<&Arc<Tipset>> {
        let mut parent = self.parent.as_ref()?;
        while parent.is_null() {
            parent = parent.parent()?;
        }

        Some(parent)
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.id)
            .field("parent", &self.parent_key())
            .field("owner", &self.owner)
            .field("height", &self.height)
            .field("is_null", &self.is_null)
            .field("parent_weight", &self.parent_weight)
            .field("seed", &self.seed)
            .finish()
    }
}

// Ancestry is released one tipset at a time, so chains of any length can be
// dropped without exhausting the stack.
impl Drop for Block {
    fn drop(&mut self) {
        let mut pending: Vec<_> = self.parent.take().into_iter().collect();

        while let Some(tipset) = pending.pop() {
            // Shared ancestors are released by their last owner
            let Ok(tipset) = Arc::try_unwrap(tipset) else {
                continue;
            };
            for block in tipset.into_blocks() {
                if let Ok(mut block) = Arc::try_unwrap(block) {
                    pending.extend(block.parent.take());
                }
            }
        }
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Block {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::BlockIdAllocator;
    use crate::{
        tipset::Tipset,
        utils::testing::{child, genesis},
    };

    #[test]
    fn allocator_is_monotonic() {
        let mut ids = BlockIdAllocator::new();
        let a = ids.next_id();
        let b = ids.next_id();

        assert!(a < b);
        assert_eq!(a.get(), 0);
        assert_eq!(ids.allocated(), 2);
    }

    #[test]
    fn long_chain_drops_iteratively() {
        let gen = genesis(1);
        let mut tip = gen.clone();
        for id in 1..200_000u64 {
            let block = child(id, &tip, 1, id, false);
            tip = Arc::new(Tipset::new(vec![block]).unwrap());
        }

        let weak = Arc::downgrade(&gen);
        drop(gen);
        assert!(weak.upgrade().is_some());

        drop(tip);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn drop_keeps_shared_ancestors() {
        let gen = genesis(1);
        let a = Arc::new(Tipset::new(vec![child(1, &gen, 1, 5, false)]).unwrap());
        let b = child(2, &a, 1, 6, false);
        let c = child(3, &a, 2, 7, false);

        drop(b);
        assert_eq!(Arc::strong_count(&a), 2);
        assert_eq!(c.parent.as_ref().unwrap().key(), a.key());

        drop(c);
        drop(a);
        assert_eq!(Arc::strong_count(&gen), 1);
    }

    #[test]
    fn debug_prints_parent_key_only() {
        let gen = genesis(1);
        let a = Arc::new(Tipset::new(vec![child(1, &gen, 1, 5, false)]).unwrap());
        let b = child(2, &a, 1, 6, false);

        let text = format!("{:?}", b);
        assert!(text.contains("parent: Some(TipsetKey([BlockId(1)]))"));
        assert!(!text.contains("BlockId(0)"));
    }
}
