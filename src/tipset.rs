//! Tipsets: maximal groups of blocks mined at the same height on the same
//! parent.

use std::{fmt::Display, sync::Arc};

use thiserror::Error;

use crate::{
    block::{Block, BlockId},
    ticket::Ticket,
};

/// A set of blocks with identical height and identical parent tipset, sorted
/// in ascending order of ticket.
///
/// # Invariants
/// - A tipset is never empty.
/// - A tipset containing a null block contains exactly one block.
///
/// The block ordering is load-bearing: forks of a tipset are its suffixes,
/// and [`Tipset::min_ticket`] is the ticket of the first block.
#[derive(Debug, Clone)]
pub struct Tipset {
    blocks: Vec<Arc<Block>>,
    key: TipsetKey,
    min_ticket: Ticket,
    weight: u64,
}

/// Structural identity of a [`Tipset`]: the ids of its blocks in ascending
/// order. Displayed as the ids joined by `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TipsetKey(Vec<BlockId>);

impl TipsetKey {
    pub fn ids(&self) -> &[BlockId] {
        &self.0
    }
}

impl Display for TipsetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, "-")?;
            }
            write!(f, "{}", id)?;
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum TipsetError {
    #[error("cannot create a tipset from zero blocks")]
    Empty,
    #[error("block {block} has height {found}, expected {expected}")]
    HeightMismatch {
        block: BlockId,
        expected: u64,
        found: u64,
    },
    #[error("block {block} has parent tipset {found}, expected {expected}")]
    ParentMismatch {
        block: BlockId,
        expected: String,
        found: String,
    },
    #[error("null block {block} grouped into a tipset of {size} blocks")]
    NullInGroup { block: BlockId, size: usize },
}

fn describe_parent(key: Option<&TipsetKey>) -> String {
    key.map_or_else(|| "<none>".to_string(), |key| key.to_string())
}

impl Tipset {
    /// Creates a tipset from `blocks`, which must all share the same height
    /// and parent tipset.
    pub fn new(mut blocks: Vec<Arc<Block>>) -> Result<Self, TipsetError> {
        use TipsetError::*;

        let first = blocks.first().ok_or(Empty)?;
        let height = first.height;
        let parent = first.parent_key().cloned();

        for block in blocks.iter() {
            if block.height != height {
                return Err(HeightMismatch {
                    block: block.id,
                    expected: height,
                    found: block.height,
                });
            }
            if block.parent_key() != parent.as_ref() {
                return Err(ParentMismatch {
                    block: block.id,
                    expected: describe_parent(parent.as_ref()),
                    found: describe_parent(block.parent_key()),
                });
            }
            if block.is_null && blocks.len() > 1 {
                return Err(NullInGroup {
                    block: block.id,
                    size: blocks.len(),
                });
            }
        }

        blocks.sort_by_key(|block| (block.seed, block.id));
        Ok(Self::from_sorted(blocks))
    }

    /// Builds a tipset from blocks which are already known to be valid and
    /// sorted.
    fn from_sorted(blocks: Vec<Arc<Block>>) -> Self {
        debug_assert!(!blocks.is_empty());

        let mut ids: Vec<_> = blocks.iter().map(|block| block.id).collect();
        ids.sort_unstable();

        let first = &blocks[0];
        let min_ticket = first.seed;
        let weight = if first.is_null {
            first.parent_weight
        } else {
            first.parent_weight + blocks.len() as u64
        };

        Self {
            key: TipsetKey(ids),
            blocks,
            min_ticket,
            weight,
        }
    }

    /// Returns the tipset made of the blocks with the `len() - start` largest
    /// tickets.
    ///
    /// ## Panics
    /// Panics if `start` is not less than [`Tipset::len`].
    pub(crate) fn suffix(&self, start: usize) -> Self {
        assert!(
            start < self.blocks.len(),
            "suffix start {} out of range for tipset of {} blocks",
            start,
            self.blocks.len()
        );

        Self::from_sorted(self.blocks[start..].to_vec())
    }

    /// Consumes the tipset, returning its blocks.
    pub(crate) fn into_blocks(self) -> Vec<Arc<Block>> {
        self.blocks
    }

    /// Blocks of this tipset in ascending order of ticket.
    #[inline]
    pub fn blocks(&self) -> &[Arc<Block>] {
        &self.blocks
    }

    #[inline]
    pub fn key(&self) -> &TipsetKey {
        &self.key
    }

    /// Smallest ticket among the blocks of this tipset. Serves as the
    /// randomness sampled by blocks mined on top of it.
    #[inline]
    pub fn min_ticket(&self) -> Ticket {
        self.min_ticket
    }

    /// Number of live blocks from genesis up to and including this tipset.
    #[inline]
    pub fn weight(&self) -> u64 {
        self.weight
    }

    #[inline]
    pub fn height(&self) -> u64 {
        self.blocks[0].height
    }

    #[inline]
    pub fn parent(&self) -> Option<&Arc<Tipset>> {
        self.blocks[0].parent.as_ref()
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.blocks[0].is_null
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; tipsets cannot be empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the ancestor reached by following `steps` parent links, or
    /// `None` if the genesis chain ends first.
    pub fn ancestor(self: &Arc<Self>, steps: usize) -> Option<&Arc<Self>> {
        let mut tipset = self;
        for _ in 0..steps {
            tipset = tipset.parent()?;
        }

        Some(tipset)
    }

    /// Returns the nearest tipset of live blocks, starting from this one.
    pub fn live_ancestor(self: &Arc<Self>) -> Option<&Arc<Self>> {
        let mut tipset = self;
        while tipset.is_null() {
            tipset = tipset.parent()?;
        }

        Some(tipset)
    }

    /// Returns true if this tipset beats `other` in fork choice: greater
    /// weight, or equal weight and a smaller minimum ticket.
    pub fn is_heavier_than(&self, other: &Tipset) -> bool {
        self.weight > other.weight
            || (self.weight == other.weight && self.min_ticket < other.min_ticket)
    }
}

impl PartialEq for Tipset {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Tipset {}
