//! Enumeration of the forks a rational miner can extend without being
//! slashed.

use std::sync::Arc;

use crate::{
    block::Block,
    tipset::{Tipset, TipsetError},
};

/// Partitions `blocks` into maximal tipsets: blocks land in the same tipset
/// iff they share a height and a parent tipset. Tipsets are returned in order
/// of the first appearance of one of their blocks in `blocks`.
pub fn group_into_tipsets(
    blocks: &[Arc<Block>],
) -> Result<Vec<Arc<Tipset>>, TipsetError> {
    let mut groups: Vec<Vec<Arc<Block>>> = vec![];

    for block in blocks {
        let group = groups.iter_mut().find(|group| {
            let first = &group[0];
            first.height == block.height
                && first.parent_key() == block.parent_key()
        });

        match group {
            Some(group) => group.push(block.clone()),
            None => groups.push(vec![block.clone()]),
        }
    }

    groups
        .into_iter()
        .map(|group| Tipset::new(group).map(Arc::new))
        .collect()
}

/// Returns every non-slashable fork of `tipset`: for each block, the tipset
/// made of that block and all blocks with a larger ticket.
///
/// Dropping the blocks with the smallest tickets cannot be told apart from
/// not having seen them, so these are exactly the safe choices. A tipset of
/// `n` blocks yields `n` forks, the `i`th holding `n - i` blocks.
pub fn forks_of(tipset: &Tipset) -> Vec<Arc<Tipset>> {
    (0..tipset.len())
        .map(|start| Arc::new(tipset.suffix(start)))
        .collect()
}

/// Groups `blocks` into tipsets and lists the forks of each, in the form
/// offered to miners at the start of a round.
pub fn enumerate_forks(
    blocks: &[Arc<Block>],
) -> Result<Vec<Vec<Arc<Tipset>>>, TipsetError> {
    Ok(group_into_tipsets(blocks)?
        .iter()
        .map(|tipset| forks_of(tipset))
        .collect())
}
