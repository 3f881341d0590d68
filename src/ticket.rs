//! Deterministic stand-in for the verifiable random function used in leader
//! election.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{miner::MinerId, power_dist::PowerValue};

/// Ticket values are drawn uniformly from `0..TICKET_SPACE`.
pub const TICKET_SPACE: u64 = 1 << 40;

/// Numeric type of a ticket.
pub type Ticket = u64;

/// Purpose of a ticket draw. Draws of different kinds from the same input
/// are independent.
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketKind {
    /// Ticket carried in the new block, seeded by the parent tipset.
    Chain = 1,
    /// Election proof checked against the miner's power, seeded by the
    /// lookback tipset.
    Election = 2,
}

/// Produces tickets for a single trial.
///
/// Two generators built from the same root produce identical tickets for
/// identical `(input, miner, kind)` triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketGenerator {
    root: u64,
}

impl TicketGenerator {
    pub fn new(root: u64) -> Self {
        Self { root }
    }

    /// Draws a ticket for `miner` from the randomness `input`.
    pub fn draw(&self, input: Ticket, miner: MinerId, kind: TicketKind) -> Ticket {
        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&self.root.to_le_bytes());
        seed[8..16].copy_from_slice(&input.to_le_bytes());
        seed[16..24].copy_from_slice(&(miner.get() as u64).to_le_bytes());
        seed[24..].copy_from_slice(&(kind as u64).to_le_bytes());

        ChaCha8Rng::from_seed(seed).gen_range(0..TICKET_SPACE)
    }
}

/// Returns true iff `ticket` wins the leader election for a miner holding
/// `power` of the total mining power.
#[inline]
pub fn is_winning(ticket: Ticket, power: PowerValue) -> bool {
    (ticket as f64) < power * TICKET_SPACE as f64
}
