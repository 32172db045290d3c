//! Helper types for representing the state of the book at a glance.
//!
//! Used for logging and for the per-step statistics the simulation
//! collects; it is a copy, never a view into the live book.

use serde::{Deserialize, Serialize};

use crate::order::{Price, Quantity};

/// A simple snapshot of both sides of the book.
///
/// `best_bid` / `best_offer` are the heads of each sequence, i.e. what
/// the continuation test of the next matching pass would compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub best_bid: Option<Price>,
    pub best_offer: Option<Price>,

    /// Number of resting orders per side.
    pub bid_depth: usize,
    pub offer_depth: usize,

    /// Total resting quantity per side.
    pub bid_quantity: Quantity,
    pub offer_quantity: Quantity,

    /// Matches waiting for a collaborator to settle them.
    pub pending_matches: usize,
}

impl BookSnapshot {
    /// Returns `true` if there is *no* bid and *no* offer.
    pub fn is_empty(&self) -> bool {
        self.bid_depth == 0 && self.offer_depth == 0
    }
}
