//! Records produced by a matching pass.
//!
//! - [`Match`]: one bid paired with one offer at the matched quantity.
//! - [`MatchReport`]: what a single `match_orders` call did to the book.
//!
//! Both are plain data; settlement (moving currency between accounts)
//! happens outside the core.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CdaError;
use crate::order::{Order, Price, Quantity};

/// A recorded pairing of one bid with one offer.
///
/// Both legs carry the matched quantity, i.e. the smaller of the two
/// pre-match quantities. The book never mutates a recorded match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub bid: Order,
    pub offer: Order,
}

impl Match {
    pub fn quantity(&self) -> Quantity {
        self.bid.quantity
    }

    /// Midpoint of the two limit prices.
    pub fn mid_price(&self) -> Result<Price, CdaError> {
        self.bid
            .price
            .checked_add(self.offer.price)
            .map(|sum| sum / Decimal::TWO)
            .ok_or(CdaError::Overflow("match mid price"))
    }
}

/// Summary of one `match_orders` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Pairings performed (recorded or not).
    pub pairings: usize,

    /// Matches appended to the match log.
    pub recorded: usize,

    /// Quantity carried by the recorded matches.
    pub matched_quantity: Quantity,

    /// Quantity consumed from both sides by self-trade or cross-currency
    /// pairings, which leave no match behind.
    pub discarded_quantity: Quantity,
}

impl MatchReport {
    pub fn is_empty(&self) -> bool {
        self.pairings == 0
    }
}
