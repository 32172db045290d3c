//! Continuous double auction order book.
//!
//! - Bids and offers are plain sequences, re-sorted from scratch on
//!   every matching pass (bids descending, offers ascending).
//! - A pass keeps pairing while the *heads* of the two sequences cross.
//! - Which orders get paired is governed by [`Pairing`]. The default,
//!   [`Pairing::Tail`], pops the worst-priced bid and offer.
//! - Partial fills put the remainder back at the front of its side,
//!   unsorted; the next pass sorts it into place.
//! - Pairings across currencies, or between two orders of the same
//!   creator, consume quantity from both sides without recording a
//!   match.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::CdaError;
use crate::order::{Order, Price, Quantity};
use crate::side::Side;
use crate::top_of_book::BookSnapshot;
use crate::trade::{Match, MatchReport};

/// Which end of the sorted sequences a pairing takes its orders from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pairing {
    /// Worst-priced bid against worst-priced offer.
    #[default]
    Tail,
    /// Best-priced bid against best-priced offer.
    Head,
}

/// Order book for the EURUSD pair.
#[derive(Debug, Default)]
pub struct OrderBook {
    /// Resting bids; sorted descending only right after a matching pass.
    bids: VecDeque<Order>,

    /// Resting offers; sorted ascending only right after a matching pass.
    offers: VecDeque<Order>,

    /// Matches not yet removed by whoever settles them.
    matches: Vec<Match>,

    pairing: Pairing,
}

impl OrderBook {
    /// Create an empty book with the default (tail) pairing.
    pub fn new() -> Self {
        OrderBook::default()
    }

    pub fn with_pairing(pairing: Pairing) -> Self {
        OrderBook {
            pairing,
            ..OrderBook::default()
        }
    }

    pub fn pairing(&self) -> Pairing {
        self.pairing
    }

    /// Admit an order to the side it belongs to.
    ///
    /// Orders with zero quantity are rejected: they could never be
    /// filled and would break the "every resting order has quantity"
    /// invariant the matching loop relies on.
    pub fn add_order(&mut self, order: Order) -> Result<(), CdaError> {
        if order.quantity == 0 {
            return Err(CdaError::InvalidOrder {
                reason: format!("zero quantity from creator {}", order.creator_id),
            });
        }

        match order.side {
            Side::Offer => self.offers.push_back(order),
            Side::Bid => self.bids.push_back(order),
        }
        Ok(())
    }

    /// Run one matching pass over everything currently resting.
    ///
    /// Safe to call on an empty book. A remainder left at the front of a
    /// side can hide a crossing, so a second call may still pair orders;
    /// repeated calls converge.
    pub fn match_orders(&mut self) -> MatchReport {
        let mut report = MatchReport::default();

        self.sort_sides();

        while self.heads_cross() {
            let (mut bid, mut offer) = match self.take_pair() {
                Some(pair) => pair,
                None => break,
            };

            let match_qty = bid.quantity.min(offer.quantity);
            if let Some(rest) = bid.split(match_qty) {
                self.bids.push_front(rest);
            }
            if let Some(rest) = offer.split(match_qty) {
                self.offers.push_front(rest);
            }

            report.pairings += 1;

            if bid.currency == offer.currency && bid.creator_id != offer.creator_id {
                report.recorded += 1;
                report.matched_quantity = report.matched_quantity.saturating_add(match_qty);
                self.matches.push(Match { bid, offer });
            } else {
                trace!(
                    bid_creator = %bid.creator_id,
                    offer_creator = %offer.creator_id,
                    bid_currency = %bid.currency,
                    offer_currency = %offer.currency,
                    quantity = match_qty,
                    "pairing discarded without a match"
                );
                report.discarded_quantity = report.discarded_quantity.saturating_add(match_qty);
            }
        }

        if !report.is_empty() {
            debug!(
                pairings = report.pairings,
                recorded = report.recorded,
                matched = report.matched_quantity,
                discarded = report.discarded_quantity,
                bids_left = self.bids.len(),
                offers_left = self.offers.len(),
                "matching pass complete"
            );
        }

        report
    }

    /// Quantity-weighted average of every recorded match's mid price.
    ///
    /// EUR and USD matches are averaged together. Returns zero when no
    /// match is recorded.
    pub fn clearing_price(&self) -> Result<Price, CdaError> {
        if self.matches.is_empty() {
            return Ok(Decimal::ZERO);
        }

        let mut weighted = Decimal::ZERO;
        let mut cumulative = Decimal::ZERO;

        for m in &self.matches {
            let qty = Decimal::from(m.bid.quantity);
            let mid = m.mid_price()?;
            let contribution = qty
                .checked_mul(mid)
                .ok_or(CdaError::Overflow("clearing price"))?;

            weighted = weighted
                .checked_add(contribution)
                .ok_or(CdaError::Overflow("clearing price"))?;
            cumulative = cumulative
                .checked_add(qty)
                .ok_or(CdaError::Overflow("cumulative quantity"))?;
        }

        weighted
            .checked_div(cumulative)
            .ok_or(CdaError::Overflow("clearing price"))
    }

    /// Matched quantity relative to the quantity still resting.
    ///
    /// Zero when nothing rests or nothing was matched.
    pub fn efficiency(&self) -> Result<Decimal, CdaError> {
        if (self.bids.is_empty() && self.offers.is_empty()) || self.matches.is_empty() {
            return Ok(Decimal::ZERO);
        }

        let matched = sum_quantities(self.matches.iter().map(|m| m.bid.quantity))?;
        let resting = sum_quantities(
            self.bids
                .iter()
                .chain(self.offers.iter())
                .map(|o| o.quantity),
        )?;

        matched
            .checked_div(resting)
            .ok_or(CdaError::Overflow("efficiency"))
    }

    /// Discard every resting order and every unsettled match.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.offers.clear();
        self.matches.clear();
    }

    pub fn bids(&self) -> &VecDeque<Order> {
        &self.bids
    }

    pub fn offers(&self) -> &VecDeque<Order> {
        &self.offers
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Remove and return the matches selected by `pred`, keeping the
    /// order of the ones left behind.
    pub fn take_matches_where<F>(&mut self, mut pred: F) -> Vec<Match>
    where
        F: FnMut(&Match) -> bool,
    {
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(self.matches.len());
        for m in self.matches.drain(..) {
            if pred(&m) {
                taken.push(m);
            } else {
                kept.push(m);
            }
        }
        self.matches = kept;
        taken
    }

    /// Remove the match at `index`, shifting later matches down.
    pub fn remove_match(&mut self, index: usize) -> Option<Match> {
        if index < self.matches.len() {
            Some(self.matches.remove(index))
        } else {
            None
        }
    }

    /// Price at the head of the bid sequence.
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.front().map(|o| o.price)
    }

    /// Price at the head of the offer sequence.
    pub fn best_offer(&self) -> Option<Price> {
        self.offers.front().map(|o| o.price)
    }

    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            best_bid: self.best_bid(),
            best_offer: self.best_offer(),
            bid_depth: self.bids.len(),
            offer_depth: self.offers.len(),
            bid_quantity: Self::total_quantity(&self.bids),
            offer_quantity: Self::total_quantity(&self.offers),
            pending_matches: self.matches.len(),
        }
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Stable sorts, so re-sorting an already sorted side is a no-op.
    fn sort_sides(&mut self) {
        self.bids
            .make_contiguous()
            .sort_by(|a, b| b.price.cmp(&a.price));
        self.offers
            .make_contiguous()
            .sort_by(|a, b| a.price.cmp(&b.price));
    }

    /// Continuation test: both sides non-empty and the heads cross.
    fn heads_cross(&self) -> bool {
        match (self.best_bid(), self.best_offer()) {
            (Some(bid), Some(offer)) => bid >= offer,
            _ => false,
        }
    }

    fn take_pair(&mut self) -> Option<(Order, Order)> {
        let pair = match self.pairing {
            Pairing::Tail => (self.bids.pop_back()?, self.offers.pop_back()?),
            Pairing::Head => (self.bids.pop_front()?, self.offers.pop_front()?),
        };
        Some(pair)
    }

    fn total_quantity(orders: &VecDeque<Order>) -> Quantity {
        orders.iter().map(|o| o.quantity).fold(0, Quantity::saturating_add)
    }
}

fn sum_quantities<I>(quantities: I) -> Result<Decimal, CdaError>
where
    I: IntoIterator<Item = Quantity>,
{
    quantities.into_iter().try_fold(Decimal::ZERO, |acc, q| {
        acc.checked_add(Decimal::from(q))
            .ok_or(CdaError::Overflow("quantity sum"))
    })
}
