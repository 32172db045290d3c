//! Applying the economic consequences of recorded matches.
//!
//! The order book only records who matched with whom; moving currency
//! between accounts happens here, against whatever [`Roster`] the caller
//! provides. A bank settles the matches it bid on, one at a time, each at
//! the clearing price of all matches still outstanding at that moment,
//! and removes each match from the book once applied.

use cda_core::{CdaError, CreatorId, Currency, Match, OrderBook, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agents::Account;
use crate::error::SimError;

/// Lookup from a creator id to the account that owns its balances.
pub trait Roster {
    fn account_mut(&mut self, id: CreatorId) -> Option<&mut Account>;
}

/// Running totals of everything that changed hands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Turnover {
    pub trades: u64,
    pub eur_volume: Decimal,
    pub usd_volume: Decimal,
    /// Clearing price used by the most recent CDA settlement.
    pub last_clearing_price: Decimal,
}

/// Settle every outstanding match whose bid was sent by `bidder`.
///
/// Returns the number of matches settled.
pub fn settle_matches_for<R: Roster>(
    bidder: CreatorId,
    book: &mut OrderBook,
    roster: &mut R,
    turnover: &mut Turnover,
) -> Result<usize, SimError> {
    let mut settled = 0;

    while let Some(idx) = book
        .matches()
        .iter()
        .position(|m| m.bid.creator_id == bidder)
    {
        let price = book.clearing_price()?;
        let m = match book.remove_match(idx) {
            Some(m) => m,
            None => break,
        };

        settle_one(&m, price, roster, turnover)?;
        settled += 1;
    }

    if settled > 0 {
        debug!(bidder = %bidder, settled, "matches settled");
    }

    Ok(settled)
}

fn settle_one<R: Roster>(
    m: &Match,
    price: Price,
    roster: &mut R,
    turnover: &mut Turnover,
) -> Result<(), SimError> {
    let quantity = Decimal::from(m.offer.quantity);

    // Deltas for the bidder; the offer side gets the negation.
    let (eur, usd) = match m.bid.currency {
        Currency::Eur => {
            let dollars = quantity
                .checked_mul(price)
                .ok_or(CdaError::Overflow("EUR settlement"))?
                .floor();
            turnover.usd_volume += dollars.abs();
            turnover.eur_volume += quantity;
            (quantity, -dollars)
        }
        Currency::Usd => {
            if price.is_zero() {
                warn!(bidder = %m.bid.creator_id, "zero clearing price, USD match dropped unsettled");
                return Ok(());
            }
            let euros = (quantity / price).floor();
            turnover.usd_volume += quantity;
            turnover.eur_volume += euros.abs();
            (-euros, quantity)
        }
    };

    turnover.trades += 1;
    turnover.last_clearing_price = price;

    apply(roster, m.bid.creator_id, eur, usd);
    apply(roster, m.offer.creator_id, -eur, -usd);
    Ok(())
}

fn apply<R: Roster>(roster: &mut R, id: CreatorId, eur: Decimal, usd: Decimal) {
    match roster.account_mut(id) {
        Some(account) => {
            account.eur += eur;
            account.usd += usd;
        }
        None => warn!(creator = %id, "no account for match participant"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cda_core::Order;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Accounts(HashMap<CreatorId, Account>);

    impl Roster for Accounts {
        fn account_mut(&mut self, id: CreatorId) -> Option<&mut Account> {
            self.0.get_mut(&id)
        }
    }

    fn roster() -> Accounts {
        let mut accounts = Accounts::default();
        for id in 0..3 {
            accounts
                .0
                .insert(CreatorId(id), Account::new(dec!(1000), dec!(1000)));
        }
        accounts
    }

    #[test]
    fn eur_match_pays_dollars_at_clearing_price() {
        let mut book = OrderBook::new();
        book.add_order(Order::bid(CreatorId(0), 100, dec!(1.21), Currency::Eur)).unwrap();
        book.add_order(Order::offer(CreatorId(1), 100, dec!(1.19), Currency::Eur)).unwrap();
        book.match_orders();

        let mut accounts = roster();
        let mut turnover = Turnover::default();
        let n = settle_matches_for(CreatorId(0), &mut book, &mut accounts, &mut turnover).unwrap();

        assert_eq!(n, 1);
        assert!(book.matches().is_empty());
        assert_eq!(accounts.0[&CreatorId(0)], Account::new(dec!(1100), dec!(880)));
        assert_eq!(accounts.0[&CreatorId(1)], Account::new(dec!(900), dec!(1120)));
        assert_eq!(turnover.trades, 1);
        assert_eq!(turnover.eur_volume, dec!(100));
        assert_eq!(turnover.usd_volume, dec!(120));
        assert_eq!(turnover.last_clearing_price, dec!(1.2));
    }

    #[test]
    fn usd_match_pays_euros_at_inverse_price() {
        let mut book = OrderBook::new();
        book.add_order(Order::bid(CreatorId(0), 125, dec!(1.3), Currency::Usd)).unwrap();
        book.add_order(Order::offer(CreatorId(2), 125, dec!(1.2), Currency::Usd)).unwrap();
        book.match_orders();

        let mut accounts = roster();
        let mut turnover = Turnover::default();
        settle_matches_for(CreatorId(0), &mut book, &mut accounts, &mut turnover).unwrap();

        // 125 / 1.25 = 100 euros.
        assert_eq!(accounts.0[&CreatorId(0)], Account::new(dec!(900), dec!(1125)));
        assert_eq!(accounts.0[&CreatorId(2)], Account::new(dec!(1100), dec!(875)));
        assert_eq!(turnover.eur_volume, dec!(100));
        assert_eq!(turnover.usd_volume, dec!(125));
    }

    #[test]
    fn other_bidders_matches_stay_in_the_book() {
        let mut book = OrderBook::new();
        book.add_order(Order::bid(CreatorId(0), 10, dec!(1.2), Currency::Eur)).unwrap();
        book.add_order(Order::bid(CreatorId(1), 10, dec!(1.2), Currency::Eur)).unwrap();
        book.add_order(Order::offer(CreatorId(2), 20, dec!(1.2), Currency::Eur)).unwrap();
        book.match_orders();
        assert_eq!(book.matches().len(), 2);

        let mut accounts = roster();
        let mut turnover = Turnover::default();
        let n = settle_matches_for(CreatorId(1), &mut book, &mut accounts, &mut turnover).unwrap();

        assert_eq!(n, 1);
        assert_eq!(book.matches().len(), 1);
        assert_eq!(book.matches()[0].bid.creator_id, CreatorId(0));
        assert_eq!(accounts.0[&CreatorId(0)], Account::new(dec!(1000), dec!(1000)));
    }

    #[test]
    fn missing_counterparty_still_settles_the_bidder() {
        let mut book = OrderBook::new();
        book.add_order(Order::bid(CreatorId(0), 10, dec!(1.0), Currency::Eur)).unwrap();
        book.add_order(Order::offer(CreatorId(9), 10, dec!(1.0), Currency::Eur)).unwrap();
        book.match_orders();

        let mut accounts = roster();
        let mut turnover = Turnover::default();
        settle_matches_for(CreatorId(0), &mut book, &mut accounts, &mut turnover).unwrap();

        assert_eq!(accounts.0[&CreatorId(0)], Account::new(dec!(1010), dec!(990)));
        assert!(book.matches().is_empty());
    }
}
