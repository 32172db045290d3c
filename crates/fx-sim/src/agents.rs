//! Market participants.
//!
//! - [`Bank`]: quotes the market (plus a private offset), sends lots to
//!   the CDA and settles its own matches.
//! - [`Trader`]: trades peer-to-peer with other traders at its bank's
//!   quotes; never touches the order book.
//!
//! Neither agent draws from a global RNG: every random decision takes
//! the model's seeded generator as an argument.

use cda_core::{price_from_f64, CdaError, CreatorId, Currency, Order, OrderBook, Quantity};
use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::SimError;
use crate::ticks::{Quote, PIP};

pub const BANK_START_BALANCE: i64 = 10_000_000_000;
pub const TRADER_START_BALANCE: i64 = 100_000_000;

/// Mean and standard deviation of a bank's private quote offset.
const RATE_OFFSET_MEAN: f64 = 0.0001;
const RATE_OFFSET_STD: f64 = 0.00002;

/// Balances held in each currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    pub eur: Decimal,
    pub usd: Decimal,
}

impl Account {
    pub fn new(eur: Decimal, usd: Decimal) -> Self {
        Account { eur, usd }
    }

    pub fn is_exhausted(&self) -> bool {
        self.eur <= Decimal::ZERO && self.usd <= Decimal::ZERO
    }
}

#[derive(Debug, Clone)]
pub struct Bank {
    pub id: CreatorId,
    pub name: String,
    pub account: Account,
    pub bid: f64,
    pub offer: f64,
    pub rate_offset: f64,
}

impl Bank {
    pub fn new<R: Rng>(id: CreatorId, name: impl Into<String>, opening: &Quote, rng: &mut R) -> Self {
        let start = Decimal::from(BANK_START_BALANCE);
        Bank {
            id,
            name: name.into(),
            account: Account::new(start, start),
            bid: opening.bid,
            offer: opening.offer,
            rate_offset: gaussian(rng, RATE_OFFSET_MEAN, RATE_OFFSET_STD),
        }
    }

    /// Move the bank's quotes to the market's plus its private offset.
    pub fn requote(&mut self, market: &Quote) {
        self.bid = market.bid + self.rate_offset;
        self.offer = market.offer + self.rate_offset;
    }

    pub fn spread_pips(&self) -> f64 {
        (self.bid - self.offer).abs() / PIP
    }

    /// Send a EUR lot and a USD lot to the book, both as offers at the
    /// bank's offer or both as bids at the bank's bid (even odds).
    ///
    /// Each lot is a uniform fraction of `balance / max_steps`. Lots that
    /// truncate to zero are skipped. Returns the number of orders sent.
    pub fn submit_orders<R: Rng>(
        &self,
        book: &mut OrderBook,
        rng: &mut R,
        max_steps: usize,
    ) -> Result<usize, SimError> {
        let sell = rng.gen::<f64>() < 0.5;
        let euros = lot(self.account.eur, rng.gen::<f64>(), max_steps);
        let dollars = lot(self.account.usd, rng.gen::<f64>(), max_steps);

        let price = if sell {
            price_from_f64(self.offer)?
        } else {
            price_from_f64(self.bid)?
        };

        let mut sent = 0;
        for (quantity, currency) in [(euros, Currency::Eur), (dollars, Currency::Usd)] {
            if quantity == 0 {
                trace!(bank = %self.name, %currency, "skipping empty lot");
                continue;
            }
            let order = if sell {
                Order::offer(self.id, quantity, price, currency)
            } else {
                Order::bid(self.id, quantity, price, currency)
            };
            book.add_order(order)?;
            sent += 1;
        }

        Ok(sent)
    }
}

#[derive(Debug, Clone)]
pub struct Trader {
    pub id: CreatorId,
    pub name: String,
    /// Index of the bank whose quotes this trader uses.
    pub bank: usize,
    pub account: Account,
    pub active: bool,
}

/// Balance changes of a peer-to-peer trade, seen from the initiator.
/// The counterparty receives the negation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerTrade {
    /// Index into the model's trader list.
    pub counterparty: usize,
    pub eur: Decimal,
    pub usd: Decimal,
}

impl PeerTrade {
    pub fn eur_volume(&self) -> Decimal {
        self.eur.abs()
    }

    pub fn usd_volume(&self) -> Decimal {
        self.usd.abs()
    }
}

impl Trader {
    pub fn new(id: CreatorId, name: impl Into<String>, bank: usize) -> Self {
        let start = Decimal::from(TRADER_START_BALANCE);
        Trader {
            id,
            name: name.into(),
            bank,
            account: Account::new(start, start),
            active: true,
        }
    }

    /// Pick a side, a currency and a counterparty, and price the trade at
    /// the bank's quotes: buys at the bank's bid, sells at its offer.
    ///
    /// The same uniform draw picks both the counterparty and the
    /// currency.
    pub fn random_trade<R: Rng>(
        &self,
        bank: &Bank,
        rng: &mut R,
        num_traders: usize,
        max_steps: usize,
    ) -> Result<PeerTrade, SimError> {
        let buy = rng.gen::<f64>() < 0.5;
        let pick = rng.gen::<f64>();
        let counterparty = (pick * num_traders.saturating_sub(1) as f64).round() as usize;

        let steps = Decimal::from(max_steps.max(1) as u64);
        let euros = self.account.eur * fraction(rng.gen::<f64>()) / steps;
        let dollars = self.account.usd * fraction(rng.gen::<f64>()) / steps;

        let rate = if buy {
            price_from_f64(bank.bid)?
        } else {
            price_from_f64(bank.offer)?
        };
        if rate.is_zero() {
            return Err(CdaError::DegeneratePrice(0.0).into());
        }

        let (eur, usd) = match (buy, pick < 0.5) {
            // buy EUR, pay USD
            (true, true) => (euros, -(euros * rate)),
            // buy USD, pay EUR
            (true, false) => (-(dollars / rate), dollars),
            // sell EUR, receive USD
            (false, true) => (-euros, euros * rate),
            // sell USD, receive EUR
            (false, false) => (dollars / rate, -dollars),
        };

        Ok(PeerTrade {
            counterparty,
            eur,
            usd,
        })
    }
}

/// `u * balance / max_steps`, truncated; zero for non-positive balances.
fn lot(balance: Decimal, u: f64, max_steps: usize) -> Quantity {
    let steps = Decimal::from(max_steps.max(1) as u64);
    (balance * fraction(u) / steps)
        .trunc()
        .to_u64()
        .unwrap_or(0)
}

fn fraction(u: f64) -> Decimal {
    Decimal::from_f64(u).unwrap_or(Decimal::ZERO)
}

/// Normal variate by the Box-Muller transform.
fn gaussian<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    // 1 - u keeps the logarithm away from zero.
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    mean + std_dev * z
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rust_decimal_macros::dec;

    fn quote(bid: f64, offer: f64) -> Quote {
        Quote {
            time: NaiveDate::from_ymd_opt(2021, 1, 4)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            bid,
            offer,
        }
    }

    #[test]
    fn bank_requotes_with_its_offset() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut bank = Bank::new(CreatorId(0), "bank0", &quote(1.2, 1.2002), &mut rng);
        bank.rate_offset = 0.0001;
        bank.requote(&quote(1.3, 1.3003));

        assert!((bank.bid - 1.3001).abs() < 1e-12);
        assert!((bank.offer - 1.3004).abs() < 1e-12);
        assert!((bank.spread_pips() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn bank_sends_two_lots_on_one_side() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let bank = Bank::new(CreatorId(0), "bank0", &quote(1.2, 1.2002), &mut rng);
        let mut book = OrderBook::new();

        let sent = bank.submit_orders(&mut book, &mut rng, 100).unwrap();
        assert_eq!(sent, 2);

        let snap = book.snapshot();
        assert!(snap.bid_depth == 2 || snap.offer_depth == 2);
        assert_eq!(snap.bid_depth + snap.offer_depth, 2);

        let orders: Vec<_> = book.bids().iter().chain(book.offers().iter()).collect();
        assert!(orders.iter().any(|o| o.currency == Currency::Eur));
        assert!(orders.iter().any(|o| o.currency == Currency::Usd));
        assert!(orders.iter().all(|o| o.creator_id == CreatorId(0)));
    }

    #[test]
    fn exhausted_bank_sends_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut bank = Bank::new(CreatorId(0), "bank0", &quote(1.2, 1.2002), &mut rng);
        bank.account = Account::new(dec!(-5), Decimal::ZERO);
        let mut book = OrderBook::new();

        assert_eq!(bank.submit_orders(&mut book, &mut rng, 10).unwrap(), 0);
        assert!(book.snapshot().is_empty());
    }

    #[test]
    fn lot_truncates_and_floors_at_zero() {
        assert_eq!(lot(dec!(1000), 0.5, 10), 50);
        assert_eq!(lot(dec!(999), 0.01, 10), 0);
        assert_eq!(lot(dec!(-1000), 0.5, 10), 0);
    }

    #[test]
    fn peer_trade_moves_opposite_currencies() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let bank = Bank::new(CreatorId(0), "bank0", &quote(1.2, 1.2002), &mut rng);
        let trader = Trader::new(CreatorId(1), "trader0bank0", 0);

        for _ in 0..50 {
            let trade = trader.random_trade(&bank, &mut rng, 4, 10).unwrap();
            assert!(trade.counterparty < 4);
            // One leg is received, the other paid.
            assert!(trade.eur * trade.usd <= Decimal::ZERO);
        }
    }

    #[test]
    fn gaussian_is_centred() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let n = 20_000;
        let mean = (0..n).map(|_| gaussian(&mut rng, 0.0001, 0.00002)).sum::<f64>() / n as f64;
        assert!((mean - 0.0001).abs() < 0.000002);
    }

    #[test]
    fn exhausted_account() {
        assert!(Account::new(Decimal::ZERO, dec!(-1)).is_exhausted());
        assert!(!Account::new(dec!(1), dec!(-1)).is_exhausted());
    }
}
