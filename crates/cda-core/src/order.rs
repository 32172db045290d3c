//! Order representation used inside the order book.
//!
//! An `Order` is a plain value: who sent it, which side, how much, at
//! what exchange rate and in which currency. The only mutation the book
//! ever performs on an order is the quantity reduction of a partial
//! fill (see [`Order::split`]).

use std::fmt;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::error::CdaError;
use crate::side::Side;

/// Quantity in units of the order's currency.
pub type Quantity = u64;

/// Exchange rate quoted as EURUSD, fixed-point.
pub type Price = Decimal;

/// Opaque participant identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CreatorId(pub u32);

impl fmt::Display for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single order in the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub creator_id: CreatorId,
    pub side: Side,
    pub quantity: Quantity,
    pub price: Price,
    pub currency: Currency,
}

impl Order {
    pub fn new(
        creator_id: CreatorId,
        side: Side,
        quantity: Quantity,
        price: Price,
        currency: Currency,
    ) -> Self {
        Order {
            creator_id,
            side,
            quantity,
            price,
            currency,
        }
    }

    pub fn bid(creator_id: CreatorId, quantity: Quantity, price: Price, currency: Currency) -> Self {
        Order::new(creator_id, Side::Bid, quantity, price, currency)
    }

    pub fn offer(creator_id: CreatorId, quantity: Quantity, price: Price, currency: Currency) -> Self {
        Order::new(creator_id, Side::Offer, quantity, price, currency)
    }

    /// Reduce this order to `keep` units and return the remainder as a
    /// new order with the same creator, side, price and currency.
    ///
    /// Returns `None` (and leaves `self` untouched) when there is nothing
    /// beyond `keep` to split off.
    pub fn split(&mut self, keep: Quantity) -> Option<Order> {
        if self.quantity <= keep {
            return None;
        }
        let remainder = Order {
            quantity: self.quantity - keep,
            ..self.clone()
        };
        self.quantity = keep;
        Some(remainder)
    }
}

/// Convert a floating-point rate into a [`Price`].
///
/// NaN and infinities have no place in the book's price ordering and
/// are rejected; so is anything outside the `Decimal` range.
pub fn price_from_f64(rate: f64) -> Result<Price, CdaError> {
    if !rate.is_finite() {
        return Err(CdaError::DegeneratePrice(rate));
    }
    Decimal::from_f64(rate).ok_or(CdaError::DegeneratePrice(rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn split_keeps_identity_and_returns_remainder() {
        let mut bid = Order::bid(CreatorId(7), 10, dec!(1.1012), Currency::Eur);
        let rest = bid.split(6).unwrap();

        assert_eq!(bid.quantity, 6);
        assert_eq!(rest.quantity, 4);
        assert_eq!(rest.creator_id, CreatorId(7));
        assert_eq!(rest.price, dec!(1.1012));
        assert_eq!(rest.side, Side::Bid);
        assert_eq!(rest.currency, Currency::Eur);
    }

    #[test]
    fn split_without_excess_is_noop() {
        let mut offer = Order::offer(CreatorId(1), 5, dec!(1.2), Currency::Usd);
        assert!(offer.split(5).is_none());
        assert!(offer.split(9).is_none());
        assert_eq!(offer.quantity, 5);
    }

    #[test]
    fn price_conversion_rejects_nan_and_infinity() {
        assert!(matches!(price_from_f64(f64::NAN), Err(CdaError::DegeneratePrice(_))));
        assert!(matches!(price_from_f64(f64::INFINITY), Err(CdaError::DegeneratePrice(_))));
        assert_eq!(price_from_f64(1.25).unwrap(), dec!(1.25));
        assert_eq!(price_from_f64(-0.5).unwrap(), dec!(-0.5));
    }
}
