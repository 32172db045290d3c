//! cda-core
//!
//! Pure continuous double auction logic for the EURUSD pair:
//! - orders, sides and currencies
//! - the order book with its batch matching pass
//! - matches, clearing price and efficiency diagnostics

pub mod side;
pub mod currency;
pub mod trade;
pub mod order;
pub mod order_book;
pub mod error;
pub mod top_of_book;

pub use side::Side;
pub use currency::Currency;

pub use trade::{Match, MatchReport};

pub use order::{price_from_f64, CreatorId, Order, Price, Quantity};
pub use order_book::{OrderBook, Pairing};
pub use error::CdaError;
pub use top_of_book::BookSnapshot;
