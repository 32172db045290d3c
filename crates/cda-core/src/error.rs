//! Error types for the CDA core.
//!
//! Matching itself is infallible; errors come from admitting orders,
//! converting raw inputs, and checked arithmetic in the price
//! diagnostics.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CdaError {
    /// The order can never rest in the book (e.g. zero quantity).
    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// Currency code outside the EUR/USD pair.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(u8),

    #[error("unknown side: {0:?}")]
    UnknownSide(char),

    /// A floating-point price that has no place in a total order.
    #[error("degenerate price: {0}")]
    DegeneratePrice(f64),

    /// A quantity x price product or sum left the fixed-point range.
    #[error("arithmetic overflow while computing {0}")]
    Overflow(&'static str),
}
