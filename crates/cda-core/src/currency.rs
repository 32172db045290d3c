//! Currency an order is denominated in.
//!
//! Only the two legs of EURUSD exist; the numeric codes (`0` = EUR,
//! `1` = USD) are the ones simulation inputs use.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CdaError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Eur,
    Usd,
}

impl TryFrom<u8> for Currency {
    type Error = CdaError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Currency::Eur),
            1 => Ok(Currency::Usd),
            other => Err(CdaError::UnknownCurrency(other)),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Eur => f.write_str("EUR"),
            Currency::Usd => f.write_str("USD"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        assert_eq!(Currency::try_from(0), Ok(Currency::Eur));
        assert_eq!(Currency::try_from(1), Ok(Currency::Usd));
        assert_eq!(Currency::try_from(2), Err(CdaError::UnknownCurrency(2)));
        assert_eq!(Currency::Eur.to_string(), "EUR");
    }
}
