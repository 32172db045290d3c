//! Side (Bid / Offer) for resting orders.

use serde::{Deserialize, Serialize};

/// Order side: Bid (buy) or Offer (sell).
///
/// The boolean form used by simulation code treats `true` as an offer
/// and `false` as a bid; see [`Side::from_is_offer`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Offer,
}

impl Side {
    /// Map the boolean side flag (`true` = offer) onto a `Side`.
    pub fn from_is_offer(is_offer: bool) -> Self {
        if is_offer {
            Side::Offer
        } else {
            Side::Bid
        }
    }

    pub fn is_offer(self) -> bool {
        matches!(self, Side::Offer)
    }

    /// Parse the one-char form used by scenario files (`'B'` / `'O'`,
    /// case-sensitive).
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(Side::Bid),
            'O' => Some(Side::Offer),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_flag_true_is_offer() {
        assert_eq!(Side::from_is_offer(true), Side::Offer);
        assert_eq!(Side::from_is_offer(false), Side::Bid);
        assert!(Side::Offer.is_offer());
        assert!(!Side::Bid.is_offer());
    }

    #[test]
    fn char_form() {
        assert_eq!(Side::from_char('B'), Some(Side::Bid));
        assert_eq!(Side::from_char('O'), Some(Side::Offer));
        assert_eq!(Side::from_char('S'), None);
    }
}
