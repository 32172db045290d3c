//! Trade probability as a linear function of the quoted spread.
//!
//! The slope comes from an ordinary least-squares fit, through the
//! origin, of `spread / max_spread` against `spread` on a training year
//! of six-hourly quotes. The curve used by agents is the mirror image:
//! `p(x) = 1 - coef * x`, clamped to `[0, 1]`, so the wider the spread
//! the less likely anyone is to trade.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SimError;
use crate::ticks::{self, Quote};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeProbability {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for TradeProbability {
    /// Uncalibrated: every agent trades on every step.
    fn default() -> Self {
        TradeProbability {
            slope: 0.0,
            intercept: 1.0,
        }
    }
}

impl TradeProbability {
    /// Fit against `(spread, probability)` samples.
    pub fn fit(samples: &[(f64, f64)]) -> Result<Self, SimError> {
        let (sxy, sxx) = samples
            .iter()
            .fold((0.0, 0.0), |(sxy, sxx), (x, y)| (sxy + x * y, sxx + x * x));

        if sxx == 0.0 {
            return Err(SimError::EmptyData(
                "calibration sample has no spread variation".to_string(),
            ));
        }

        Ok(TradeProbability {
            slope: -(sxy / sxx),
            intercept: 1.0,
        })
    }

    /// Fit against six-hourly quotes of a training period.
    pub fn from_quotes(quotes: &[Quote]) -> Result<Self, SimError> {
        let sample = ticks::probability_sample(quotes)?;
        let fitted = Self::fit(&sample)?;
        info!(
            samples = sample.len(),
            slope = fitted.slope,
            intercept = fitted.intercept,
            "trade probability calibrated"
        );
        Ok(fitted)
    }

    /// Probability of trading at the given spread (in pips).
    pub fn probability(&self, spread_pips: f64) -> f64 {
        let p = self.slope * spread_pips + self.intercept;
        if p > 1.0 {
            1.0
        } else if p < 0.0 {
            0.0
        } else {
            p
        }
    }
}
