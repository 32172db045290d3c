//! Per-step records and the statistics built from them.

use cda_core::OrderBook;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::agents::Bank;
use crate::error::SimError;
use crate::settlement::Turnover;
use crate::ticks::{Quote, PIP};

/// What one model step looked like.
///
/// Counts and volumes are the change over the step, not running totals.
/// After [`mean_by_step`] every field is a mean across runs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    /// Mean bank bid.
    pub bid: f64,
    /// Mean bank offer.
    pub offer: f64,
    /// Mean bank spread, in pips.
    pub spread: f64,
    pub trades: f64,
    pub eur_volume: f64,
    pub usd_volume: f64,
    /// Price of the most recent CDA settlement so far.
    pub clearing_price: f64,
    pub efficiency: f64,
    pub resting_bids: usize,
    pub resting_offers: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DataCollector {
    last: Turnover,
    records: Vec<StepRecord>,
}

impl DataCollector {
    pub fn new() -> Self {
        DataCollector::default()
    }

    /// Record the state of the model after `step`.
    ///
    /// With no banks the averages fall back to `opening`.
    pub fn collect(
        &mut self,
        step: usize,
        banks: &[Bank],
        opening: &Quote,
        turnover: &Turnover,
        book: &OrderBook,
    ) -> Result<&StepRecord, SimError> {
        let (bid, offer, spread) = if banks.is_empty() {
            (
                opening.bid,
                opening.offer,
                (opening.offer - opening.bid).abs() / PIP,
            )
        } else {
            let n = banks.len() as f64;
            (
                banks.iter().map(|b| b.bid).sum::<f64>() / n,
                banks.iter().map(|b| b.offer).sum::<f64>() / n,
                banks.iter().map(|b| (b.offer - b.bid).abs()).sum::<f64>() / n / PIP,
            )
        };

        let snapshot = book.snapshot();
        let record = StepRecord {
            step,
            bid,
            offer,
            spread,
            trades: turnover.trades.saturating_sub(self.last.trades) as f64,
            eur_volume: to_f64(turnover.eur_volume - self.last.eur_volume),
            usd_volume: to_f64(turnover.usd_volume - self.last.usd_volume),
            clearing_price: to_f64(turnover.last_clearing_price),
            efficiency: to_f64(book.efficiency()?),
            resting_bids: snapshot.bid_depth,
            resting_offers: snapshot.offer_depth,
        };

        self.last = *turnover;
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<StepRecord> {
        self.records
    }
}

fn to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Average the records of several runs step by step.
///
/// Runs may differ in length; each step is averaged over the runs that
/// reached it.
pub fn mean_by_step(runs: &[Vec<StepRecord>]) -> Vec<StepRecord> {
    let len = runs.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = Vec::with_capacity(len);

    for i in 0..len {
        let rows: Vec<&StepRecord> = runs.iter().filter_map(|r| r.get(i)).collect();
        let n = rows.len() as f64;
        let mean = |f: fn(&StepRecord) -> f64| rows.iter().map(|r| f(r)).sum::<f64>() / n;

        out.push(StepRecord {
            step: rows[0].step,
            bid: mean(|r| r.bid),
            offer: mean(|r| r.offer),
            spread: mean(|r| r.spread),
            trades: mean(|r| r.trades),
            eur_volume: mean(|r| r.eur_volume),
            usd_volume: mean(|r| r.usd_volume),
            clearing_price: mean(|r| r.clearing_price),
            efficiency: mean(|r| r.efficiency),
            resting_bids: (mean(|r| r.resting_bids as f64)).round() as usize,
            resting_offers: (mean(|r| r.resting_offers as f64)).round() as usize,
        });
    }

    out
}

/// Pearson correlation coefficient.
///
/// `None` for fewer than two points, mismatched lengths, or a series
/// with no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

/// Correlation of activity with the mean spread.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpreadCorrelation {
    pub trades: Option<f64>,
    pub eur_volume: Option<f64>,
    pub usd_volume: Option<f64>,
}

impl SpreadCorrelation {
    pub fn from_records(records: &[StepRecord]) -> Self {
        let spread: Vec<f64> = records.iter().map(|r| r.spread).collect();
        let column = |f: fn(&StepRecord) -> f64| records.iter().map(f).collect::<Vec<_>>();

        SpreadCorrelation {
            trades: pearson(&column(|r| r.trades), &spread),
            eur_volume: pearson(&column(|r| r.eur_volume), &spread),
            usd_volume: pearson(&column(|r| r.usd_volume), &spread),
        }
    }
}
