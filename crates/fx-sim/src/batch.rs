//! Batches of independent model runs, and the parameter sweeps built on
//! them.
//!
//! Every run owns its own order book and agents; nothing is shared
//! between runs except the read-only quote series. Runs are CPU bound, so
//! each one goes to tokio's blocking pool and the batch collects them
//! through a `JoinSet`.

use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::calibration::TradeProbability;
use crate::error::SimError;
use crate::model::{FxModel, ModelParams};
use crate::settlement::Turnover;
use crate::stats::{mean_by_step, SpreadCorrelation, StepRecord};
use crate::ticks::Quote;

/// Everything a finished run leaves behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run: usize,
    pub seed: u64,
    pub turnover: Turnover,
    pub records: Vec<StepRecord>,
}

/// Seed of run `run` of a batch started from `base`.
pub fn run_seed(base: u64, run: usize) -> u64 {
    base.wrapping_add((run as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Build and run one model to the end of the quote series.
pub fn run_model(
    run: usize,
    params: ModelParams,
    quotes: Arc<Vec<Quote>>,
    probability: TradeProbability,
) -> Result<RunResult, SimError> {
    let mut model = FxModel::new(params, quotes, probability)?;
    model.run()?;
    let turnover = *model.turnover();
    debug!(run, trades = turnover.trades, "run finished");

    Ok(RunResult {
        run,
        seed: params.seed,
        turnover,
        records: model.into_records(),
    })
}

/// Run `runs` models concurrently. Results are ordered by run index.
pub async fn batch_run(
    params: ModelParams,
    quotes: Arc<Vec<Quote>>,
    probability: TradeProbability,
    runs: usize,
) -> Result<Vec<RunResult>, SimError> {
    info!(runs, banks = params.num_banks, traders = params.num_traders, "starting batch");
    run_range(params, &quotes, probability, 0..runs).await
}

/// Like [`batch_run`], but never more runs in flight than the machine
/// has cores. Seeds match [`batch_run`] for the same run index.
pub async fn batch_run_chunked(
    params: ModelParams,
    quotes: Arc<Vec<Quote>>,
    probability: TradeProbability,
    runs: usize,
) -> Result<Vec<RunResult>, SimError> {
    let width = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    info!(runs, width, "starting chunked batch");

    let mut results = Vec::with_capacity(runs);
    let mut start = 0;
    while start < runs {
        let end = (start + width).min(runs);
        results.extend(run_range(params, &quotes, probability, start..end).await?);
        info!(runs_left = runs - end, "chunk finished");
        start = end;
    }
    Ok(results)
}

async fn run_range(
    params: ModelParams,
    quotes: &Arc<Vec<Quote>>,
    probability: TradeProbability,
    runs: Range<usize>,
) -> Result<Vec<RunResult>, SimError> {
    let mut set = JoinSet::new();

    for run in runs.clone() {
        let quotes = Arc::clone(quotes);
        let params = ModelParams {
            seed: run_seed(params.seed, run),
            ..params
        };
        set.spawn_blocking(move || run_model(run, params, quotes, probability));
    }

    let mut results = Vec::with_capacity(runs.len());
    while let Some(joined) = set.join_next().await {
        results.push(joined??);
    }
    results.sort_by_key(|r| r.run);
    Ok(results)
}

/// Spread correlation of the step-wise mean over a set of runs.
pub fn batch_correlation(results: &[RunResult]) -> SpreadCorrelation {
    let runs: Vec<Vec<StepRecord>> = results.iter().map(|r| r.records.clone()).collect();
    SpreadCorrelation::from_records(&mean_by_step(&runs))
}

/// One point of a bank or trader sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub value: usize,
    pub correlation: SpreadCorrelation,
}

/// Five evenly spaced values up to `max`, or every value when `max < 5`.
pub fn sweep_values(max: usize) -> Vec<usize> {
    let step = (max / 5).max(1);
    (step..=max).step_by(step).collect()
}

/// Correlation with spread as the number of banks grows.
pub async fn tune_banks(
    params: ModelParams,
    quotes: Arc<Vec<Quote>>,
    probability: TradeProbability,
    max_banks: usize,
    runs: usize,
) -> Result<Vec<SweepPoint>, SimError> {
    let mut points = Vec::new();
    for banks in sweep_values(max_banks) {
        let p = ModelParams {
            num_banks: banks,
            ..params
        };
        let results = batch_run(p, Arc::clone(&quotes), probability, runs).await?;
        points.push(SweepPoint {
            value: banks,
            correlation: batch_correlation(&results),
        });
    }
    Ok(points)
}

/// Correlation with spread as the number of traders per bank grows.
pub async fn tune_traders(
    params: ModelParams,
    quotes: Arc<Vec<Quote>>,
    probability: TradeProbability,
    max_traders: usize,
    runs: usize,
) -> Result<Vec<SweepPoint>, SimError> {
    let mut points = Vec::new();
    for traders in sweep_values(max_traders) {
        let p = ModelParams {
            num_traders: traders,
            ..params
        };
        let results = batch_run(p, Arc::clone(&quotes), probability, runs).await?;
        points.push(SweepPoint {
            value: traders,
            correlation: batch_correlation(&results),
        });
    }
    Ok(points)
}

/// How the correlation settles as more runs are averaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunsSweep {
    /// Entry `i` averages the first `i + 1` runs.
    pub points: Vec<SpreadCorrelation>,
    pub trades_range: Option<f64>,
    pub eur_volume_range: Option<f64>,
    pub usd_volume_range: Option<f64>,
}

impl RunsSweep {
    pub fn from_results(results: &[RunResult]) -> Self {
        let points: Vec<SpreadCorrelation> = (1..=results.len())
            .map(|i| batch_correlation(&results[..i]))
            .collect();

        RunsSweep {
            trades_range: correlation_range(points.iter().map(|c| c.trades)),
            eur_volume_range: correlation_range(points.iter().map(|c| c.eur_volume)),
            usd_volume_range: correlation_range(points.iter().map(|c| c.usd_volume)),
            points,
        }
    }
}

/// Correlation with spread over a growing number of runs.
pub async fn tune_runs(
    params: ModelParams,
    quotes: Arc<Vec<Quote>>,
    probability: TradeProbability,
    runs: usize,
) -> Result<RunsSweep, SimError> {
    let results = batch_run_chunked(params, quotes, probability, runs).await?;
    let sweep = RunsSweep::from_results(&results);
    info!(
        trades = ?sweep.trades_range,
        eur_volume = ?sweep.eur_volume_range,
        usd_volume = ?sweep.usd_volume_range,
        "correlation range over runs"
    );
    Ok(sweep)
}

/// `|min| - |max|` of the defined values.
fn correlation_range<I>(values: I) -> Option<f64>
where
    I: Iterator<Item = Option<f64>>,
{
    let defined: Vec<f64> = values.flatten().collect();
    let min = defined.iter().copied().reduce(f64::min)?;
    let max = defined.iter().copied().reduce(f64::max)?;
    Some(min.abs() - max.abs())
}
