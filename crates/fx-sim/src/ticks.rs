//! Historical EURUSD tick data.
//!
//! Input rows follow the HistData tick export:
//!
//! - Monthly files (comma separated):
//!   `YYYYMMDD HHMMSSmmm, bid, offer[, volume]`
//!
//! - Yearly files (semicolon separated):
//!   `YYYYMMDD HHMMSSmmm; bid; offer[; volume]`
//!
//! Timestamps are truncated to the minute. Rows are folded into
//! [`Quote`] buckets (mean bid and mean offer per bucket) while they are
//! read, so a year of ticks never has to sit in memory.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SimError;

/// One pip of EURUSD.
pub const PIP: f64 = 0.0001;

/// Spreads at or above this many pips are dropped from the calibration
/// sample as outliers.
pub const MAX_SAMPLE_SPREAD_PIPS: f64 = 20.0;

/// A single parsed tick row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub time: NaiveDateTime,
    pub bid: f64,
    pub offer: f64,
}

/// Mean bid/offer over one time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub time: NaiveDateTime,
    pub bid: f64,
    pub offer: f64,
}

impl Quote {
    /// `offer - bid`, in pips.
    pub fn spread_pips(&self) -> f64 {
        (self.offer - self.bid) / PIP
    }
}

/// Width of the buckets ticks are averaged over.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    Minute,
    #[default]
    Hour,
    /// Only ticks whose hour is a multiple of six, bucketed to that hour.
    SixHour,
}

impl Bucket {
    /// Bucket key for a tick time, or `None` if this bucketing skips it.
    pub fn key(self, time: NaiveDateTime) -> Option<NaiveDateTime> {
        let hour = time.date().and_hms_opt(time.hour(), 0, 0)?;
        match self {
            Bucket::Minute => Some(time),
            Bucket::Hour => Some(hour),
            Bucket::SixHour if time.hour() % 6 == 0 => Some(hour),
            Bucket::SixHour => None,
        }
    }
}

/// Parse a single tick row.
///
/// Returns `Ok(None)` for blank lines and `#` comments.
pub fn parse_tick_line(line: &str, line_no: usize) -> Result<Option<Tick>, SimError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let delimiter = if trimmed.contains(';') { ';' } else { ',' };
    let tokens = split_and_trim(trimmed, delimiter);
    if tokens.len() < 3 {
        return Err(parse_error(line_no, format!("expected at least 3 fields, got {}", tokens.len())));
    }

    let time = parse_timestamp(&tokens[0]).ok_or_else(|| {
        parse_error(line_no, format!("bad timestamp {:?}", tokens[0]))
    })?;
    let bid = parse_rate(&tokens[1], line_no)?;
    let offer = parse_rate(&tokens[2], line_no)?;

    Ok(Some(Tick { time, bid, offer }))
}

/// Read tick rows and fold them into quotes, ordered by bucket time.
pub fn read_quotes<R: BufRead>(reader: R, bucket: Bucket) -> Result<Vec<Quote>, SimError> {
    // bucket -> (sum bid, sum offer, count)
    let mut buckets: BTreeMap<NaiveDateTime, (f64, f64, u64)> = BTreeMap::new();
    let mut ticks = 0u64;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let tick = match parse_tick_line(&line, idx + 1)? {
            Some(t) => t,
            None => continue,
        };
        ticks += 1;

        if let Some(key) = bucket.key(tick.time) {
            let entry = buckets.entry(key).or_insert((0.0, 0.0, 0));
            entry.0 += tick.bid;
            entry.1 += tick.offer;
            entry.2 += 1;
        }
    }

    debug!(ticks, buckets = buckets.len(), ?bucket, "tick data aggregated");

    Ok(buckets
        .into_iter()
        .map(|(time, (bid, offer, n))| Quote {
            time,
            bid: bid / n as f64,
            offer: offer / n as f64,
        })
        .collect())
}

/// Open a tick file and fold it into quotes.
pub fn load_quotes(path: &Path, bucket: Bucket) -> Result<Vec<Quote>, SimError> {
    let file = File::open(path).map_err(|source| SimError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let quotes = read_quotes(BufReader::new(file), bucket)?;
    info!(path = %path.display(), quotes = quotes.len(), ?bucket, "loaded tick data");
    Ok(quotes)
}

/// Spreads (in pips) of the given quotes, without outliers.
pub fn spread_sample(quotes: &[Quote]) -> Vec<f64> {
    quotes
        .iter()
        .map(Quote::spread_pips)
        .filter(|s| *s < MAX_SAMPLE_SPREAD_PIPS)
        .collect()
}

/// `(spread, spread / max spread)` pairs used to fit the trade
/// probability curve.
pub fn probability_sample(quotes: &[Quote]) -> Result<Vec<(f64, f64)>, SimError> {
    let spreads = spread_sample(quotes);
    let max_spread = spreads.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if spreads.is_empty() || max_spread <= 0.0 {
        return Err(SimError::EmptyData(
            "no positive spreads to build a probability sample from".to_string(),
        ));
    }

    Ok(spreads.into_iter().map(|s| (s, s / max_spread)).collect())
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn split_and_trim(s: &str, delimiter: char) -> Vec<String> {
    s.split(delimiter)
        .map(|tok| tok.trim().to_string())
        .collect()
}

fn parse_error(line: usize, reason: String) -> SimError {
    SimError::TickParse { line, reason }
}

/// `YYYYMMDD HHMM...`, anything past the minutes is ignored.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let (date, time) = s.split_once(' ')?;
    if date.len() != 8 || time.len() < 4 {
        return None;
    }

    let year = date.get(0..4)?.parse::<i32>().ok()?;
    let month = date.get(4..6)?.parse::<u32>().ok()?;
    let day = date.get(6..8)?.parse::<u32>().ok()?;
    let hour = time.get(0..2)?.parse::<u32>().ok()?;
    let minute = time.get(2..4)?.parse::<u32>().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
}

fn parse_rate(s: &str, line_no: usize) -> Result<f64, SimError> {
    let rate = s
        .parse::<f64>()
        .map_err(|e| parse_error(line_no, format!("bad rate {:?}: {}", s, e)))?;
    if !rate.is_finite() {
        return Err(parse_error(line_no, format!("non-finite rate {:?}", s)));
    }
    Ok(rate)
}
