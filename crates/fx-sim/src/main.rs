//! Command line front end for the EURUSD simulation.
//!
//! Every subcommand writes a JSON report to stdout, or to `--output`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use fx_sim::batch::{self, RunResult, RunsSweep, SweepPoint};
use fx_sim::calibration::TradeProbability;
use fx_sim::config::PairingArg;
use fx_sim::stats::{mean_by_step, SpreadCorrelation, StepRecord};
use fx_sim::ticks::{self, Bucket, Quote};
use fx_sim::SimConfig;

#[derive(Parser, Debug)]
#[command(name = "fx-sim")]
#[command(about = "EURUSD agent-based market simulation over a continuous double auction")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Flags that take precedence over the file and the environment.
#[derive(Args, Debug, Default)]
struct Overrides {
    #[arg(long, global = true)]
    banks: Option<usize>,

    /// Traders per bank
    #[arg(long, global = true)]
    traders: Option<usize>,

    #[arg(long, global = true)]
    runs: Option<usize>,

    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Tick file to calibrate the trade probability on
    #[arg(long, global = true)]
    training_data: Option<PathBuf>,

    /// Tick file whose quotes drive each run
    #[arg(long, global = true)]
    running_data: Option<PathBuf>,

    #[arg(long, value_enum, global = true)]
    bucket: Option<Bucket>,

    /// Which end of the sorted book gets paired
    #[arg(long, value_enum, global = true)]
    pairing: Option<PairingArg>,

    /// Empty the order book every N steps
    #[arg(long, global = true)]
    clear_every: Option<usize>,

    /// Write the report here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a batch of models and report per-step statistics
    Run {
        /// Limit concurrent runs to the number of cores
        #[arg(long)]
        chunked: bool,
    },
    /// Fit the trade probability curve and print it
    Calibrate,
    /// Sweep the number of banks up to MAX
    TuneBanks {
        #[arg(long, default_value_t = 30)]
        max: usize,
    },
    /// Sweep the number of traders per bank up to MAX
    TuneTraders {
        #[arg(long, default_value_t = 100)]
        max: usize,
    },
    /// Correlation over a growing number of runs
    TuneRuns,
}

impl Overrides {
    fn apply(self, config: &mut SimConfig) {
        if let Some(v) = self.banks {
            config.num_banks = v;
        }
        if let Some(v) = self.traders {
            config.num_traders = v;
        }
        if let Some(v) = self.runs {
            config.num_runs = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.bucket {
            config.bucket = v;
        }
        if let Some(v) = self.pairing {
            config.pairing = v.into();
        }
        if self.training_data.is_some() {
            config.training_data = self.training_data;
        }
        if self.running_data.is_some() {
            config.running_data = self.running_data;
        }
        if self.clear_every.is_some() {
            config.clear_every = self.clear_every;
        }
        if self.output.is_some() {
            config.output = self.output;
        }
    }
}

#[derive(Serialize)]
struct RunReport<'a> {
    config: &'a SimConfig,
    probability: TradeProbability,
    correlation: SpreadCorrelation,
    mean: Vec<StepRecord>,
    runs: Vec<RunResult>,
}

#[derive(Serialize)]
struct SweepReport<'a> {
    config: &'a SimConfig,
    probability: TradeProbability,
    parameter: &'static str,
    points: Vec<SweepPoint>,
}

#[derive(Serialize)]
struct RunsReport<'a> {
    config: &'a SimConfig,
    probability: TradeProbability,
    sweep: RunsSweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut config = SimConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    cli.overrides.apply(&mut config);
    config.validate()?;

    let probability = calibrate(&config)?;
    let output = config.output.clone();

    match cli.command {
        Command::Calibrate => write_json(&probability, output.as_deref()),
        Command::Run { chunked } => {
            let quotes = running_quotes(&config)?;
            let params = config.model_params();
            let runs = if chunked {
                batch::batch_run_chunked(params, quotes, probability, config.num_runs).await?
            } else {
                batch::batch_run(params, quotes, probability, config.num_runs).await?
            };

            let records: Vec<Vec<StepRecord>> = runs.iter().map(|r| r.records.clone()).collect();
            let mean = mean_by_step(&records);
            let correlation = SpreadCorrelation::from_records(&mean);
            info!(
                runs = runs.len(),
                trades = ?correlation.trades,
                eur_volume = ?correlation.eur_volume,
                usd_volume = ?correlation.usd_volume,
                "correlation with spread"
            );

            let report = RunReport {
                config: &config,
                probability,
                correlation,
                mean,
                runs,
            };
            write_json(&report, output.as_deref())
        }
        Command::TuneBanks { max } => {
            let quotes = running_quotes(&config)?;
            let points = batch::tune_banks(
                config.model_params(),
                quotes,
                probability,
                max,
                config.num_runs,
            )
            .await?;
            let report = SweepReport {
                config: &config,
                probability,
                parameter: "banks",
                points,
            };
            write_json(&report, output.as_deref())
        }
        Command::TuneTraders { max } => {
            let quotes = running_quotes(&config)?;
            let points = batch::tune_traders(
                config.model_params(),
                quotes,
                probability,
                max,
                config.num_runs,
            )
            .await?;
            let report = SweepReport {
                config: &config,
                probability,
                parameter: "traders",
                points,
            };
            write_json(&report, output.as_deref())
        }
        Command::TuneRuns => {
            let quotes = running_quotes(&config)?;
            let sweep =
                batch::tune_runs(config.model_params(), quotes, probability, config.num_runs)
                    .await?;
            let report = RunsReport {
                config: &config,
                probability,
                sweep,
            };
            write_json(&report, output.as_deref())
        }
    }
}

/// Fit on the training data, or trade on every step without it.
fn calibrate(config: &SimConfig) -> Result<TradeProbability> {
    match &config.training_data {
        Some(path) => {
            let quotes = ticks::load_quotes(path, Bucket::SixHour)
                .with_context(|| format!("failed to read training data {}", path.display()))?;
            Ok(TradeProbability::from_quotes(&quotes)?)
        }
        None => {
            warn!("no training data, agents will trade on every step");
            Ok(TradeProbability::default())
        }
    }
}

fn running_quotes(config: &SimConfig) -> Result<Arc<Vec<Quote>>> {
    let path = match &config.running_data {
        Some(path) => path,
        None => bail!("no running data: set running_data in the config or pass --running-data"),
    };
    let quotes = ticks::load_quotes(path, config.bucket)
        .with_context(|| format!("failed to read running data {}", path.display()))?;
    Ok(Arc::new(quotes))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
            info!(path = %path.display(), "report written");
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, value)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use cda_core::Pairing;

    #[test]
    fn parses_run_with_overrides() {
        let cli = Cli::parse_from([
            "fx-sim",
            "run",
            "--banks",
            "4",
            "--pairing",
            "head",
            "--bucket",
            "six-hour",
            "--chunked",
        ]);
        assert!(matches!(cli.command, Command::Run { chunked: true }));

        let mut config = SimConfig::default();
        cli.overrides.apply(&mut config);
        assert_eq!(config.num_banks, 4);
        assert_eq!(config.num_traders, 5);
        assert_eq!(config.pairing, Pairing::Head);
        assert_eq!(config.bucket, Bucket::SixHour);
    }

    #[test]
    fn sweep_defaults() {
        let cli = Cli::parse_from(["fx-sim", "tune-banks"]);
        assert!(matches!(cli.command, Command::TuneBanks { max: 30 }));
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn unknown_pairing_is_rejected() {
        assert!(Cli::try_parse_from(["fx-sim", "run", "--pairing", "middle"]).is_err());

        let cli = Cli::try_parse_from(["fx-sim", "run", "--pairing", "tail"]).unwrap();
        assert_eq!(cli.overrides.pairing, Some(PairingArg::Tail));
    }
}
