//! Configuration for simulation runs.
//!
//! Values are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. environment variables
//! 4. command line flags (applied by the binary)
//!
//! Recognised environment variables:
//!
//! - `FX_SIM_NUM_BANKS`   (default: 10)
//! - `FX_SIM_NUM_TRADERS` (default: 5, per bank)
//! - `FX_SIM_NUM_RUNS`    (default: 10)
//! - `FX_SIM_SEED`        (default: 42)
//! - `FX_SIM_CLEAR_EVERY` (default: unset, never clear)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use cda_core::Pairing;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::ticks::Bucket;

/// Simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub num_banks: usize,

    /// Traders per bank.
    pub num_traders: usize,

    /// Independent model instances per batch.
    pub num_runs: usize,

    /// Tick file the trade probability is fitted on.
    pub training_data: Option<PathBuf>,

    /// Tick file that drives the quotes of a run.
    pub running_data: Option<PathBuf>,

    /// Bucket width of the running data; one bucket per model step.
    pub bucket: Bucket,

    pub pairing: Pairing,

    /// Empty the order book every this many steps.
    pub clear_every: Option<usize>,

    /// Base seed; run `i` of a batch derives its own seed from it.
    pub seed: u64,

    /// Where JSON reports go; stdout when unset.
    pub output: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            num_banks: 10,
            num_traders: 5,
            num_runs: 10,
            training_data: None,
            running_data: None,
            bucket: Bucket::Hour,
            pairing: Pairing::Tail,
            clear_every: None,
            seed: 42,
            output: None,
        }
    }
}

impl SimConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, SimError> {
        toml::from_str(s).map_err(|e| SimError::Config(e.to_string()))
    }

    /// Defaults, then the TOML file (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SimError> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| SimError::Open {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => SimConfig::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `FX_SIM_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), SimError> {
        self.num_banks = read_env_or_default("FX_SIM_NUM_BANKS", self.num_banks)?;
        self.num_traders = read_env_or_default("FX_SIM_NUM_TRADERS", self.num_traders)?;
        self.num_runs = read_env_or_default("FX_SIM_NUM_RUNS", self.num_runs)?;
        self.seed = read_env_or_default("FX_SIM_SEED", self.seed)?;
        if let Ok(val) = env::var("FX_SIM_CLEAR_EVERY") {
            self.clear_every = Some(parse_env("FX_SIM_CLEAR_EVERY", &val)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.num_banks == 0 {
            return Err(SimError::Config("num_banks must be at least 1".to_string()));
        }
        if self.num_runs == 0 {
            return Err(SimError::Config("num_runs must be at least 1".to_string()));
        }
        if self.clear_every == Some(0) {
            return Err(SimError::Config("clear_every must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The per-model part of the configuration.
    pub fn model_params(&self) -> crate::model::ModelParams {
        crate::model::ModelParams {
            num_banks: self.num_banks,
            num_traders: self.num_traders,
            pairing: self.pairing,
            clear_every: self.clear_every,
            seed: self.seed,
        }
    }
}

/// Command line form of [`Pairing`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum PairingArg {
    /// Worst-priced bid against worst-priced offer
    Tail,
    /// Best-priced bid against best-priced offer
    Head,
}

impl From<PairingArg> for Pairing {
    fn from(arg: PairingArg) -> Self {
        match arg {
            PairingArg::Tail => Pairing::Tail,
            PairingArg::Head => Pairing::Head,
        }
    }
}

fn read_env_or_default<T>(key: &str, default: T) -> Result<T, SimError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => parse_env(key, &val),
        Err(_) => Ok(default),
    }
}

fn parse_env<T>(key: &str, val: &str) -> Result<T, SimError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    val.trim()
        .parse::<T>()
        .map_err(|e| SimError::Config(format!("{key}={val:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SimConfig::default();
        assert_eq!(config.num_banks, 10);
        assert_eq!(config.num_traders, 5);
        assert_eq!(config.num_runs, 10);
        assert_eq!(config.bucket, Bucket::Hour);
        assert_eq!(config.pairing, Pairing::Tail);
        assert_eq!(config.clear_every, None);
        assert_eq!(config.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_overrides_only_what_it_names() {
        let config = SimConfig::from_toml_str(
            r#"
            num_banks = 3
            bucket = "six-hour"
            pairing = "head"
            clear_every = 24
            running_data = "data/2021.csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.num_banks, 3);
        assert_eq!(config.num_traders, 5);
        assert_eq!(config.bucket, Bucket::SixHour);
        assert_eq!(config.pairing, Pairing::Head);
        assert_eq!(config.clear_every, Some(24));
        assert_eq!(config.running_data, Some(PathBuf::from("data/2021.csv")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SimConfig::from_toml_str("num_bankz = 3").unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn validate_rejects_empty_models() {
        let mut config = SimConfig::default();
        config.num_banks = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.clear_every = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_values_must_parse() {
        let err = parse_env::<usize>("FX_SIM_NUM_BANKS", "ten").unwrap_err();
        assert!(err.to_string().contains("FX_SIM_NUM_BANKS"));
        assert_eq!(parse_env::<u64>("FX_SIM_SEED", " 7 ").unwrap(), 7);
    }

    #[test]
    fn pairing_arg_maps_onto_the_book_setting() {
        assert_eq!(Pairing::from(PairingArg::Tail), Pairing::Tail);
        assert_eq!(Pairing::from(PairingArg::Head), Pairing::Head);
    }
}
