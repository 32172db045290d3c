//! fx-sim
//!
//! Agent-based EURUSD market driving the `cda-core` order book:
//! - historical tick data and trade-probability calibration
//! - banks and traders, and settlement of CDA matches between them
//! - single runs, concurrent batches and parameter sweeps

pub mod agents;
pub mod batch;
pub mod calibration;
pub mod config;
pub mod error;
pub mod model;
pub mod settlement;
pub mod stats;
pub mod ticks;

pub use config::SimConfig;
pub use error::SimError;
pub use model::{FxModel, ModelParams};
