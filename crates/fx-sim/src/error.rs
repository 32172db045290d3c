//! Error types for the simulation crate.

use std::path::PathBuf;

use cda_core::CdaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Read(#[from] std::io::Error),

    /// A tick row that could not be parsed; `line` is 1-based.
    #[error("tick data line {line}: {reason}")]
    TickParse { line: usize, reason: String },

    #[error("not enough data: {0}")]
    EmptyData(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Engine(#[from] CdaError),

    #[error("simulation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
