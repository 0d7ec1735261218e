use crate::models::row::EmailColumn;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tokio::task::JoinError;

/// Faults that stop a run.
///
/// Per-row problems never surface here; they become rows with status
/// `Error` in the rejected table.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("input is unreadable: {0}")]
    Input(#[source] csv::Error),

    #[error("email column {0} not found in the input header")]
    MissingEmailColumn(EmailColumn),

    #[error("cannot write output: {0}")]
    Output(#[source] csv::Error),

    #[error("cannot flush output: {0}")]
    OutputIo(#[source] io::Error),

    #[error("pipeline task failed: {0}")]
    Task(#[from] JoinError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
