//! Error type shared by the environment, agent, controller and recorder.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort an experiment run.
///
/// Nothing in the control loop retries: every variant propagates to the
/// caller and terminates the run.
#[derive(Debug, Error)]
pub enum Error {
    /// Evaluation was requested but nothing was persisted in the checkpoint directory.
    #[error("no checkpoint found at {}", .0.display())]
    MissingCheckpoint(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("agent failure: {0}")]
    Agent(String),

    #[error("environment failure: {0}")]
    Environment(String),

    #[error("checkpoint failure: {0}")]
    Checkpoint(String),

    #[error("malformed result table {}: {reason}", .path.display())]
    MalformedTable { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
