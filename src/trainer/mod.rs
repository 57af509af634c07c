//! Experiment driver: episodes, trials, checkpoint cadence and result export
//!
//! - [`EpisodeRunner`] plays one episode, feeding every transition to the agent
//!   and triggering learning passes on a fixed step cadence.
//! - [`Controller`] runs trials of episodes, tracks the moving average score
//!   and decides when the agent persists itself.
//! - [`ResultRecorder`] writes the per-trial histories as CSV tables.

mod controller;
mod history;
mod recorder;
mod runner;

#[cfg(test)]
mod testing;

pub use controller::{Controller, ControllerConfig, TrialState};
pub use history::{
    moving_average, CheckpointDecision, CheckpointPolicy, ResultBook, TrialHistory,
    AVERAGE_WINDOW, TAG_EVERY,
};
pub use recorder::{read_scores, read_table, LossKind, ResultRecorder, Table};
pub use runner::{EpisodeOutcome, EpisodeRunner, StepCounters, DEFAULT_MAX_STEPS};
