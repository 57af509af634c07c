//! PPO experiment runner
//!
//! Trains (or evaluates) an agent over trials of episodes, learns on a fixed
//! step cadence, checkpoints on improving moving-average scores and exports
//! per-trial scores and losses as CSV.

pub mod algo;
pub mod config;
pub mod env;
pub mod error;
pub mod gym;
pub mod nn;
pub mod trainer;
pub mod traits;

pub use error::{Error, Result};
