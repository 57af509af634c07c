//! Environment abstraction consumed by agents and the trial runner.

use crate::error::Result;

/// Outcome of a single environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step<S> {
    /// Observation after the action was applied
    pub observation: S,
    pub reward: f32,
    /// The episode is over; `observation` is terminal
    pub done: bool,
}

/// An episodic environment with a fixed-size observation vector
pub trait Environment {
    type State: Clone;
    type Action: Clone;

    /// Start a new episode and return its first observation
    fn reset(&mut self) -> Result<Self::State>;

    /// Apply `action` and advance the simulation by one step
    fn step(&mut self, action: Self::Action) -> Result<Step<Self::State>>;

    /// Draw the current frame.
    ///
    /// Rendering is best effort: callers log failures and carry on.
    fn render(&mut self) -> Result<()> {
        Ok(())
    }

    /// `(min, max)` reward bounds declared by the environment.
    ///
    /// The minimum seeds the best-score tracker of a trial. Environments that do
    /// not know their bounds keep the unbounded default.
    fn reward_range(&self) -> (f32, f32) {
        (f32::NEG_INFINITY, f32::INFINITY)
    }

    /// Length of the observation vector
    fn observation_dim(&self) -> usize;
}

/// Environments whose actions form a finite, indexable set
pub trait DiscreteActionSpace: Environment {
    fn actions(&self) -> Vec<Self::Action>;

    fn num_actions(&self) -> usize {
        self.actions().len()
    }
}
