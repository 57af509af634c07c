//! Capability interface between the trial runner and a learning agent
//!
//! The runner only needs an agent that can act, buffer what happened, run an
//! optimisation pass on demand and persist itself. Anything implementing
//! [`Agent`] can be driven by [`crate::trainer::Controller`], including the
//! scripted fakes used in tests.

use crate::env::Environment;
use crate::error::Result;

/// Output of an agent's policy for one observation
#[derive(Clone, Debug, PartialEq)]
pub struct ActionChoice<A> {
    pub action: A,
    /// Log-probability of `action` under the current policy
    pub log_prob: f32,
    /// Value estimate V(s) of the observation
    pub value: f32,
}

/// One environment step as handed to [`Agent::remember`]
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<S, A> {
    pub observation: S,
    pub action: A,
    pub log_prob: f32,
    pub value: f32,
    pub reward: f32,
    pub done: bool,
}

/// Losses reported by a single learning pass
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Losses {
    pub actor: f32,
    pub critic: f32,
    pub total: f32,
}

impl Losses {
    /// Component-wise mean, `None` when no learning pass happened
    pub fn mean(samples: &[Losses]) -> Option<Losses> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f32;
        let sum = samples.iter().fold(Losses::default(), |acc, l| Losses {
            actor: acc.actor + l.actor,
            critic: acc.critic + l.critic,
            total: acc.total + l.total,
        });
        Some(Losses {
            actor: sum.actor / n,
            critic: sum.critic / n,
            total: sum.total / n,
        })
    }
}

/// An agent that can be trained and evaluated step by step
pub trait Agent<E: Environment> {
    /// Sample an action for `observation`
    fn choose_action(&mut self, observation: &E::State) -> Result<ActionChoice<E::Action>>;

    /// Buffer a transition for the next learning pass
    fn remember(&mut self, transition: Transition<E::State, E::Action>);

    /// Run one optimisation pass over the buffered transitions
    fn learn(&mut self) -> Result<Losses>;

    /// Persist the current networks as the "best" checkpoint
    fn save_models(&self) -> Result<()>;

    /// Persist the current networks under an extra tag (the episode index)
    fn save_custom_models(&self, tag: usize) -> Result<()>;

    /// Restore the "best" checkpoint.
    ///
    /// Fails with [`crate::Error::MissingCheckpoint`] when nothing was saved.
    fn load_models(&mut self) -> Result<()>;

    /// Stop buffering and learning; the policy is only queried
    fn eval(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_no_samples_is_absent() {
        assert_eq!(Losses::mean(&[]), None);
    }

    #[test]
    fn mean_is_component_wise() {
        let samples = [
            Losses { actor: 1.0, critic: 2.0, total: 3.0 },
            Losses { actor: 3.0, critic: 4.0, total: 7.0 },
        ];
        assert_eq!(
            Losses::mean(&samples),
            Some(Losses { actor: 2.0, critic: 3.0, total: 5.0 })
        );
    }
}
