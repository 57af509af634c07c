use gym_rs::core::{ActionReward, Env};
use gym_rs::envs::classical_control::cartpole::{CartPoleEnv, CartPoleObservation};
use gym_rs::utils::renderer::RenderMode;
use strum::{FromRepr, VariantArray};

use crate::env::{DiscreteActionSpace, Environment, Step};
use crate::error::{Error, Result};

fn obs2arr(observation: CartPoleObservation) -> Result<[f32; 4]> {
    Vec::from(observation)
        .into_iter()
        .map(|x| x as f32)
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|v: Vec<f32>| {
            Error::Environment(format!("cartpole observation has {} values, expected 4", v.len()))
        })
}

/// Actions for the [`CartPole`] environment
/// 0 = push cart left, 1 = push cart right
#[derive(FromRepr, VariantArray, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CPAction {
    Left = 0,
    Right = 1,
}

impl From<usize> for CPAction {
    fn from(value: usize) -> Self {
        Self::from_repr(value).unwrap_or(Self::Left)
    }
}

impl From<CPAction> for usize {
    fn from(action: CPAction) -> Self {
        action as usize
    }
}

/// Cart-pole balancing with two discrete actions.
///
/// Every step the pole stays up is worth +1; the episode ends when the pole
/// falls or the cart leaves the track.
#[derive(Debug, Clone)]
pub struct CartPole {
    gym_env: CartPoleEnv,
}

impl CartPole {
    pub fn new(render_mode: RenderMode) -> Self {
        Self {
            gym_env: CartPoleEnv::new(render_mode),
        }
    }
}

impl Environment for CartPole {
    type State = [f32; 4]; // [x, x_dot, theta, theta_dot]
    type Action = CPAction;

    fn reset(&mut self) -> Result<Self::State> {
        obs2arr(self.gym_env.reset(None, false, None).0)
    }

    fn step(&mut self, action: Self::Action) -> Result<Step<Self::State>> {
        let ActionReward {
            observation,
            reward,
            done,
            ..
        } = self.gym_env.step(usize::from(action));

        Ok(Step {
            observation: obs2arr(observation)?,
            reward: *reward as f32,
            done,
        })
    }

    fn observation_dim(&self) -> usize {
        4
    }
}

impl DiscreteActionSpace for CartPole {
    fn actions(&self) -> Vec<Self::Action> {
        CPAction::VARIANTS.to_vec()
    }
}
