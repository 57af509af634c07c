use gym_rs::core::{ActionReward, Env};
use gym_rs::envs::classical_control::mountain_car::{MountainCarEnv, MountainCarObservation};
use gym_rs::utils::renderer::RenderMode;
use strum::{FromRepr, VariantArray};

use crate::env::{DiscreteActionSpace, Environment, Step};
use crate::error::{Error, Result};

fn obs2arr(observation: MountainCarObservation) -> Result<[f32; 2]> {
    Vec::from(observation)
        .into_iter()
        .map(|x| x as f32)
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|v: Vec<f32>| {
            Error::Environment(format!("mountain car observation has {} values, expected 2", v.len()))
        })
}

/// Actions for the [`MountainCar`] environment
/// 0 = push left, 1 = no push, 2 = push right
#[derive(FromRepr, VariantArray, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MCAction {
    PushLeft = 0,
    NoPush = 1,
    PushRight = 2,
}

impl From<usize> for MCAction {
    fn from(value: usize) -> Self {
        Self::from_repr(value).unwrap_or(Self::NoPush)
    }
}

impl From<MCAction> for usize {
    fn from(action: MCAction) -> Self {
        action as usize
    }
}

/// The classic Mountain Car task with discrete actions
#[derive(Debug, Clone)]
pub struct MountainCar {
    gym_env: MountainCarEnv,
}

impl MountainCar {
    pub fn new(render_mode: RenderMode) -> Self {
        Self {
            gym_env: MountainCarEnv::new(render_mode),
        }
    }
}

impl Environment for MountainCar {
    type State = [f32; 2]; // [position, velocity]
    type Action = MCAction;

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
        2
    }
}

impl DiscreteActionSpace for MountainCar {
    fn actions(&self) -> Vec<Self::Action> {
        MCAction::VARIANTS.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mountain_car_spaces() {
        let mut env = MountainCar::new(RenderMode::None);
        assert_eq!(env.num_actions(), 3);
        assert_eq!(env.reset().unwrap().len(), env.observation_dim());
    }

    #[test]
    fn mountain_car_action_index() {
        for (i, action) in MCAction::VARIANTS.iter().enumerate() {
            assert_eq!(usize::from(*action), i);
            assert_eq!(MCAction::from(i), *action);
        }
    }

    #[test]
    fn mountain_car_costs_every_step() {
        let mut env = MountainCar::new(RenderMode::None);
        env.reset().unwrap();
        let step = env.step(MCAction::NoPush).unwrap();
        assert_eq!(step.reward, -1.0);
    }
}
