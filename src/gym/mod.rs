//! Classic control environments backed by [gym_rs](https://github.com/MathisWellmann/gym-rs)

mod cartpole;
mod mountain_car;

pub use cartpole::{CPAction, CartPole};
pub use mountain_car::{MCAction, MountainCar};
