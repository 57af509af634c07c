pub mod agent;
pub mod to_tensor;

pub use agent::{ActionChoice, Agent, Losses, Transition};
pub use to_tensor::ToTensor;
