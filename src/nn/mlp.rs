//! Multi-layer perceptron used for the PPO actor and critic

use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::{activation::relu, backend::Backend},
};

/// Configuration for [`MLP`]
#[derive(Config, Debug)]
pub struct MLPConfig {
    pub input_dim: usize,
    /// Hidden layer widths, e.g. `[256, 256]`
    pub hidden_layers: Vec<usize>,
    pub output_dim: usize,
}

/// Feed-forward network: ReLU on hidden layers, linear output
#[derive(Module, Debug)]
pub struct MLP<B: Backend> {
    layers: Vec<Linear<B>>,
}

impl MLPConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MLP<B> {
        let widths: Vec<usize> = std::iter::once(self.input_dim)
            .chain(self.hidden_layers.iter().copied())
            .chain(std::iter::once(self.output_dim))
            .collect();

        let layers = widths
            .windows(2)
            .map(|pair| LinearConfig::new(pair[0], pair[1]).init(device))
            .collect();

        MLP { layers }
    }
}

impl<B: Backend> MLP<B> {
    /// Forward pass over any tensor rank; the last dimension holds the features.
    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let last = self.layers.len() - 1;
        self.layers
            .iter()
            .enumerate()
            .fold(input, |x, (i, layer)| {
                let x = layer.forward(x);
                if i < last {
                    relu(x)
                } else {
                    x
                }
            })
    }
}
