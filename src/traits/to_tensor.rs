use burn::{
    prelude::*,
    tensor::{backend::Backend, BasicOps, Element, TensorData},
};

/// Conversion of a batch of observations into a tensor.
///
/// Implemented for `Vec<[E; N]>`, which is how every fixed-size observation
/// in [`crate::gym`] is batched.
pub trait ToTensor<B: Backend, const D: usize, K: BasicOps<B>> {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, D, K>;
}

/// `[batch, N]` from a batch of `N`-element observations
impl<B, E, K, const N: usize> ToTensor<B, 2, K> for Vec<[E; N]>
where
    B: Backend,
    E: Element,
    K: BasicOps<B, Elem = E>,
{
    #[inline]
    fn to_tensor(self, device: &B::Device) -> Tensor<B, 2, K> {
        let batch = self.len();
        let mut flat = Vec::with_capacity(batch * N);
        for row in &self {
            flat.extend_from_slice(row);
        }
        Tensor::<B, 2, K>::from_data(TensorData::new(flat, [batch, N]), device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn cartpole_batch_to_2d() {
        let device = NdArrayDevice::default();
        let states = vec![[0.0_f32, 0.1, 0.2, 0.3], [1.0, 1.1, 1.2, 1.3]];

        let tensor: Tensor<NdArray, 2> = states.to_tensor(&device);

        assert_eq!(tensor.shape().dims, [2, 4]);
        assert_eq!(
            tensor.to_data().as_slice::<f32>().unwrap(),
            &[0.0, 0.1, 0.2, 0.3, 1.0, 1.1, 1.2, 1.3]
        );
    }

    #[test]
    fn single_observation_keeps_batch_axis() {
        let device = NdArrayDevice::default();
        let tensor: Tensor<NdArray, 2> = vec![[1.0_f32, 2.0]].to_tensor(&device);

        assert_eq!(tensor.shape().dims, [1, 2]);
    }
}
