//! Tensor functions shared by the metrics.

pub mod filter;
pub mod noise;

pub use crate::error::Error;
pub use burn::tensor::{
    backend::Backend, ElementConversion, Int, Tensor, TensorData,
};
pub use filter::*;
pub use noise::*;

/// Uploading host values as a float tensor of the backend element type.
pub fn float_tensor<B: Backend, const D: usize>(
    values: &[f64],
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    let values = values
        .iter()
        .map(|value| value.elem::<B::FloatElem>())
        .collect::<Vec<_>>();
    Tensor::from_data(TensorData::new(values, shape), device)
}

/// Uploading host indices as a 1D int tensor of the backend element type.
pub fn int_tensor<B: Backend>(
    indices: &[i64],
    device: &B::Device,
) -> Tensor<B, 1, Int> {
    let values = indices
        .iter()
        .map(|index| index.elem::<B::IntElem>())
        .collect::<Vec<_>>();
    Tensor::from_data(TensorData::new(values, [indices.len()]), device)
}

/// Reading every value of the tensor back to the host.
pub fn host_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f64> {
    tensor.into_data().iter::<f64>().collect()
}
