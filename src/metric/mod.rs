//! Perceptual distances and similarities between image batches.

pub mod model;
pub mod mse;
pub mod nlpd;
pub mod nspd;
pub mod ssim;
pub mod window;

pub use crate::{
    error::{Advisory, Error},
    range::DynamicRange,
};
pub use burn::tensor::{backend::Backend, Tensor};
pub use model::*;
pub use mse::*;
pub use nlpd::*;
pub use nspd::*;
pub use ssim::*;
pub use window::*;

/// Stabilizing the gradient of the square root around zero.
pub const RMS_EPSILON: f64 = 1e-10;

/// A comparison of two image batches with an output of `D` dimensions.
pub trait Metric<B: Backend, const D: usize> {
    /// Evaluate the value against the target.
    ///
    /// ## Arguments
    ///
    /// * `value` - The images with shape `[N, C, H, W]`.
    /// * `target` - The images with shape `[N', C, H, W]`.
    ///
    /// ## Details
    ///
    /// `N` and `N'` should be equal, or one of them should be `1`.
    fn evaluate(
        &self,
        value: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> Result<Tensor<B, D>, Error>;
}

/// Checking the shapes of two image batches and broadcasting the batch axis.
///
/// ## Returns
///
/// Both inputs with the shape `[max(N, N'), C, H, W]`.
pub fn broadcast_batch<B: Backend>(
    input_0: Tensor<B, 4>,
    input_1: Tensor<B, 4>,
) -> Result<(Tensor<B, 4>, Tensor<B, 4>), Error> {
    let dims = (input_0.dims(), input_1.dims());

    if dims.0[1..] != dims.1[1..] {
        return Err(Error::MismatchedShape(dims.0.to_vec(), dims.1.to_vec()));
    }

    let batch_size = match (dims.0[0], dims.1[0]) {
        (n_0, n_1) if n_0 == n_1 => n_0,
        (1, n_1) => n_1,
        (n_0, 1) => n_0,
        (n_0, n_1) => return Err(Error::MismatchedBatchSize(n_0, n_1)),
    };
    let [_, c, h, w] = dims.0;
    let shape = [batch_size, c, h, w];

    Ok((input_0.expand(shape), input_1.expand(shape)))
}

/// Splitting the batch axis into two halves.
///
/// It undoes the concatenation `cat([input_0, input_1], 0)`.
pub fn split_batch<B: Backend>(
    input: Tensor<B, 4>,
    batch_size: usize,
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    (
        input.to_owned().slice([0..batch_size]),
        input.slice([batch_size..2 * batch_size]),
    )
}

/// Computing the root mean square error (RMSE) between the inputs:
///
/// `sqrt(mean((input_0 - input_1) ^ 2) + epsilon)`
///
/// ## Returns
///
/// The distance with shape `[1]`.
pub fn root_mean_square_error<B: Backend, const D: usize>(
    input_0: Tensor<B, D>,
    input_1: Tensor<B, D>,
) -> Tensor<B, 1> {
    input_0
        .sub(input_1)
        .powf_scalar(2.0)
        .mean()
        .add_scalar(RMS_EPSILON)
        .sqrt()
}

/// Averaging the distances of the scales or bands.
///
/// ## Returns
///
/// The distance with shape `[1]`.
pub fn mean_of_distances<B: Backend>(
    distances: Vec<Tensor<B, 1>>
) -> Tensor<B, 1> {
    Tensor::cat(distances, 0).mean()
}
