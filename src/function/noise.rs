//! Gaussian noise with an exact mean square.

pub use super::*;
pub use burn::tensor::Distribution;

/// Adding Gaussian noise whose mean square matches `noise_mse` exactly.
///
/// ## Arguments
///
/// * `input` - The images with shape `[N, C, H, W]`.
/// * `noise_mse` - The `K` noise levels, one per image.
///
/// ## Returns
///
/// The noisy images with shape `[max(N, K), C, H, W]`.
///
/// ## Details
///
/// * `N` and `K` should be equal, or one of them should be `1`.
/// * The noise is drawn independently for every output image.
/// * The spatial mean of `(output - input) ^ 2` equals the noise level
///   for each image and channel.
pub fn add_noise<B: Backend>(
    input: Tensor<B, 4>,
    noise_mse: &[f64],
) -> Result<Tensor<B, 4>, Error> {
    let [n, c, h, w] = input.dims();
    let k = noise_mse.len();
    let batch_size = match (n, k) {
        (n, k) if n == k => n,
        (1, k) => k,
        (n, 1) => n,
        (n, k) => return Err(Error::MismatchedBatchSize(n, k)),
    };
    let device = input.device();
    let shape = [batch_size, c, h, w];

    // e ~ N(0, 1)[N', C, H, W]
    let noise =
        Tensor::<B, 4>::random(shape, Distribution::Normal(0.0, 1.0), &device);
    // e' = e - mean(e)
    let noise_mean = noise.to_owned().mean().into_scalar().elem::<f64>();
    let noise = noise.sub_scalar(noise_mean);
    // l[N', 1, 1, 1]
    let levels = float_tensor::<B, 4>(noise_mse, [k, 1, 1, 1], &device)
        .expand([batch_size, c, 1, 1]);
    // s[N', C, 1, 1] = sqrt(l / mean(e' ^ 2))
    let scales = levels
        .div(noise.to_owned().powf_scalar(2.0).mean_dim(3).mean_dim(2))
        .sqrt()
        .expand(shape);

    Ok(input.expand(shape) + noise * scales)
}
