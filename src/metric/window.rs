//! Local statistics weighted by a normalized window.

pub use super::*;

use crate::function::{float_tensor, host_values};
use burn::tensor::{module::conv2d, ops::ConvOptions};

/// The local statistics of two image batches.
///
/// ## Details
///
/// Every tensor has the shape `[N, C, H - w + 1, W - w + 1]`,
/// where `w` is the window size.
#[derive(Clone, Debug)]
pub struct LocalStatistics<B: Backend> {
    /// `(m0, m1)`
    pub mean: (Tensor<B, 4>, Tensor<B, 4>),
    /// `(s0^2, s1^2)`
    pub variance: (Tensor<B, 4>, Tensor<B, 4>),
    /// `s_01`
    pub covariance: Tensor<B, 4>,
}

/// Computing local means, variances and covariance with a window
/// of shape `[C, 1, w, w]`.
///
/// ## Details
///
/// - The convolution is grouped per channel and has no padding.
/// - Each channel of the window sums to `1`.
#[derive(Clone, Debug)]
pub struct WindowedStatistics<B: Backend> {
    /// The window with shape `[C, 1, w, w]`.
    pub window: Tensor<B, 4>,
}

/// The 1D Gaussian of `size` centered at `size / 2`, unnormalized.
pub fn gaussian(
    size: usize,
    std: f64,
) -> Vec<f64> {
    let center = (size / 2) as f64;
    let std2_2 = 2.0 * std * std;
    (0..size)
        .map(|x| (-(x as f64 - center).powi(2) / std2_2).exp())
        .collect()
}

/// The 2D Gaussian window with shape `[C, 1, size, size]`.
///
/// Each channel sums to `1`.
pub fn create_window<B: Backend>(
    size: usize,
    std: f64,
    channel_count: usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    let gauss = gaussian(size, std);
    let sum = gauss.iter().sum::<f64>();
    // w[i, j] = g[i] * g[j] / sum(g) ^ 2
    let values = gauss
        .iter()
        .flat_map(|g_i| gauss.iter().map(move |g_j| g_i * g_j / (sum * sum)))
        .collect::<Vec<_>>();

    float_tensor::<B, 4>(&values, [1, 1, size, size], device).expand([
        channel_count,
        1,
        size,
        size,
    ])
}

impl<B: Backend> WindowedStatistics<B> {
    /// Initialize with the Gaussian window.
    pub fn init(
        size: usize,
        std: f64,
        channel_count: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            window: create_window(size, std, channel_count, device),
        }
    }

    /// Initialize with a custom window of shape `[C, 1, w, w]`.
    ///
    /// ## Returns
    ///
    /// The statistics and an advisory if the window had to be normalized.
    ///
    /// ## Details
    ///
    /// A window whose channels do not sum to `1` is normalized, not rejected.
    pub fn init_with_window<const D: usize>(
        window: Tensor<B, D>
    ) -> Result<(Self, Option<Advisory>), Error> {
        const TOLERANCE: f64 = 1e-5;

        let dims = window.dims();
        let shape: [usize; 4] = dims
            .as_slice()
            .try_into()
            .map_err(|_| Error::MalformedWindow(dims.to_vec()))?;
        let window = window.reshape(shape);

        // sum(w)[C, 1, 1, 1]
        let sums = window.to_owned().sum_dim(3).sum_dim(2);
        let sums_host = host_values(sums.to_owned());
        let advisory = sums_host
            .iter()
            .any(|sum| (sum - 1.0).abs() > TOLERANCE)
            .then(|| Advisory::WindowNormalization(sums_host));

        let window = match &advisory {
            Some(advisory) => {
                advisory.log("perceptual_metric::metric::window");
                window.div(sums.expand(shape))
            },
            None => window,
        };

        Ok((Self { window }, advisory))
    }

    /// The window size `w`.
    #[inline]
    pub fn size(&self) -> usize {
        self.window.dims()[3]
    }

    /// Computing the local statistics of the inputs.
    ///
    /// ## Arguments
    ///
    /// * `input_0` - The images with shape `[N, C, H, W]`.
    /// * `input_1` - The images with shape `[N, C, H, W]`.
    pub fn forward(
        &self,
        input_0: Tensor<B, 4>,
        input_1: Tensor<B, 4>,
    ) -> Result<LocalStatistics<B>, Error> {
        let dims = (input_0.dims(), input_1.dims());
        let window_dims = self.window.dims();
        if dims.0 != dims.1 {
            return Err(Error::MismatchedShape(dims.0.to_vec(), dims.1.to_vec()));
        }
        if dims.0[1] != window_dims[0] || dims.0[2..].iter().any(|d| *d < window_dims[3]) {
            return Err(Error::MismatchedShape(
                dims.0.to_vec(),
                window_dims.to_vec(),
            ));
        }

        // F(x) = sum(window * x)
        let options = ConvOptions::new([1, 1], [0, 0], [1, 1], window_dims[0]);
        let filter =
            |x: Tensor<B, 4>| conv2d(x, self.window.to_owned(), None, options.to_owned());

        let input = (input_0, input_1);
        // m0 = F(x0)
        // m1 = F(x1)
        let mean = (
            filter(input.0.to_owned()),
            filter(input.1.to_owned()),
        );
        // s0^2 = F(x0^2) - m0^2
        // s1^2 = F(x1^2) - m1^2
        let variance = (
            filter(input.0.to_owned() * input.0.to_owned())
                .sub(mean.0.to_owned().powf_scalar(2.0)),
            filter(input.1.to_owned() * input.1.to_owned())
                .sub(mean.1.to_owned().powf_scalar(2.0)),
        );
        // s_01 = F(x0 * x1) - m0 * m1
        let covariance =
            filter(input.0 * input.1).sub(mean.0.to_owned() * mean.1.to_owned());

        Ok(LocalStatistics {
            mean,
            variance,
            covariance,
        })
    }
}
