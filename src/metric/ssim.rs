//! Structural similarity index.

pub use super::*;
pub use burn::config::Config;

/// The configuration of [`StructuralSimilarity`].
#[derive(Config, Copy, Debug, PartialEq)]
pub struct StructuralSimilarityConfig {
    /// The largest window size, capped by the image size.
    #[config(default = "11")]
    pub window_size: usize,

    /// The standard deviation of the Gaussian window.
    #[config(default = "1.5")]
    pub sigma: f64,

    /// Whether to average the map weighted by the local information content.
    #[config(default = "false")]
    pub weighted: bool,

    /// The span of the pixel values, which scales the stabilizing constants.
    #[config(default = "DynamicRange::Unit")]
    pub dynamic_range: DynamicRange,
}

/// Computing the structural similarity index (SSIM) between the inputs
/// using the approaches described in the papers:
///
/// *Wang, Z., Bovik, A. C., Sheikh, H. R., & Simoncelli, E. P. (2004). Image quality assessment: from error visibility to structural similarity. IEEE Transactions on Image Processing, 13(4), 600–612.*
/// https://www.cns.nyu.edu/pub/lcv/wang03-preprint.pdf
///
/// *Wang, Z., & Simoncelli, E. P. (2008). Maximum differentiation (MAD) competition: A methodology for comparing computational models of perceptual discriminability. Journal of Vision, 8(12), 1–13.*
///
/// ## Details
///
/// - The result is a similarity, so `1.0` means identical images.
/// - The window is built per call unless a custom one is given.
#[derive(Clone, Debug)]
pub struct StructuralSimilarity<B: Backend> {
    /// The settings.
    pub config: StructuralSimilarityConfig,
    /// The custom window, if any.
    pub window: Option<WindowedStatistics<B>>,
}

/// The maps of SSIM, each with shape `[N, C, H - w + 1, W - w + 1]`.
#[derive(Clone, Debug)]
pub struct StructuralSimilarityParts<B: Backend> {
    /// `I(x0, x1)`
    pub ssim_map: Tensor<B, 4>,
    /// `CS(x0, x1)`
    pub contrast_map: Tensor<B, 4>,
    /// `W(x0, x1)`
    pub weight: Tensor<B, 4>,
}

impl StructuralSimilarityConfig {
    /// Initialize the metric with the Gaussian window.
    pub fn init<B: Backend>(&self) -> StructuralSimilarity<B> {
        StructuralSimilarity {
            config: *self,
            window: None,
        }
    }
}

impl Default for StructuralSimilarityConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> StructuralSimilarity<B> {
    /// Initialize with the default config.
    #[inline]
    pub fn init() -> Self {
        StructuralSimilarityConfig::default().init()
    }

    /// Replacing the Gaussian window with a custom one of shape `[C, 1, w, w]`.
    ///
    /// ## Details
    ///
    /// A window whose channels do not sum to `1` is normalized with a warning.
    pub fn with_window<const D: usize>(
        mut self,
        window: Tensor<B, D>,
    ) -> Result<Self, Error> {
        let (window, _) = WindowedStatistics::init_with_window(window)?;
        self.window = Some(window);
        Ok(self)
    }

    /// Checking the inputs for conditions that do not stop the computation.
    ///
    /// ## Details
    ///
    /// It reads the extrema of both inputs back from the device.
    pub fn advisories(
        &self,
        input_0: &Tensor<B, 4>,
        input_1: &Tensor<B, 4>,
    ) -> Vec<Advisory> {
        let channel_count = input_0.dims()[1];
        let range = self.config.dynamic_range;

        (channel_count > 1)
            .then_some(Advisory::MultiChannel(channel_count))
            .into_iter()
            .chain(range.check_tensor(input_0))
            .chain(range.check_tensor(input_1))
            .collect()
    }

    /// Computing the SSIM map, the contrast map and the weight map.
    ///
    /// ## Arguments
    ///
    /// * `input_0` - The images with shape `[N, C, H, W]`.
    /// * `input_1` - The images with shape `[N', C, H, W]`.
    pub fn parts(
        &self,
        input_0: Tensor<B, 4>,
        input_1: Tensor<B, 4>,
    ) -> Result<StructuralSimilarityParts<B>, Error> {
        let (input_0, input_1) = broadcast_batch(input_0, input_1)?;
        let [_, c, h, w] = input_0.dims();

        self.advisories(&input_0, &input_1).iter().for_each(|advisory| {
            advisory.log("perceptual_metric::metric::ssim");
        });

        let statistics = match &self.window {
            Some(statistics) => statistics.to_owned(),
            None => WindowedStatistics::init(
                self.config.window_size.min(h).min(w),
                self.config.sigma,
                c,
                &input_0.device(),
            ),
        };
        let LocalStatistics {
            mean,
            variance,
            covariance,
        } = statistics.forward(input_0, input_1)?;

        let span = self.config.dynamic_range.span();
        let c1 = (0.01 * span) * (0.01 * span);
        let c2 = (0.03 * span) * (0.03 * span);

        // CS(x0, x1) = (2 * s_01 + C2) / (s0^2 + s1^2 + C2)
        let contrast_map = covariance
            .mul_scalar(2.0)
            .add_scalar(c2)
            .div(variance.0.to_owned().add(variance.1.to_owned()).add_scalar(c2));
        // W(x0, x1) = log((1 + s0^2 / C2) * (1 + s1^2 / C2))
        let weight = variance
            .0
            .div_scalar(c2)
            .add_scalar(1.0)
            .mul(variance.1.div_scalar(c2).add_scalar(1.0))
            .log();
        // I(x0, x1) = (2 * m0 * m1 + C1) / (m0^2 + m1^2 + C1) * CS(x0, x1)
        let luminance_map = mean
            .0
            .to_owned()
            .mul(mean.1.to_owned())
            .mul_scalar(2.0)
            .add_scalar(c1)
            .div(
                mean.0
                    .powf_scalar(2.0)
                    .add(mean.1.powf_scalar(2.0))
                    .add_scalar(c1),
            );
        let ssim_map = luminance_map * contrast_map.to_owned();

        Ok(StructuralSimilarityParts {
            ssim_map,
            contrast_map,
            weight,
        })
    }

    /// Computing the SSIM map with shape `[N, C, H - w + 1, W - w + 1]`.
    #[inline]
    pub fn ssim_map(
        &self,
        input_0: Tensor<B, 4>,
        input_1: Tensor<B, 4>,
    ) -> Result<Tensor<B, 4>, Error> {
        Ok(self.parts(input_0, input_1)?.ssim_map)
    }
}

impl<B: Backend> Metric<B, 2> for StructuralSimilarity<B> {
    /// ## Returns
    ///
    /// The mean SSIM of each image and channel with shape `[N, C]`.
    ///
    /// ## Details
    ///
    /// The weighted mean is `sum(I * W) / sum(W)`.
    /// It falls back to the plain mean where `sum(W)` is zero.
    fn evaluate(
        &self,
        value: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> Result<Tensor<B, 2>, Error> {
        let StructuralSimilarityParts {
            ssim_map, weight, ..
        } = self.parts(value, target)?;
        let [n, c, _, _] = ssim_map.dims();

        let score = if self.config.weighted {
            // Flat images have zero weight everywhere
            let weight_sum = weight.to_owned().sum_dim(3).sum_dim(2);
            let is_flat = weight_sum.to_owned().equal_elem(0.0);
            let mean = ssim_map.to_owned().mean_dim(3).mean_dim(2);

            ssim_map
                .mul(weight)
                .sum_dim(3)
                .sum_dim(2)
                .div(weight_sum.mask_fill(is_flat.to_owned(), 1.0))
                .mask_where(is_flat, mean)
        } else {
            ssim_map.mean_dim(3).mean_dim(2)
        };

        Ok(score.reshape([n, c]))
    }
}

/// Computing the mean SSIM with shape `[N, C]`.
///
/// It relies on [`StructuralSimilarity`].
pub fn ssim<B: Backend>(
    input_0: Tensor<B, 4>,
    input_1: Tensor<B, 4>,
    weighted: bool,
    dynamic_range: DynamicRange,
) -> Result<Tensor<B, 2>, Error> {
    StructuralSimilarityConfig::new()
        .with_weighted(weighted)
        .with_dynamic_range(dynamic_range)
        .init()
        .evaluate(input_0, input_1)
}

/// Computing the SSIM map with shape `[N, C, H - w + 1, W - w + 1]`.
///
/// It relies on [`StructuralSimilarity`].
pub fn ssim_map<B: Backend>(
    input_0: Tensor<B, 4>,
    input_1: Tensor<B, 4>,
    dynamic_range: DynamicRange,
) -> Result<Tensor<B, 4>, Error> {
    StructuralSimilarityConfig::new()
        .with_dynamic_range(dynamic_range)
        .init()
        .ssim_map(input_0, input_1)
}

#[cfg(test)]
mod tests {
    #[test]
    fn ssim_identical() {
        use super::*;
        use burn::{backend::NdArray, tensor::Distribution};

        let device = Default::default();

        for range in [DynamicRange::Unit, DynamicRange::Symmetric, DynamicRange::Byte] {
            let (low, high) = range.bounds();
            let input = Tensor::<NdArray, 4>::random(
                [2, 1, 32, 32],
                Distribution::Uniform(low, high),
                &device,
            );

            for weighted in [false, true] {
                let score =
                    super::ssim(input.to_owned(), input.to_owned(), weighted, range)
                        .unwrap();
                assert_eq!(score.dims(), [2, 1]);
                score.into_data().assert_approx_eq(
                    &Tensor::<NdArray, 2>::ones([2, 1], &device).into_data(),
                    4,
                );
            }
        }
    }

    #[test]
    fn ssim_constant() {
        use super::*;
        use burn::backend::{Autodiff, NdArray};

        let device = Default::default();

        for weighted in [false, true] {
            let input_0 =
                Tensor::<Autodiff<NdArray>, 4>::zeros([1, 1, 32, 32], &device)
                    .require_grad();
            let input_1 =
                Tensor::<Autodiff<NdArray>, 4>::zeros([1, 1, 32, 32], &device);

            let score = super::ssim(
                input_0.to_owned(),
                input_1,
                weighted,
                DynamicRange::Unit,
            )
            .unwrap();
            score.to_owned().into_data().assert_approx_eq(
                &Tensor::<NdArray, 2>::ones([1, 1], &device).into_data(),
                4,
            );

            let grads = score.sum().backward();
            let grad = input_0.grad(&grads).unwrap().abs().sum().into_scalar();
            assert!(grad.is_finite(), "{weighted}: {grad}");
        }
    }

    #[test]
    fn ssim_bounds() {
        use super::*;
        use crate::function::host_values;
        use burn::{backend::NdArray, tensor::Distribution};

        let device = Default::default();
        let input_0 = Tensor::<NdArray, 4>::random(
            [4, 1, 24, 24],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let noise = Tensor::<NdArray, 4>::random(
            [4, 1, 24, 24],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let input_1 = input_0.to_owned().mul_scalar(0.7) + noise.mul_scalar(0.3);

        for weighted in [false, true] {
            let score = host_values(
                super::ssim(input_0.to_owned(), input_1.to_owned(), weighted, DynamicRange::Unit)
                    .unwrap(),
            );
            score.iter().for_each(|score| {
                assert!((0.0..=1.0).contains(score), "score: {score}");
                assert!(*score < 1.0 - 1e-3, "score: {score}");
            });
        }
    }

    #[test]
    fn ssim_broadcast() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();

        for size_0 in [1, 2, 3] {
            for size_1 in [1, 2, 3] {
                let input_0 =
                    Tensor::<NdArray, 4>::zeros([size_0, 1, 16, 16], &device);
                let input_1 =
                    Tensor::<NdArray, 4>::ones([size_1, 1, 16, 16], &device);
                let output = super::ssim(input_0, input_1, false, DynamicRange::Unit);

                if size_0 != size_1 && size_0 != 1 && size_1 != 1 {
                    assert!(
                        matches!(output, Err(Error::MismatchedBatchSize(_, _))),
                        "{output:?}"
                    );
                } else {
                    assert_eq!(output.unwrap().dims(), [size_0.max(size_1), 1]);
                }
            }
        }

        let input_0 = Tensor::<NdArray, 4>::zeros([1, 1, 16, 16], &device);
        let input_1 = Tensor::<NdArray, 4>::zeros([1, 1, 16, 15], &device);
        let output = super::ssim(input_0, input_1, false, DynamicRange::Unit);
        assert!(matches!(output, Err(Error::MismatchedShape(_, _))), "{output:?}");
    }

    #[test]
    fn ssim_map_small_image() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();
        let input = Tensor::<NdArray, 4>::ones([1, 1, 8, 6], &device);

        // The window is capped at 6
        let output = super::ssim_map(input.to_owned(), input, DynamicRange::Unit).unwrap();
        assert_eq!(output.dims(), [1, 1, 3, 1]);
    }

    /// The checkerboard `0.5 + 0.25 * (-1) ^ (i + j)` against the constant `0.5`
    /// has closed-form local statistics.
    #[test]
    fn ssim_checkerboard() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();
        const SIZE: usize = 32;

        let checkerboard = (0..SIZE * SIZE)
            .map(|index| {
                let sign = if (index / SIZE + index % SIZE) % 2 == 0 { 1.0 } else { -1.0 };
                0.5 + 0.25 * sign
            })
            .collect::<Vec<_>>();
        let input_0 =
            crate::function::float_tensor::<NdArray, 4>(&checkerboard, [1, 1, SIZE, SIZE], &device);
        let input_1 = Tensor::<NdArray, 4>::ones([1, 1, SIZE, SIZE], &device).mul_scalar(0.5);

        // a = sum(g[i] * (-1) ^ i)
        let gauss = gaussian(11, 1.5);
        let sum = gauss.iter().sum::<f64>();
        let alpha = gauss
            .iter()
            .enumerate()
            .map(|(i, g)| if i % 2 == 0 { g / sum } else { -g / sum })
            .sum::<f64>();
        let c1 = 0.01 * 0.01;
        let c2 = 0.03 * 0.03;
        let variance = 0.0625 * (1.0 - alpha.powi(4));
        let contrast = c2 / (variance + c2);
        let luminance = |mean: f64| (mean + c1) / (mean * mean + 0.25 + c1);
        let alpha2 = alpha * alpha;
        let target =
            contrast * (luminance(0.5 + 0.25 * alpha2) + luminance(0.5 - 0.25 * alpha2)) / 2.0;

        for weighted in [false, true] {
            let output = super::ssim(
                input_0.to_owned(),
                input_1.to_owned(),
                weighted,
                DynamicRange::Unit,
            )
            .unwrap()
            .into_scalar() as f64;
            assert!((output - target).abs() < 1e-5, "{output} != {target}");
        }
    }

    #[test]
    fn ssim_gradient() {
        use super::*;
        use burn::{
            backend::{Autodiff, NdArray},
            tensor::Distribution,
        };

        let device = Default::default();
        let input_0 = Tensor::<Autodiff<NdArray>, 4>::random(
            [1, 1, 16, 16],
            Distribution::Uniform(0.0, 1.0),
            &device,
        )
        .require_grad();
        let input_1 = Tensor::<Autodiff<NdArray>, 4>::random(
            [1, 1, 16, 16],
            Distribution::Uniform(0.0, 1.0),
            &device,
        )
        .require_grad();

        for weighted in [false, true] {
            let grads = super::ssim(
                input_0.to_owned(),
                input_1.to_owned(),
                weighted,
                DynamicRange::Unit,
            )
            .unwrap()
            .sum()
            .backward();

            let grad_0 = input_0.grad(&grads).unwrap();
            let grad_1 = input_1.grad(&grads).unwrap();
            assert_eq!(grad_0.dims(), [1, 1, 16, 16]);
            let grad_0 = grad_0.abs().sum().into_scalar();
            let grad_1 = grad_1.abs().sum().into_scalar();
            assert!(grad_0 > 0.0 && grad_0.is_finite(), "grad_0: {grad_0}");
            assert!(grad_1 > 0.0 && grad_1.is_finite(), "grad_1: {grad_1}");
        }
    }

    #[test]
    fn advisories() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();
        let metric = StructuralSimilarity::<NdArray>::init();

        let input_0 = Tensor::<NdArray, 4>::ones([1, 3, 16, 16], &device);
        let input_1 = Tensor::<NdArray, 4>::ones([1, 3, 16, 16], &device).mul_scalar(2.0);
        let output = metric.advisories(&input_0, &input_1);
        assert_eq!(
            output,
            vec![
                Advisory::MultiChannel(3),
                Advisory::Range {
                    bounds: (0.0, 1.0),
                    observed: (2.0, 2.0),
                },
            ]
        );

        let input = Tensor::<NdArray, 4>::ones([1, 1, 16, 16], &device);
        assert_eq!(metric.advisories(&input, &input), vec![]);
    }

    #[test]
    fn with_window() {
        use super::*;
        use burn::{backend::NdArray, tensor::Distribution};

        let device = Default::default();
        let input_0 = Tensor::<NdArray, 4>::random(
            [1, 1, 16, 16],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let input_1 = Tensor::<NdArray, 4>::random(
            [1, 1, 16, 16],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );

        // An unnormalized window gives the same score as the normalized one
        let window = create_window::<NdArray>(7, 1.5, 1, &device);
        let target = StructuralSimilarity::init()
            .with_window(window.to_owned())
            .unwrap()
            .evaluate(input_0.to_owned(), input_1.to_owned())
            .unwrap();
        let output = StructuralSimilarity::init()
            .with_window(window.mul_scalar(3.0))
            .unwrap()
            .evaluate(input_0.to_owned(), input_1.to_owned())
            .unwrap();
        output.into_data().assert_approx_eq(&target.into_data(), 5);

        let window = Tensor::<NdArray, 3>::ones([1, 7, 7], &device);
        let output = StructuralSimilarity::init().with_window(window);
        assert!(matches!(output, Err(Error::MalformedWindow(_))), "{output:?}");
    }
}
