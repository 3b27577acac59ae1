//! Normalized Laplacian pyramid distance.

pub use super::*;
pub use burn::config::Config;

use crate::{
    function::float_tensor,
    pyramid::{Decomposition, LaplacianPyramid, LaplacianPyramidConfig},
};
use burn::tensor::{module::conv2d, ops::ConvOptions};
use std::{path::Path, sync::OnceLock};

/// The spatial pooling filters and the constants of the local gain control,
/// one pair per pyramid level.
///
/// ## Details
///
/// The filters are square with an odd size, so the pooling keeps the size.
#[derive(Config, Debug, PartialEq)]
pub struct NormalizationCoefficients {
    /// `filters[level][row][column]`
    pub filters: Vec<Vec<Vec<f64>>>,
    /// `sigmas[level]`, added to the pooled amplitudes.
    pub sigmas: Vec<f64>,
}

static BUNDLED_COEFFICIENTS: OnceLock<NormalizationCoefficients> = OnceLock::new();

impl NormalizationCoefficients {
    /// The coefficients optimized over natural images, bundled in the crate.
    ///
    /// They are parsed on the first call only.
    pub fn bundled() -> Result<&'static Self, Error> {
        if let Some(coefficients) = BUNDLED_COEFFICIENTS.get() {
            return Ok(coefficients);
        }

        let coefficients = Self::load_binary(include_bytes!(
            "../../data/nlpd_coefficients.json"
        ))?
        .validated()?;

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(
            target: "perceptual_metric::metric::nlpd",
            "bundled > {} levels",
            coefficients.level_count(),
        );

        Ok(BUNDLED_COEFFICIENTS.get_or_init(|| coefficients))
    }

    /// Reading the coefficients from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::load(path)?.validated()
    }

    /// Checking the shapes and the values.
    pub fn validated(self) -> Result<Self, Error> {
        if self.filters.len() != self.sigmas.len() {
            return Err(Error::InvalidCoefficients(format!(
                "{} filters and {} sigmas",
                self.filters.len(),
                self.sigmas.len()
            )));
        }
        if self.filters.is_empty() {
            return Err(Error::InvalidCoefficients("no level".into()));
        }

        for (level, filter) in self.filters.iter().enumerate() {
            let size = filter.len();
            if size % 2 == 0 || filter.iter().any(|row| row.len() != size) {
                return Err(Error::InvalidCoefficients(format!(
                    "the filter {level} should be square with an odd size"
                )));
            }
        }

        let sigma_invalid = self
            .sigmas
            .iter()
            .find(|sigma| !sigma.is_finite() || **sigma <= 0.0);
        if let Some(sigma) = sigma_invalid {
            return Err(Error::InvalidCoefficients(format!(
                "the sigma {sigma} should be positive"
            )));
        }

        Ok(self)
    }

    /// The number of pyramid levels covered.
    #[inline]
    pub fn level_count(&self) -> usize {
        self.sigmas.len()
    }

    /// The filter of the level with shape `[1, 1, k, k]`.
    pub fn filter<B: Backend>(
        &self,
        level: usize,
        device: &B::Device,
    ) -> Tensor<B, 4> {
        let filter = &self.filters[level];
        let size = filter.len();
        let values = filter.concat();
        float_tensor::<B, 4>(&values, [1, 1, size, size], device)
    }
}

/// Computing the normalized Laplacian pyramid distance (NLPD) between the inputs
/// using the approaches described in the paper:
///
/// *Laparra, V., Ballé, J., Berardino, A., & Simoncelli, E. P. (2016). Perceptual image quality assessment using a normalized Laplacian pyramid. Electronic Imaging, 2016(16), 1–6.*
///
/// ## Details
///
/// - Each level `y` of the Laplacian pyramid is divided by
///   `sigma + F(|y|)`, where `F` pools the neighbors.
/// - The distance is the mean of the RMSE of each level,
///   so the coarse levels weigh more per coefficient.
/// - Only single-channel images are supported.
#[derive(Clone, Debug)]
pub struct NormalizedLaplacianDistance {
    /// The pyramid with one level per coefficient pair.
    pub pyramid: LaplacianPyramid,
    /// The validated coefficients.
    pub coefficients: NormalizationCoefficients,
}

impl NormalizedLaplacianDistance {
    /// Initialize with the bundled coefficients.
    pub fn init() -> Result<Self, Error> {
        Self::init_with_coefficients(NormalizationCoefficients::bundled()?.to_owned())
    }

    /// Initialize with the given coefficients.
    ///
    /// ## Errors
    ///
    /// [`Error::InvalidCoefficients`] if they are malformed.
    pub fn init_with_coefficients(
        coefficients: NormalizationCoefficients
    ) -> Result<Self, Error> {
        let coefficients = coefficients.validated()?;
        let pyramid = LaplacianPyramidConfig::new()
            .with_scales(coefficients.level_count())
            .init();

        Ok(Self {
            pyramid,
            coefficients,
        })
    }

    /// Computing the normalized levels of the images.
    ///
    /// ## Arguments
    ///
    /// * `input` - The images with shape `[N, 1, H, W]`.
    ///
    /// ## Returns
    ///
    /// The levels from fine to coarse.
    pub fn normalize<B: Backend>(
        &self,
        input: Tensor<B, 4>,
    ) -> Result<Vec<Tensor<B, 4>>, Error> {
        let channel_count = input.dims()[1];
        if channel_count != 1 {
            return Err(Error::UnsupportedChannelCount(channel_count, 1));
        }

        let device = input.device();
        let levels = self.pyramid.decompose(input)?;

        Ok(levels
            .into_iter()
            .zip(&self.coefficients.sigmas)
            .enumerate()
            .map(|(index, (level, sigma))| {
                let filter = self.coefficients.filter::<B>(index, &device);
                let padding = filter.dims()[3] / 2;
                let options =
                    ConvOptions::new([1, 1], [padding, padding], [1, 1], 1);

                // y' = y / (sigma + F(|y|))
                let energy = conv2d(level.to_owned().abs(), filter, None, options);
                level.div(energy.add_scalar(*sigma))
            })
            .collect())
    }
}

impl<B: Backend> Metric<B, 1> for NormalizedLaplacianDistance {
    /// ## Returns
    ///
    /// The distance with shape `[1]`.
    ///
    /// ## Details
    ///
    /// The images are stacked along the batch axis and decomposed together.
    fn evaluate(
        &self,
        value: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> Result<Tensor<B, 1>, Error> {
        let (value, target) = broadcast_batch(value, target)?;
        let batch_size = value.dims()[0];

        let distances = self
            .normalize(Tensor::cat(vec![value, target], 0))?
            .into_iter()
            .map(|level| {
                let (level_0, level_1) = split_batch(level, batch_size);
                root_mean_square_error(level_0, level_1)
            })
            .collect();

        Ok(mean_of_distances(distances))
    }
}

/// Computing the normalized Laplacian pyramid distance (NLPD) with shape `[1]`.
///
/// It relies on [`NormalizedLaplacianDistance`] with the bundled coefficients.
pub fn nlpd<B: Backend>(
    input_0: Tensor<B, 4>,
    input_1: Tensor<B, 4>,
) -> Result<Tensor<B, 1>, Error> {
    NormalizedLaplacianDistance::init()?.evaluate(input_0, input_1)
}

#[cfg(test)]
mod tests {
    #[test]
    fn bundled() {
        use super::*;

        let coefficients = NormalizationCoefficients::bundled().unwrap();
        assert_eq!(coefficients.level_count(), 6);
        assert!(coefficients.filters.iter().all(|filter| filter.len() == 5));
        assert_eq!(coefficients.sigmas[5], 0.2782);
        assert!(std::ptr::eq(
            coefficients,
            NormalizationCoefficients::bundled().unwrap()
        ));
    }

    #[test]
    fn validated() {
        use super::*;

        let coefficients = NormalizationCoefficients::new(
            vec![vec![vec![1.0; 3]; 3]; 2],
            vec![0.1],
        );
        let output = coefficients.validated();
        assert!(matches!(output, Err(Error::InvalidCoefficients(_))), "{output:?}");

        let coefficients =
            NormalizationCoefficients::new(vec![vec![vec![1.0; 4]; 4]], vec![0.1]);
        let output = coefficients.validated();
        assert!(matches!(output, Err(Error::InvalidCoefficients(_))), "{output:?}");

        let coefficients =
            NormalizationCoefficients::new(vec![vec![vec![1.0; 3]; 3]], vec![0.0]);
        let output = coefficients.validated();
        assert!(matches!(output, Err(Error::InvalidCoefficients(_))), "{output:?}");

        NormalizationCoefficients::new(vec![vec![vec![1.0; 3]; 3]], vec![0.1])
            .validated()
            .unwrap();
    }

    #[test]
    fn from_path() {
        use super::*;

        let path = std::env::temp_dir().join(format!(
            "perceptual-metric-nlpd-{}.json",
            std::process::id()
        ));
        let target = NormalizationCoefficients::new(
            vec![vec![vec![0.0, 0.5, 0.0], vec![0.25, 0.0, 0.25], vec![0.0; 3]]],
            vec![0.5],
        );
        target.save(&path).unwrap();

        let output = NormalizationCoefficients::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(output, target);

        let output = NormalizationCoefficients::from_path(&path);
        assert!(matches!(output, Err(Error::Config(_))), "{output:?}");
    }

    #[test]
    fn nlpd_identical() {
        use super::*;
        use burn::{backend::NdArray, tensor::Distribution};

        let device = Default::default();
        let input = Tensor::<NdArray, 4>::random(
            [1, 1, 64, 64],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let output = nlpd(input.to_owned(), input).unwrap();
        assert_eq!(output.dims(), [1]);
        let output = output.into_scalar();
        assert!(output < 1e-4, "output: {output}");
    }

    #[test]
    fn nlpd_different() {
        use super::*;
        use burn::{backend::NdArray, tensor::Distribution};

        let device = Default::default();
        let input_0 = Tensor::<NdArray, 4>::random(
            [1, 1, 64, 64],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let input_1 = Tensor::<NdArray, 4>::random(
            [1, 1, 64, 64],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let output_01 = nlpd(input_0.to_owned(), input_1.to_owned())
            .unwrap()
            .into_scalar();
        let output_10 = nlpd(input_1, input_0).unwrap().into_scalar();
        assert!(output_01 > 1e-2, "output_01: {output_01}");
        assert!((output_01 - output_10).abs() < 1e-5);
    }

    #[test]
    fn nlpd_batch() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();

        for (size_0, size_1) in [(1, 3), (3, 1), (2, 2), (2, 3)] {
            let input_0 = Tensor::<NdArray, 4>::zeros([size_0, 1, 40, 40], &device);
            let input_1 = Tensor::<NdArray, 4>::ones([size_1, 1, 40, 40], &device);
            let output = nlpd(input_0, input_1);

            if size_0 != size_1 && size_0 != 1 && size_1 != 1 {
                assert!(
                    matches!(output, Err(Error::MismatchedBatchSize(_, _))),
                    "{output:?}"
                );
            } else {
                assert_eq!(output.unwrap().dims(), [1]);
            }
        }
    }

    #[test]
    fn nlpd_invalid() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();

        let input = Tensor::<NdArray, 4>::zeros([1, 3, 64, 64], &device);
        let output = nlpd(input.to_owned(), input);
        assert!(
            matches!(output, Err(Error::UnsupportedChannelCount(3, 1))),
            "{output:?}"
        );

        let input = Tensor::<NdArray, 4>::zeros([1, 1, 16, 16], &device);
        let output = nlpd(input.to_owned(), input);
        assert!(matches!(output, Err(Error::InvalidImageSize(_, _))), "{output:?}");
    }

    #[test]
    fn nlpd_gradient() {
        use super::*;
        use burn::{
            backend::{Autodiff, NdArray},
            tensor::Distribution,
        };

        let device = Default::default();
        let input_0 = Tensor::<Autodiff<NdArray>, 4>::random(
            [1, 1, 48, 48],
            Distribution::Uniform(0.0, 1.0),
            &device,
        )
        .require_grad();
        let input_1 = Tensor::<Autodiff<NdArray>, 4>::random(
            [1, 1, 48, 48],
            Distribution::Uniform(0.0, 1.0),
            &device,
        );

        let grads = nlpd(input_0.to_owned(), input_1).unwrap().backward();
        let grad = input_0.grad(&grads).unwrap();
        assert_eq!(grad.dims(), [1, 1, 48, 48]);

        let grad = grad.abs().sum().into_scalar();
        assert!(grad > 0.0 && grad.is_finite(), "grad: {grad}");
    }
}
