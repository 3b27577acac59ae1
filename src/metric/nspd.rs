//! Normalized steerable pyramid distance.

pub use super::*;
pub use burn::config::Config;

use crate::{
    nonlinear::{local_gain_control, rectangular_to_polar_dict},
    pyramid::{Decomposition, SteerablePyramidConfig},
};

/// The configuration of [`NormalizedSteerableDistance`].
#[derive(Config, Copy, Debug, Eq, PartialEq)]
pub struct NormalizedSteerableDistanceConfig {
    /// The order of the steerable pyramid, so there are `order + 1` orientations.
    #[config(default = "1")]
    pub order: usize,

    /// The number of oriented scales.
    #[config(default = "5")]
    pub height: usize,

    /// Whether to compare the amplitude and the phase of analytic bands,
    /// instead of the energy and the direction of real bands.
    #[config(default = "true")]
    pub is_complex: bool,
}

/// Computing the normalized steerable pyramid distance (NSPD) between the inputs.
///
/// ## Details
///
/// - The images are stacked along the batch axis and decomposed
///   by a steerable pyramid tuned to their size.
/// - Each oriented band is split into a normalized part and a state:
///   the amplitude and the phase when complex,
///   the local energy and the direction otherwise.
/// - The distance is the mean RMSE over both parts of every oriented band.
/// - It is experimental and has no learned weights.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedSteerableDistance {
    /// The pyramid settings.
    pub config: NormalizedSteerableDistanceConfig,
}

impl NormalizedSteerableDistanceConfig {
    /// Initialize the metric.
    #[inline]
    pub fn init(&self) -> NormalizedSteerableDistance {
        NormalizedSteerableDistance { config: *self }
    }
}

impl Default for NormalizedSteerableDistanceConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl NormalizedSteerableDistance {
    /// Initialize with the default config.
    #[inline]
    pub fn init() -> Self {
        NormalizedSteerableDistanceConfig::default().init()
    }
}

impl<B: Backend> Metric<B, 1> for NormalizedSteerableDistance {
    /// ## Returns
    ///
    /// The distance with shape `[1]`.
    fn evaluate(
        &self,
        value: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> Result<Tensor<B, 1>, Error> {
        let (value, target) = broadcast_batch(value, target)?;
        let [batch_size, _, h, w] = value.dims();

        if self.config.height == 0 {
            return Err(Error::EmptyPyramid(self.config.height));
        }
        let pyramid = SteerablePyramidConfig::new()
            .with_order(self.config.order)
            .with_height(self.config.height)
            .with_is_complex(self.config.is_complex)
            .init([h, w])?;

        let coefficients = pyramid.decompose(Tensor::cat(vec![value, target], 0))?;
        let (norm, state) = if self.config.is_complex {
            rectangular_to_polar_dict(&coefficients)
        } else {
            local_gain_control(&coefficients)
        };

        let distances = norm
            .into_values()
            .zip(state.into_values())
            .flat_map(|(norm, state)| [norm, state])
            .map(|part| {
                let (part_0, part_1) = split_batch(part, batch_size);
                root_mean_square_error(part_0, part_1)
            })
            .collect();

        Ok(mean_of_distances(distances))
    }
}

/// Computing the normalized steerable pyramid distance (NSPD) with shape `[1]`.
///
/// It relies on [`NormalizedSteerableDistance`].
pub fn nspd<B: Backend>(
    input_0: Tensor<B, 4>,
    input_1: Tensor<B, 4>,
    order: usize,
    height: usize,
    is_complex: bool,
) -> Result<Tensor<B, 1>, Error> {
    NormalizedSteerableDistanceConfig::new()
        .with_order(order)
        .with_height(height)
        .with_is_complex(is_complex)
        .init()
        .evaluate(input_0, input_1)
}
