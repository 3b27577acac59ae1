//! Steerable pyramid in the frequency domain.

pub use super::*;

use crate::function::float_tensor;
use dashmap::DashMap;
use rayon::prelude::*;
use std::{
    f64::consts::{FRAC_PI_2, PI},
    sync::{Arc, OnceLock},
};

/// The configuration of [`SteerablePyramid`].
#[derive(Config, Copy, Debug, Eq, PartialEq)]
pub struct SteerablePyramidConfig {
    /// The order of the angular derivative, so there are `order + 1` orientations.
    #[config(default = "1")]
    pub order: usize,

    /// The number of oriented scales.
    #[config(default = "5")]
    pub height: usize,

    /// Whether the oriented bands are analytic (quadrature pairs).
    #[config(default = "false")]
    pub is_complex: bool,
}

/// Decomposing images into oriented bands at multiple scales, following:
///
/// *Simoncelli, E. P., & Freeman, W. T. (1995). The steerable pyramid: A flexible architecture for multi-scale derivative computation. Proceedings of the International Conference on Image Processing, 3, 444–447.*
///
/// ## Details
///
/// - The pyramid is tuned to one image size.
/// - The masks are computed once per size and configuration, then shared.
#[derive(Clone, Debug)]
pub struct SteerablePyramid {
    /// The settings.
    pub config: SteerablePyramidConfig,
    /// The image size `[H, W]` the pyramid is tuned to.
    pub image_size: [usize; 2],
    plan: Arc<SteerablePlan>,
}

/// The host-side masks of a steerable pyramid.
#[derive(Clone, Debug, PartialEq)]
pub struct SteerablePlan {
    /// The full spectrum size `[H, W]`.
    pub image_size: [usize; 2],
    /// The mask of the highpass residual over the full spectrum.
    pub highpass_mask: Vec<f64>,
    /// The mask applied before the first scale.
    pub lowpass_mask: Vec<f64>,
    /// The masks of each scale, from fine to coarse.
    pub levels: Vec<SteerableLevel>,
}

/// The masks of one scale.
#[derive(Clone, Debug, PartialEq)]
pub struct SteerableLevel {
    /// The spectrum size `[h, w]` of the oriented bands.
    pub size: [usize; 2],
    /// `angle_mask[b] * highpass_mask` for each orientation `b`.
    pub band_masks: Vec<Vec<f64>>,
    /// The start of the cropped spectrum.
    pub crop_start: [usize; 2],
    /// The spectrum size of the next scale.
    pub crop_size: [usize; 2],
    /// The lowpass mask over the cropped spectrum.
    pub lowpass_mask: Vec<f64>,
}

type PlanKey = (usize, usize, usize, usize, bool);

static PLANS: OnceLock<DashMap<PlanKey, Arc<SteerablePlan>>> = OnceLock::new();

/// The highpass transition `cos(pi / 2 * clamp(x, -1, 0))`.
#[inline]
fn radial_highpass(x: f64) -> f64 {
    (FRAC_PI_2 * x.clamp(-1.0, 0.0)).cos()
}

/// The lowpass transition `|sin(pi / 2 * clamp(x, -1, 0))|`.
#[inline]
fn radial_lowpass(x: f64) -> f64 {
    (FRAC_PI_2 * x.clamp(-1.0, 0.0)).sin().abs()
}

/// The maximum height for the image size.
pub fn max_height(image_size: [usize; 2]) -> usize {
    let size = image_size[0].min(image_size[1]).max(1);
    (size.ilog2() as usize).saturating_sub(2)
}

/// The polar frequency grid `(log2(radius), angle)` of the size.
fn polar_grid(size: [usize; 2]) -> (Vec<f64>, Vec<f64>) {
    let [h, w] = size;
    let ramp = |count: usize, index: usize| -1.0 + 2.0 * index as f64 / count as f64;
    let center = [h / 2, w / 2];

    let (mut radius, angle): (Vec<f64>, Vec<f64>) = (0..h * w)
        .map(|index| {
            let y = ramp(h, index / w);
            let x = ramp(w, index % w);
            ((x * x + y * y).sqrt(), y.atan2(x))
        })
        .unzip();

    // The zero radius takes the value of its left neighbor
    if center[1] > 0 {
        let index = center[0] * w + center[1];
        radius[index] = radius[index - 1];
    }

    (radius.into_iter().map(f64::log2).collect(), angle)
}

/// The angular mask of the orientation `band` out of `count`.
fn angle_mask(
    angle: f64,
    band: usize,
    count: usize,
    order: usize,
    is_complex: bool,
) -> f64 {
    let factorial = |n: usize| (1..=n).map(|k| k as f64).product::<f64>();
    // c = 2^(2 * o) * (o!)^2 / (n * (2 * o)!)
    let constant = 4.0_f64.powi(order as i32) * factorial(order).powi(2)
        / (count as f64 * factorial(2 * order));

    let x = angle - PI * band as f64 / count as f64;
    let lobe = x.cos().powi(order as i32);
    if is_complex {
        let x_wrapped = (PI + x).rem_euclid(2.0 * PI) - PI;
        if x_wrapped.abs() < FRAC_PI_2 {
            2.0 * constant.sqrt() * lobe
        } else {
            0.0
        }
    } else {
        constant.sqrt() * lobe
    }
}

impl SteerablePlan {
    /// Computing the masks of the size and configuration.
    pub fn new(
        image_size: [usize; 2],
        config: &SteerablePyramidConfig,
    ) -> Self {
        let count = config.order + 1;
        let (mut log_radius, mut angle) = polar_grid(image_size);

        let highpass_mask = log_radius.iter().map(|r| radial_highpass(*r)).collect();
        let lowpass_mask = log_radius.iter().map(|r| radial_lowpass(*r)).collect();

        let mut size = image_size;
        let levels = (0..config.height)
            .map(|scale| {
                let shift = scale as f64 + 1.0;
                let highpass = log_radius
                    .iter()
                    .map(|r| radial_highpass(r + shift))
                    .collect::<Vec<_>>();
                let band_masks = (0..count)
                    .into_par_iter()
                    .map(|band| {
                        angle
                            .iter()
                            .zip(&highpass)
                            .map(|(angle, highpass)| {
                                angle_mask(*angle, band, count, config.order, config.is_complex)
                                    * highpass
                            })
                            .collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>();

                // The central half of the spectrum
                let crop_size = [size[0].div_ceil(2), size[1].div_ceil(2)];
                let crop_start = [
                    (size[0] + 2) / 2 - (crop_size[0] + 2) / 2,
                    (size[1] + 2) / 2 - (crop_size[1] + 2) / 2,
                ];
                let crop = |values: &[f64]| {
                    (0..crop_size[0] * crop_size[1])
                        .map(|index| {
                            let row = crop_start[0] + index / crop_size[1];
                            let column = crop_start[1] + index % crop_size[1];
                            values[row * size[1] + column]
                        })
                        .collect::<Vec<_>>()
                };
                log_radius = crop(&log_radius);
                angle = crop(&angle);

                let lowpass_mask =
                    log_radius.iter().map(|r| radial_lowpass(r + shift)).collect();

                let level = SteerableLevel {
                    size,
                    band_masks,
                    crop_start,
                    crop_size,
                    lowpass_mask,
                };
                size = crop_size;
                level
            })
            .collect();

        Self {
            image_size,
            highpass_mask,
            lowpass_mask,
            levels,
        }
    }

    /// The shared plan of the size and configuration, built on the first request.
    pub fn get(
        image_size: [usize; 2],
        config: &SteerablePyramidConfig,
    ) -> Arc<Self> {
        let key = (
            image_size[0],
            image_size[1],
            config.order,
            config.height,
            config.is_complex,
        );

        PLANS
            .get_or_init(Default::default)
            .entry(key)
            .or_insert_with(|| {
                #[cfg(all(debug_assertions, not(test)))]
                log::debug!(
                    target: "perceptual_metric::pyramid::steerable",
                    "plan > {key:?}",
                );

                Arc::new(Self::new(image_size, config))
            })
            .value()
            .to_owned()
    }
}

impl SteerablePyramidConfig {
    /// Building the pyramid for images of `[H, W]`.
    ///
    /// ## Details
    ///
    /// The height should not exceed `floor(log2(min(H, W))) - 2`.
    pub fn init(
        &self,
        image_size: [usize; 2],
    ) -> Result<SteerablePyramid, Error> {
        if image_size.contains(&0) {
            return Err(Error::InvalidImageSize(image_size, 1));
        }
        let height_max = max_height(image_size);
        if self.height > height_max {
            return Err(Error::InvalidPyramidHeight(self.height, height_max));
        }

        Ok(SteerablePyramid {
            config: *self,
            image_size,
            plan: SteerablePlan::get(image_size, self),
        })
    }
}

impl Default for SteerablePyramidConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl SteerablePyramid {
    /// The shared masks.
    #[inline]
    pub fn plan(&self) -> &SteerablePlan {
        &self.plan
    }

    /// The number of orientations.
    #[inline]
    pub fn orientation_count(&self) -> usize {
        self.config.order + 1
    }
}

/// Multiplying the spectrum by a real host mask of `[h, w]`.
fn apply_mask<B: Backend>(
    spectrum: &(Tensor<B, 4>, Tensor<B, 4>),
    mask: &[f64],
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let dims = spectrum.0.dims();
    let mask = float_tensor::<B, 4>(mask, [1, 1, dims[2], dims[3]], &spectrum.0.device())
        .expand(dims);
    (
        spectrum.0.to_owned() * mask.to_owned(),
        spectrum.1.to_owned() * mask,
    )
}

impl<B: Backend> Decomposition<B> for SteerablePyramid {
    type Output = Coefficients<B>;

    /// ## Returns
    ///
    /// The residual highpass, `height * (order + 1)` oriented bands
    /// and the residual lowpass.
    ///
    /// ## Details
    ///
    /// Each oriented band has the size of its scale, halved (rounded up)
    /// from the image size at every scale.
    fn decompose(
        &self,
        input: Tensor<B, 4>,
    ) -> Result<Self::Output, Error> {
        let [n, c, h, w] = input.dims();
        if [h, w] != self.image_size {
            return Err(Error::MismatchedShape(
                vec![n, c, h, w],
                vec![n, c, self.image_size[0], self.image_size[1]],
            ));
        }

        let plan = self.plan();
        let mut coefficients = Coefficients::<B>::new();

        let spectrum = dft2(input.to_owned(), input.zeros_like());

        let highpass = apply_mask(&spectrum, &plan.highpass_mask);
        coefficients.insert(
            BandKey::ResidualHighpass,
            Subband::Real(idft2(highpass.0, highpass.1).0),
        );

        let mut lowpass = apply_mask(&spectrum, &plan.lowpass_mask);
        for (scale, level) in plan.levels.iter().enumerate() {
            for (orientation, mask) in level.band_masks.iter().enumerate() {
                let band = apply_mask(&lowpass, mask);
                // B = (-i)^o * L * A * H
                let band = match self.config.order % 4 {
                    0 => band,
                    1 => (band.1, band.0.neg()),
                    2 => (band.0.neg(), band.1.neg()),
                    _ => (band.1.neg(), band.0),
                };
                let band = idft2(band.0, band.1);

                let subband = if self.config.is_complex {
                    Subband::Complex(band.0, band.1)
                } else {
                    Subband::Real(band.0)
                };
                coefficients.insert(BandKey::Band { scale, orientation }, subband);
            }

            let [start_y, start_x] = level.crop_start;
            let [size_y, size_x] = level.crop_size;
            let ranges = [
                0..n,
                0..c,
                start_y..start_y + size_y,
                start_x..start_x + size_x,
            ];
            lowpass = apply_mask(
                &(
                    lowpass.0.slice(ranges.to_owned()),
                    lowpass.1.slice(ranges),
                ),
                &level.lowpass_mask,
            );
        }

        coefficients.insert(
            BandKey::ResidualLowpass,
            Subband::Real(idft2(lowpass.0, lowpass.1).0),
        );

        #[cfg(all(debug_assertions, not(test)))]
        log::debug!(
            target: "perceptual_metric::pyramid::steerable",
            "decompose > {} subbands",
            coefficients.len(),
        );

        Ok(coefficients)
    }
}
