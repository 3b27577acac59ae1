//! Pointwise and local nonlinearities over pyramid subbands.

pub use crate::{
    error::Error,
    pyramid::{BandKey, Bands, Coefficients, Subband},
};
pub use burn::tensor::{backend::Backend, ElementConversion, Tensor};

use crate::function::{blur_downsample, upsample_blur};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// The epsilon under the square roots of the amplitudes and the norms.
pub const AMPLITUDE_EPSILON: f64 = 1e-12;

/// The epsilon of the direction in [`rectangular_to_polar_real`].
pub const DIRECTION_EPSILON: f64 = 1e-12;

/// The epsilon of the direction in [`local_gain_control`].
pub const GAIN_CONTROL_EPSILON: f64 = 1e-8;

/// Computing `atan2(y, x)` from differentiable elementwise operations.
///
/// ## Details
///
/// - The angle is reduced to the first octant `t = min(|x|, |y|) / max(|x|, |y|)`.
/// - `atan(t)` is seeded by a quadratic and refined by Newton steps on
///   `sin(a) - t * cos(a) = 0`.
/// - The octant is restored with masks.
/// - `atan2(0, 0)` is `0` with finite gradients.
pub fn atan2<B: Backend, const D: usize>(
    y: Tensor<B, D>,
    x: Tensor<B, D>,
) -> Tensor<B, D> {
    const NEWTON_STEPS: usize = 2;
    const SEED_CURVATURE: f64 = 0.273;
    const DENOMINATOR_MIN: f64 = 1e-12;

    let x_abs = x.to_owned().abs();
    let y_abs = y.to_owned().abs();
    let is_steep = y_abs.to_owned().greater(x_abs.to_owned());

    // t = min(|x|, |y|) / max(|x|, |y|)
    let numerator = y_abs.to_owned().mask_where(is_steep.to_owned(), x_abs.to_owned());
    let denominator = x_abs.mask_where(is_steep.to_owned(), y_abs);
    let is_origin = denominator.to_owned().lower_elem(DENOMINATOR_MIN);
    let t = numerator.div(denominator.mask_fill(is_origin, 1.0));

    // a = pi / 4 * t + 0.273 * t * (1 - t)
    let seed = t.to_owned().mul_scalar(FRAC_PI_4).add(
        t.to_owned()
            .mul(t.to_owned().neg().add_scalar(1.0))
            .mul_scalar(SEED_CURVATURE),
    );
    // a <- a - (sin(a) - t * cos(a)) / (cos(a) + t * sin(a))
    let angle = (0..NEWTON_STEPS).fold(seed, |angle, _| {
        let sin = angle.to_owned().sin();
        let cos = angle.to_owned().cos();
        let residual = sin.to_owned().sub(t.to_owned().mul(cos.to_owned()));
        let slope = cos.add(t.to_owned().mul(sin));
        angle.sub(residual.div(slope))
    });

    let angle = angle
        .to_owned()
        .mask_where(is_steep, angle.neg().add_scalar(FRAC_PI_2));
    let angle = angle
        .to_owned()
        .mask_where(x.lower_elem(0.0), angle.neg().add_scalar(PI));
    angle.to_owned().mask_where(y.lower_elem(0.0), angle.neg())
}

/// Converting the rectangular coordinates to the polar ones.
///
/// ## Returns
///
/// `(amplitude, phase)`, where the phase ranges from `-pi` to `pi`.
///
/// ## Details
///
/// The amplitude is `sqrt(x^2 + y^2 + AMPLITUDE_EPSILON)`,
/// so its gradient stays finite at the origin.
pub fn rectangular_to_polar<B: Backend, const D: usize>(
    real: Tensor<B, D>,
    imag: Tensor<B, D>,
) -> (Tensor<B, D>, Tensor<B, D>) {
    // r = sqrt(x^2 + y^2 + epsilon)
    let amplitude = real
        .to_owned()
        .powf_scalar(2.0)
        .add(imag.to_owned().powf_scalar(2.0))
        .add_scalar(AMPLITUDE_EPSILON)
        .sqrt();
    let phase = atan2(imag, real);

    (amplitude, phase)
}

/// Converting the polar coordinates to the rectangular ones.
///
/// ## Returns
///
/// `(real, imag)`
///
/// ## Details
///
/// The amplitude should not be negative.
/// Its minimum is read back from the device for the check.
pub fn polar_to_rectangular<B: Backend, const D: usize>(
    amplitude: Tensor<B, D>,
    phase: Tensor<B, D>,
) -> Result<(Tensor<B, D>, Tensor<B, D>), Error> {
    let amplitude_min = amplitude
        .to_owned()
        .detach()
        .min()
        .into_scalar()
        .elem::<f64>();
    if amplitude_min < 0.0 {
        return Err(Error::NegativeAmplitude(amplitude_min));
    }

    let real = amplitude.to_owned().mul(phase.to_owned().cos());
    let imag = amplitude.mul(phase.sin());

    Ok((real, imag))
}

/// Converting the oriented bands to the polar coordinates.
///
/// ## Returns
///
/// `(energy, state)`, the amplitude and the phase of each oriented band.
///
/// ## Details
///
/// The residuals are skipped. A real band has a zero imaginary part.
pub fn rectangular_to_polar_dict<B: Backend>(
    coefficients: &Coefficients<B>
) -> (Bands<B>, Bands<B>) {
    coefficients
        .iter()
        .filter(|(key, _)| key.is_band())
        .map(|(key, subband)| {
            let (real, imag) = match subband {
                Subband::Real(real) => (real.to_owned(), real.zeros_like()),
                Subband::Complex(real, imag) => (real.to_owned(), imag.to_owned()),
            };
            let (amplitude, phase) = rectangular_to_polar(real, imag);
            ((*key, amplitude), (*key, phase))
        })
        .unzip()
}

/// Splitting a real band into its local energy and direction.
///
/// ## Arguments
///
/// * `input` - The band with shape `[N, C, H, W]`, where `H` and `W`
///   are at least `3`.
///
/// ## Returns
///
/// `(norm, direction)`
///
/// - `norm = sqrt(D(x^2) + AMPLITUDE_EPSILON)` with shape `[N, C, ceil(H / 2), ceil(W / 2)]`,
///   where `D` blurs then halves the size.
/// - `direction = x / (U(norm) + epsilon)` with shape `[N, C, H, W]`,
///   where `U` doubles the size then blurs.
pub fn rectangular_to_polar_real<B: Backend>(
    input: Tensor<B, 4>,
    epsilon: f64,
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let [_, _, h, w] = input.dims();

    let norm = blur_downsample(input.to_owned().powf_scalar(2.0))
        .add_scalar(AMPLITUDE_EPSILON)
        .sqrt();
    let direction =
        input.div(upsample_blur(norm.to_owned(), [h, w]).add_scalar(epsilon));

    (norm, direction)
}

/// Normalizing each oriented band by its local energy.
///
/// ## Returns
///
/// `(energy, state)`, as given by [`rectangular_to_polar_real`] on
/// the real part of each oriented band.
///
/// ## Details
///
/// The residuals are skipped.
pub fn local_gain_control<B: Backend>(
    coefficients: &Coefficients<B>
) -> (Bands<B>, Bands<B>) {
    coefficients
        .iter()
        .filter(|(key, _)| key.is_band())
        .map(|(key, subband)| {
            let (energy, state) =
                rectangular_to_polar_real(subband.real(), GAIN_CONTROL_EPSILON);
            ((*key, energy), (*key, state))
        })
        .unzip()
}
