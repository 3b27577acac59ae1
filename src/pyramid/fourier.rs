//! Centered discrete Fourier transforms as dense matrix products.
//!
//! The frequency `j - n / 2` is stored at the index `j`,
//! so the zero frequency sits at the center of the spectrum.

pub use super::*;

use crate::function::float_tensor;
use dashmap::DashMap;
use std::{
    f64::consts::PI,
    sync::{Arc, OnceLock},
};

/// The cosine and sine bases of a centered DFT of `size`.
///
/// ## Details
///
/// `cos[j, t] = cos(2 * pi * (j - size / 2) * t / size)`
#[derive(Clone, Debug, PartialEq)]
pub struct DftBasis {
    /// The transform length.
    pub size: usize,
    /// `cos[j, t]`, row-major.
    pub cos: Vec<f64>,
    /// `sin[j, t]`, row-major.
    pub sin: Vec<f64>,
}

static BASES: OnceLock<DashMap<usize, Arc<DftBasis>>> = OnceLock::new();

impl DftBasis {
    /// Building the basis of `size`.
    pub fn new(size: usize) -> Self {
        let center = (size / 2) as f64;
        let (cos, sin) = (0..size * size)
            .map(|index| {
                let frequency = (index / size) as f64 - center;
                let position = (index % size) as f64;
                let theta = 2.0 * PI * frequency * position / size as f64;
                (theta.cos(), theta.sin())
            })
            .unzip();

        Self { size, cos, sin }
    }

    /// The shared basis of `size`, built on the first request.
    pub fn get(size: usize) -> Arc<Self> {
        BASES
            .get_or_init(Default::default)
            .entry(size)
            .or_insert_with(|| Arc::new(Self::new(size)))
            .value()
            .to_owned()
    }

    fn upload<B: Backend>(
        &self,
        device: &B::Device,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let shape = [self.size, self.size];
        (
            float_tensor::<B, 2>(&self.cos, shape, device),
            float_tensor::<B, 2>(&self.sin, shape, device),
        )
    }
}

/// Transforming along the last axis.
fn transform_last<B: Backend>(
    real: Tensor<B, 4>,
    imag: Tensor<B, 4>,
    is_inverse: bool,
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let dims = real.dims();
    let [n, c, h, w] = dims;
    let (cos, sin) = DftBasis::get(w).upload::<B>(&real.device());

    let real = real.reshape([n * c * h, w]);
    let imag = imag.reshape([n * c * h, w]);

    let (real, imag) = if is_inverse {
        // x_r = (X_r * C - X_i * S) / n
        // x_i = (X_i * C + X_r * S) / n
        let scale = 1.0 / w as f64;
        (
            real.to_owned()
                .matmul(cos.to_owned())
                .sub(imag.to_owned().matmul(sin.to_owned()))
                .mul_scalar(scale),
            imag.matmul(cos).add(real.matmul(sin)).mul_scalar(scale),
        )
    } else {
        // X_r = x_r * C^T + x_i * S^T
        // X_i = x_i * C^T - x_r * S^T
        let (cos, sin) = (cos.transpose(), sin.transpose());
        (
            real.to_owned()
                .matmul(cos.to_owned())
                .add(imag.to_owned().matmul(sin.to_owned())),
            imag.matmul(cos).sub(real.matmul(sin)),
        )
    };

    (real.reshape(dims), imag.reshape(dims))
}

/// Transforming along both spatial axes.
fn transform_2d<B: Backend>(
    real: Tensor<B, 4>,
    imag: Tensor<B, 4>,
    is_inverse: bool,
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let (real, imag) = transform_last(real, imag, is_inverse);
    let (real, imag) = transform_last(
        real.swap_dims(2, 3),
        imag.swap_dims(2, 3),
        is_inverse,
    );
    (real.swap_dims(2, 3), imag.swap_dims(2, 3))
}

/// The centered 2D DFT of the signal `(real, imag)` with shape `[N, C, H, W]`.
#[inline]
pub fn dft2<B: Backend>(
    real: Tensor<B, 4>,
    imag: Tensor<B, 4>,
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    transform_2d(real, imag, false)
}

/// The inverse of [`dft2`].
#[inline]
pub fn idft2<B: Backend>(
    real: Tensor<B, 4>,
    imag: Tensor<B, 4>,
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    transform_2d(real, imag, true)
}
