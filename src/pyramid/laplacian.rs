//! Laplacian pyramid of band-pass levels.

pub use super::*;

use crate::function::{blur_downsample, upsample_blur};

/// The configuration of [`LaplacianPyramid`].
#[derive(Config, Copy, Debug, Eq, PartialEq)]
pub struct LaplacianPyramidConfig {
    /// The number of levels, the lowpass included.
    #[config(default = "6")]
    pub scales: usize,
}

/// Decomposing images into band-pass levels and a lowpass residual:
///
/// *Burt, P., & Adelson, E. (1983). The Laplacian pyramid as a compact image code. IEEE Transactions on Communications, 31(4), 532–540.*
///
/// ## Details
///
/// - Each level is `x - U(D(x))`, where `D` blurs then halves the size
///   and `U` doubles the size then blurs.
/// - The last level is the remaining lowpass `D(D(...D(x)))`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaplacianPyramid {
    /// The level count.
    pub config: LaplacianPyramidConfig,
}

impl LaplacianPyramidConfig {
    /// Initialize the pyramid.
    #[inline]
    pub fn init(&self) -> LaplacianPyramid {
        LaplacianPyramid { config: *self }
    }
}

impl Default for LaplacianPyramidConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl LaplacianPyramid {
    /// The smallest side length that can be decomposed.
    pub fn min_image_size(&self) -> usize {
        match self.config.scales {
            0 | 1 => 1,
            scales => (1 << (scales - 1)) + 1,
        }
    }

    /// The spatial sizes of the levels.
    pub fn level_sizes(
        &self,
        image_size: [usize; 2],
    ) -> Vec<[usize; 2]> {
        (0..self.config.scales)
            .scan(image_size, |size, _| {
                let current = *size;
                *size = [size[0].div_ceil(2), size[1].div_ceil(2)];
                Some(current)
            })
            .collect()
    }

    /// Reconstructing the images from the levels.
    ///
    /// It inverts [`LaplacianPyramid::decompose`] up to rounding.
    pub fn recompose<B: Backend>(
        &self,
        levels: Vec<Tensor<B, 4>>,
    ) -> Result<Tensor<B, 4>, Error> {
        let mut levels = levels.into_iter().rev();
        let lowpass = levels.next().ok_or(Error::EmptyPyramid(0))?;

        Ok(levels.fold(lowpass, |lowpass, level| {
            let [_, _, h, w] = level.dims();
            level + upsample_blur(lowpass, [h, w])
        }))
    }
}

impl<B: Backend> Decomposition<B> for LaplacianPyramid {
    type Output = Vec<Tensor<B, 4>>;

    /// ## Returns
    ///
    /// The levels from fine to coarse, each with shape `[N, C, h_i, w_i]`,
    /// where `h_i = ceil(H / 2^i)` and `w_i = ceil(W / 2^i)`.
    fn decompose(
        &self,
        input: Tensor<B, 4>,
    ) -> Result<Self::Output, Error> {
        let [_, _, h, w] = input.dims();
        let size_min = self.min_image_size();
        if h < size_min || w < size_min {
            return Err(Error::InvalidImageSize([h, w], size_min));
        }
        if self.config.scales == 0 {
            return Err(Error::EmptyPyramid(0));
        }

        let mut levels = Vec::with_capacity(self.config.scales);
        let mut current = input;
        for _ in 1..self.config.scales {
            let [_, _, h, w] = current.dims();
            let lowpass = blur_downsample(current.to_owned());
            levels.push(current - upsample_blur(lowpass.to_owned(), [h, w]));
            current = lowpass;
        }
        levels.push(current);

        Ok(levels)
    }
}
