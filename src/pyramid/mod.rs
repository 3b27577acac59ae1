//! Linear multi-scale decompositions of image batches.

pub mod fourier;
pub mod laplacian;
pub mod steerable;

pub use crate::error::Error;
pub use burn::{
    config::Config,
    tensor::{backend::Backend, Tensor},
};
pub use fourier::*;
pub use laplacian::*;
pub use steerable::*;

use std::collections::BTreeMap;

/// The key of a steerable pyramid subband.
///
/// The order runs from fine to coarse.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum BandKey {
    /// The frequencies above the finest band.
    ResidualHighpass,
    /// An oriented band.
    Band {
        /// The scale, `0` being the finest.
        scale: usize,
        /// The orientation index.
        orientation: usize,
    },
    /// The frequencies below the coarsest band.
    ResidualLowpass,
}

/// A subband with shape `[N, C, h, w]`.
#[derive(Clone, Debug)]
pub enum Subband<B: Backend> {
    /// A real-valued subband.
    Real(Tensor<B, 4>),
    /// `(real, imag)`
    Complex(Tensor<B, 4>, Tensor<B, 4>),
}

/// The subbands of a steerable pyramid.
pub type Coefficients<B> = BTreeMap<BandKey, Subband<B>>;

/// The real-valued maps derived from the oriented bands.
pub type Bands<B> = BTreeMap<BandKey, Tensor<B, 4>>;

/// A linear decomposition of image batches with shape `[N, C, H, W]`.
pub trait Decomposition<B: Backend> {
    /// The decomposed subbands.
    type Output;

    /// Decomposing the images.
    ///
    /// ## Errors
    ///
    /// An error if the images do not fit the decomposition,
    /// such as [`Error::InvalidImageSize`].
    fn decompose(
        &self,
        input: Tensor<B, 4>,
    ) -> Result<Self::Output, Error>;
}

impl BandKey {
    /// Whether the key refers to an oriented band.
    #[inline]
    pub fn is_band(&self) -> bool {
        matches!(self, Self::Band { .. })
    }
}

impl<B: Backend> Subband<B> {
    /// The real part.
    #[inline]
    pub fn real(&self) -> Tensor<B, 4> {
        match self {
            Self::Real(real) | Self::Complex(real, _) => real.to_owned(),
        }
    }

    /// The shape of the real part.
    #[inline]
    pub fn dims(&self) -> [usize; 4] {
        match self {
            Self::Real(real) | Self::Complex(real, _) => real.dims(),
        }
    }
}
