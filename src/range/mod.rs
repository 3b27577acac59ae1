//! Dynamic range of the images.

pub use crate::error::{Advisory, Error};
pub use burn::{
    config::Config,
    tensor::{backend::Backend, ElementConversion, Tensor},
};

/// The value range convention of the images.
///
/// It is declared by the caller and never inferred from the data.
#[derive(Config, Copy, Debug, Eq, PartialEq)]
pub enum DynamicRange {
    /// Float images ranging from `0.0` to `1.0`.
    Unit,
    /// Float images ranging from `-1.0` to `1.0`.
    Symmetric,
    /// 8-bit integer images ranging from `0` to `255`.
    Byte,
}

impl DynamicRange {
    /// The span `L` of the range, used to scale the stability constants.
    #[inline]
    pub fn span(&self) -> f64 {
        match self {
            Self::Unit => 1.0,
            Self::Symmetric => 2.0,
            Self::Byte => 255.0,
        }
    }

    /// The inclusive bounds `(min, max)` of the range.
    #[inline]
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            Self::Unit => (0.0, 1.0),
            Self::Symmetric => (-1.0, 1.0),
            Self::Byte => (0.0, 255.0),
        }
    }

    /// Checking the observed extrema against the bounds.
    pub fn check(
        &self,
        min: f64,
        max: f64,
    ) -> Option<Advisory> {
        let bounds = self.bounds();
        (min < bounds.0 || max > bounds.1).then_some(Advisory::Range {
            bounds,
            observed: (min, max),
        })
    }

    /// Checking the extrema of the tensor against the bounds.
    ///
    /// ## Details
    ///
    /// It reads two scalars back from the device.
    /// The tensor itself is left out of any autodiff graph.
    pub fn check_tensor<B: Backend, const D: usize>(
        &self,
        tensor: &Tensor<B, D>,
    ) -> Option<Advisory> {
        let tensor = tensor.to_owned().detach();
        let min = tensor.to_owned().min().into_scalar().elem::<f64>();
        let max = tensor.max().into_scalar().elem::<f64>();
        self.check(min, max)
    }
}

impl Default for DynamicRange {
    #[inline]
    fn default() -> Self {
        Self::Unit
    }
}

impl TryFrom<u32> for DynamicRange {
    type Error = Error;

    fn try_from(span: u32) -> Result<Self, Self::Error> {
        match span {
            1 => Ok(Self::Unit),
            2 => Ok(Self::Symmetric),
            255 => Ok(Self::Byte),
            _ => Err(Error::InvalidDynamicRange(span)),
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn check() {
        use super::*;

        let range = DynamicRange::Unit;
        assert_eq!(range.check(0.0, 1.0), None);
        assert_eq!(
            range.check(-0.1, 1.0),
            Some(Advisory::Range {
                bounds: (0.0, 1.0),
                observed: (-0.1, 1.0),
            })
        );

        let range = DynamicRange::Symmetric;
        assert_eq!(range.check(-1.0, 1.0), None);
        assert!(range.check(-1.0, 1.5).is_some());

        let range = DynamicRange::Byte;
        assert_eq!(range.check(0.0, 255.0), None);
        assert!(range.check(0.0, 256.0).is_some());
    }

    #[test]
    fn check_tensor() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();

        let tensor = Tensor::<NdArray, 4>::ones([1, 1, 8, 8], &device);
        assert_eq!(DynamicRange::Unit.check_tensor(&tensor), None);

        let tensor = tensor.mul_scalar(128.0);
        assert!(DynamicRange::Unit.check_tensor(&tensor).is_some());
        assert!(DynamicRange::Symmetric.check_tensor(&tensor).is_some());
        assert_eq!(DynamicRange::Byte.check_tensor(&tensor), None);
    }

    #[test]
    fn span() {
        use super::*;

        assert_eq!(DynamicRange::default(), DynamicRange::Unit);
        assert_eq!(DynamicRange::try_from(1).unwrap().span(), 1.0);
        assert_eq!(DynamicRange::try_from(2).unwrap().span(), 2.0);
        assert_eq!(DynamicRange::try_from(255).unwrap().span(), 255.0);
        DynamicRange::try_from(3).unwrap_err();
    }
}
