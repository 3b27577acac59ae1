//! Mean square error.

pub use super::*;

/// Computing the mean square error (MSE) between the inputs:
///
/// `mean((input_0 - input_1) ^ 2)`
///
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanSquareError;

impl MeanSquareError {
    /// The metric has no state.
    #[inline]
    pub fn init() -> Self {
        Self
    }
}

impl<B: Backend> Metric<B, 2> for MeanSquareError {
    /// ## Returns
    ///
    /// The mean square error (MSE) over the spatial axes with shape `[N, C]`.
    fn evaluate(
        &self,
        value: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> Result<Tensor<B, 2>, Error> {
        let (value, target) = broadcast_batch(value, target)?;
        let [n, c, _, _] = value.dims();

        Ok(value
            .sub(target)
            .powf_scalar(2.0)
            .mean_dim(3)
            .mean_dim(2)
            .reshape([n, c]))
    }
}

/// Computing the mean square error (MSE) with shape `[N, C]`.
///
/// It relies on [`MeanSquareError`].
#[inline]
pub fn mse<B: Backend>(
    value: Tensor<B, 4>,
    target: Tensor<B, 4>,
) -> Result<Tensor<B, 2>, Error> {
    MeanSquareError::init().evaluate(value, target)
}

#[cfg(test)]
mod tests {
    #[test]
    fn evaluate() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();
        let metric = MeanSquareError::init();

        let input_0 = Tensor::<NdArray, 4>::zeros([1, 3, 256, 256], &device);
        let input_1 = Tensor::<NdArray, 4>::zeros([1, 3, 256, 256], &device);
        let score = metric.evaluate(input_0, input_1).unwrap();
        assert_eq!(score.dims(), [1, 3]);
        assert_eq!(score.sum().into_scalar(), 0.0);

        let input_0 = Tensor::<NdArray, 4>::ones([1, 3, 256, 256], &device);
        let input_1 = Tensor::<NdArray, 4>::ones([1, 3, 256, 256], &device);
        let score = metric.evaluate(input_0, input_1).unwrap();
        assert_eq!(score.sum().into_scalar(), 0.0);

        let input_0 = Tensor::<NdArray, 4>::zeros([1, 3, 256, 256], &device);
        let input_1 = Tensor::<NdArray, 4>::ones([1, 3, 256, 256], &device);
        let score = metric.evaluate(input_0, input_1).unwrap();
        assert_eq!(score.sum().into_scalar(), 3.0);
    }

    #[test]
    fn evaluate_batch() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();

        for size_0 in [1, 3] {
            for size_1 in [1, 2, 3] {
                let input_0 =
                    Tensor::<NdArray, 4>::zeros([size_0, 1, 16, 16], &device);
                let input_1 =
                    Tensor::<NdArray, 4>::ones([size_1, 1, 16, 16], &device);
                let output = mse(input_0, input_1);

                if size_0 != size_1 && size_0 != 1 && size_1 != 1 {
                    output.unwrap_err();
                } else {
                    assert_eq!(output.unwrap().dims(), [size_0.max(size_1), 1]);
                }
            }
        }
    }
}
