//! Distances between learned representations.

pub use super::*;

/// A differentiable mapping from images to a representation.
pub trait Representation<B: Backend> {
    /// ## Arguments
    ///
    /// * `input` - The images with shape `[N, C, H, W]`.
    ///
    /// ## Returns
    ///
    /// The representation, keeping the batch axis first.
    fn represent(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4>;
}

impl<B: Backend, F> Representation<B> for F
where
    F: Fn(Tensor<B, 4>) -> Tensor<B, 4>,
{
    #[inline]
    fn represent(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self(input)
    }
}

/// Computing the distance between the representations of the inputs.
///
/// ## Details
///
/// The distance is the RMSE of the representations.
/// It is differentiable as long as the representation is.
#[derive(Clone, Debug)]
pub struct ModelMetric<M> {
    /// The representation of the images.
    pub model: M,
}

impl<M> ModelMetric<M> {
    /// Wrapping the model.
    #[inline]
    pub fn init(model: M) -> Self {
        Self { model }
    }
}

impl<B: Backend, M: Representation<B>> Metric<B, 1> for ModelMetric<M> {
    /// ## Returns
    ///
    /// The distance with shape `[1]`.
    fn evaluate(
        &self,
        value: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> Result<Tensor<B, 1>, Error> {
        let (value, target) = broadcast_batch(value, target)?;
        let batch_size = value.dims()[0];

        let representation = self
            .model
            .represent(Tensor::cat(vec![value, target], 0));
        let (representation_0, representation_1) =
            split_batch(representation, batch_size);

        Ok(root_mean_square_error(representation_0, representation_1))
    }
}

/// Computing the distance between the representations of the inputs with shape `[1]`.
///
/// It relies on [`ModelMetric`].
pub fn model_metric<B: Backend, M: Representation<B>>(
    input_0: Tensor<B, 4>,
    input_1: Tensor<B, 4>,
    model: M,
) -> Result<Tensor<B, 1>, Error> {
    ModelMetric::init(model).evaluate(input_0, input_1)
}

#[cfg(test)]
mod tests {
    #[test]
    fn model_metric() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();
        let input_0 = Tensor::<NdArray, 4>::zeros([2, 1, 8, 8], &device);
        let input_1 = Tensor::<NdArray, 4>::ones([2, 1, 8, 8], &device);

        let identity = |input: Tensor<NdArray, 4>| input;
        let output = super::model_metric(input_0.to_owned(), input_1.to_owned(), identity)
            .unwrap()
            .into_scalar();
        assert!((output - 1.0).abs() < 1e-5, "output: {output}");

        // The representation may change the shape
        let pooled = |input: Tensor<NdArray, 4>| input.mean_dim(3).mean_dim(2).mul_scalar(3.0);
        let output = super::model_metric(input_0, input_1, pooled)
            .unwrap()
            .into_scalar();
        assert!((output - 3.0).abs() < 1e-5, "output: {output}");
    }

    #[test]
    fn model_metric_batch() {
        use super::*;
        use burn::backend::NdArray;

        let device = Default::default();
        let identity = |input: Tensor<NdArray, 4>| input;

        let input_0 = Tensor::<NdArray, 4>::zeros([1, 1, 8, 8], &device);
        let input_1 = Tensor::<NdArray, 4>::ones([3, 1, 8, 8], &device);
        super::model_metric(input_0, input_1, identity).unwrap();

        let input_0 = Tensor::<NdArray, 4>::zeros([2, 1, 8, 8], &device);
        let input_1 = Tensor::<NdArray, 4>::ones([3, 1, 8, 8], &device);
        let output = super::model_metric(input_0, input_1, identity);
        assert!(
            matches!(output, Err(Error::MismatchedBatchSize(2, 3))),
            "{output:?}"
        );
    }

    #[test]
    fn model_metric_gradient() {
        use super::*;
        use burn::{
            backend::{Autodiff, NdArray},
            tensor::Distribution,
        };

        type B = Autodiff<NdArray>;

        let device = Default::default();
        let input_0 = Tensor::<B, 4>::random(
            [1, 1, 8, 8],
            Distribution::Uniform(0.0, 1.0),
            &device,
        )
        .require_grad();
        let input_1 = Tensor::<B, 4>::zeros([1, 1, 8, 8], &device);

        let square = |input: Tensor<B, 4>| input.powf_scalar(2.0);
        let grads = super::model_metric(input_0.to_owned(), input_1, square)
            .unwrap()
            .backward();

        let grad = input_0.grad(&grads).unwrap().abs().sum().into_scalar();
        assert!(grad > 0.0 && grad.is_finite(), "grad: {grad}");
    }
}
