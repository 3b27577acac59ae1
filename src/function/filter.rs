//! Binomial blurring with resampling.

pub use super::*;

use burn::tensor::{
    module::{conv2d, conv_transpose2d},
    ops::{ConvOptions, ConvTransposeOptions},
};

/// The 5-tap binomial kernel `[1, 4, 6, 4, 1] / 16`.
pub const BINOMIAL_5: [f64; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

/// The separable binomial filter with shape `[C, 1, 5, 5]`.
///
/// ## Details
///
/// Each channel sums to `gain`.
pub fn binomial_filter<B: Backend>(
    channel_count: usize,
    gain: f64,
    device: &B::Device,
) -> Tensor<B, 4> {
    const SIZE: usize = BINOMIAL_5.len();

    // w[i, j] = gain * b[i] * b[j]
    let values = (0..SIZE * SIZE)
        .map(|index| gain * BINOMIAL_5[index / SIZE] * BINOMIAL_5[index % SIZE])
        .collect::<Vec<_>>();

    float_tensor::<B, 4>(&values, [1, 1, SIZE, SIZE], device).expand([
        channel_count,
        1,
        SIZE,
        SIZE,
    ])
}

/// The indices of a mirrored padding along an axis of `size`.
///
/// The edge itself is not repeated, e.g. `[2, 1, 0, 1, 2, 3, 2, 1]`
/// for `size = 4` and `padding = 2`.
pub fn reflect_indices(
    size: usize,
    padding: usize,
) -> Vec<i64> {
    let last = size as i64 - 1;
    (-(padding as i64)..size as i64 + padding as i64)
        .map(|index| {
            let index = index.abs();
            if index > last {
                2 * last - index
            } else {
                index
            }
        })
        .collect()
}

/// Padding the spatial axes by mirroring.
///
/// ## Arguments
///
/// * `input` - The input tensor with shape `[N, C, H, W]`.
/// * `padding` - It should be less than both `H` and `W`.
///
/// ## Returns
///
/// The padded tensor with shape `[N, C, H + 2 * padding, W + 2 * padding]`.
pub fn reflect_pad<B: Backend>(
    input: Tensor<B, 4>,
    padding: usize,
) -> Tensor<B, 4> {
    let [_, _, height, width] = input.dims();
    let device = input.device();

    debug_assert!(padding < height && padding < width, "padding: {padding}");

    let rows = int_tensor::<B>(&reflect_indices(height, padding), &device);
    let columns = int_tensor::<B>(&reflect_indices(width, padding), &device);

    input.select(2, rows).select(3, columns)
}

/// Blurring with the binomial filter, then keeping every other pixel.
///
/// ## Arguments
///
/// * `input` - The input tensor with shape `[N, C, H, W]`, where `H` and `W`
///   are at least `3`.
///
/// ## Returns
///
/// The output tensor with shape `[N, C, ceil(H / 2), ceil(W / 2)]`.
pub fn blur_downsample<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 4> {
    const PADDING: usize = 2;

    let channel_count = input.dims()[1];
    let filter = binomial_filter::<B>(channel_count, 1.0, &input.device());
    let options = ConvOptions::new([2, 2], [0, 0], [1, 1], channel_count);

    conv2d(reflect_pad(input, PADDING), filter, None, options)
}

/// Inserting zeros between the pixels, then blurring with the binomial filter.
///
/// It undoes the resampling of [`blur_downsample`], so constant images
/// are kept constant, edges included.
///
/// ## Arguments
///
/// * `input` - The input tensor with shape `[N, C, h, w]`, where `h` and `w`
///   are at least `2`.
/// * `size` - The output size `[H, W]`, where `ceil(H / 2) = h` and
///   `ceil(W / 2) = w`.
///
/// ## Returns
///
/// The output tensor with shape `[N, C, H, W]`.
pub fn upsample_blur<B: Backend>(
    input: Tensor<B, 4>,
    size: [usize; 2],
) -> Tensor<B, 4> {
    // The padded pixel `-1` lands on the output pixel `-4`
    const OFFSET: usize = 4;

    let [n, c, _, _] = input.dims();
    let filter = binomial_filter::<B>(c, 4.0, &input.device());
    let options = ConvTransposeOptions::new([2, 2], [0, 0], [0, 0], [1, 1], c);

    conv_transpose2d(reflect_pad(input, 1), filter, None, options).slice([
        0..n,
        0..c,
        OFFSET..OFFSET + size[0],
        OFFSET..OFFSET + size[1],
    ])
}
