//! Errors and advisories of the metrics.

use std::fmt;

/// The errors of the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A config failed to load or save.
    #[error("Config error: {0}")]
    Config(#[from] burn::config::ConfigError),

    /// The pyramid has no band to compare.
    #[error("Empty pyramid: no band between the residuals (height: {0})")]
    EmptyPyramid(usize),

    /// The dynamic range is not one of the supported spans.
    #[error("Invalid dynamic range: {0} (expected: 1, 2 or 255)")]
    InvalidDynamicRange(u32),

    /// The image is too small for the decomposition.
    #[error("Invalid image size: {0:?} (minimum: {1})")]
    InvalidImageSize([usize; 2], usize),

    /// The normalization coefficients are malformed.
    #[error("Invalid normalization coefficients: {0}")]
    InvalidCoefficients(String),

    /// The pyramid is higher than the image allows.
    #[error("Invalid pyramid height: {0} (maximum: {1})")]
    InvalidPyramidHeight(usize, usize),

    /// The window is not a 4D tensor.
    #[error("Malformed window: expected 4 dimensions, got shape {0:?}")]
    MalformedWindow(Vec<usize>),

    /// A saved attribute differs from the current one.
    #[error("Mismatched attribute: {0} differs between saved and current values")]
    MismatchedAttribute(String),

    /// An attribute has an unexpected kind.
    #[error("Mismatched attribute kind: {0}")]
    MismatchedAttributeKind(String),

    /// A saved tensor attribute has another shape.
    #[error(
        "Mismatched attribute shape: {0} (current: {1:?}, saved: {2:?})"
    )]
    MismatchedAttributeShape(String, Vec<usize>, Vec<usize>),

    /// The batch sizes can not be broadcast.
    #[error(
        "Mismatched batch size: {0} and {1} (equal sizes or a size of 1 expected)"
    )]
    MismatchedBatchSize(usize, usize),

    /// Two loss functions disagree on the same inputs.
    #[error(
        "Mismatched loss function: {0} (current: {1}, saved: {2})"
    )]
    MismatchedLossFunction(String, f64, f64),

    /// The inputs have different shapes.
    #[error("Mismatched shape: {0:?} and {1:?}")]
    MismatchedShape(Vec<usize>, Vec<usize>),

    /// A polar amplitude is negative.
    #[error("Negative amplitude: {0}")]
    NegativeAmplitude(f64),

    /// A record failed to load or save.
    #[error("Recorder error: {0}")]
    Recorder(#[from] burn::record::RecorderError),

    /// The component has no attribute with the name.
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// The input has an unsupported number of channels.
    #[error("Unsupported channel count: {0} (expected: {1})")]
    UnsupportedChannelCount(usize, usize),
}

/// Non-fatal conditions.
///
/// They are logged as warnings and the computation proceeds.
#[derive(Clone, Debug, PartialEq)]
pub enum Advisory {
    /// The input has more than one channel.
    MultiChannel(usize),

    /// The observed values fall outside the declared dynamic range.
    Range {
        /// The declared `(low, high)`.
        bounds: (f64, f64),
        /// The observed `(min, max)`.
        observed: (f64, f64),
    },

    /// The window sums (per channel) are not `1`.
    WindowNormalization(Vec<f64>),
}

impl Advisory {
    /// Emitting the advisory as a warning.
    pub fn log(
        &self,
        target: &str,
    ) -> &Self {
        log::warn!(target: target, "{self}");
        self
    }
}

impl fmt::Display for Advisory {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::MultiChannel(channel_count) => write!(
                f,
                "SSIM was developed on grayscale images, \
                no guarantee it will make sense for {channel_count} channels"
            ),
            Self::Range { bounds, observed } => write!(
                f,
                "The image range {observed:?} falls outside \
                the dynamic range {bounds:?}, continuing anyway"
            ),
            Self::WindowNormalization(sums) => write!(
                f,
                "The window should have a sum of 1 (sums: {sums:?}), normalizing"
            ),
        }
    }
}
