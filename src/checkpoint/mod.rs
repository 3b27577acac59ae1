//! Saving, checking and restoring the state of metric-driven computations.

pub use crate::{error::Error, function::host_values, metric::Metric};
pub use burn::{
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Record, Recorder},
    tensor::{backend::Backend, Distribution, Tensor},
};

use std::path::PathBuf;

/// The relative tolerance of tensor attributes in [`check_attributes`].
pub const ATTRIBUTE_TOLERANCE: f64 = 5e-2;

/// The relative tolerance of outputs in [`check_loss_function`].
pub const LOSS_FUNCTION_TOLERANCE: f64 = 1e-2;

/// The absolute tolerance added to both checks.
pub const ABSOLUTE_TOLERANCE: f64 = 1e-8;

/// A value that can be saved and restored.
#[derive(Clone, Debug)]
pub enum Attribute<B: Backend> {
    /// A number.
    Scalar(f64),
    /// A list of numbers, such as the loss history.
    Scalars(Vec<f64>),
    /// A batch of images with shape `[N, C, H, W]`.
    Tensor(Tensor<B, 4>),
}

impl<B: Backend> Attribute<B> {
    /// The name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Scalars(_) => "scalars",
            Self::Tensor(_) => "tensor",
        }
    }
}

/// A component whose attributes are checkpointed by name.
pub trait Persist<B: Backend> {
    /// The attribute names saved by default.
    const PERSISTED: &'static [&'static str];

    /// ## Errors
    ///
    /// [`Error::UnknownAttribute`] if the component has no such attribute.
    fn attribute(
        &self,
        name: &str,
    ) -> Result<Attribute<B>, Error>;

    /// ## Errors
    ///
    /// [`Error::UnknownAttribute`] if the component has no such attribute,
    /// or [`Error::MismatchedAttributeKind`] if the value does not fit it.
    fn set_attribute(
        &mut self,
        name: &str,
        value: Attribute<B>,
    ) -> Result<(), Error>;
}

/// A named attribute.
///
/// Exactly one of the values is set.
#[derive(Clone, Debug, Record)]
pub struct AttributeRecord<B: Backend> {
    /// The attribute name.
    pub name: String,
    /// The value of [`Attribute::Scalar`].
    pub scalar: Option<f64>,
    /// The value of [`Attribute::Scalars`].
    pub scalars: Option<Vec<f64>>,
    /// The value of [`Attribute::Tensor`].
    pub tensor: Option<Tensor<B, 4>>,
}

/// The saved attributes of a component.
#[derive(Clone, Debug, Record)]
pub struct CheckpointRecord<B: Backend> {
    /// The attributes in saving order.
    pub attributes: Vec<AttributeRecord<B>>,
}

impl<B: Backend> AttributeRecord<B> {
    /// Recording the value, with tensors detached from the graph.
    pub fn new(
        name: String,
        value: Attribute<B>,
    ) -> Self {
        let mut record = Self {
            name,
            scalar: None,
            scalars: None,
            tensor: None,
        };
        match value {
            Attribute::Scalar(value) => record.scalar = Some(value),
            Attribute::Scalars(values) => record.scalars = Some(values),
            Attribute::Tensor(tensor) => record.tensor = Some(tensor.detach()),
        }
        record
    }

    /// ## Errors
    ///
    /// [`Error::MismatchedAttributeKind`] unless exactly one value is set.
    pub fn into_attribute(self) -> Result<(String, Attribute<B>), Error> {
        let value = match (self.scalar, self.scalars, self.tensor) {
            (Some(value), None, None) => Attribute::Scalar(value),
            (None, Some(values), None) => Attribute::Scalars(values),
            (None, None, Some(tensor)) => Attribute::Tensor(tensor),
            _ => {
                return Err(Error::MismatchedAttributeKind(format!(
                    "{} holds no single value",
                    self.name
                )))
            },
        };
        Ok((self.name, value))
    }
}

impl<B: Backend> CheckpointRecord<B> {
    /// Moving the tensor attributes to `device`.
    pub fn to_device(
        mut self,
        device: &B::Device,
    ) -> Self {
        self.attributes.iter_mut().for_each(|attribute| {
            attribute.tensor = attribute
                .tensor
                .take()
                .map(|tensor| tensor.to_device(device));
        });

        self
    }

    /// The recorded attribute names.
    pub fn names(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .map(|attribute| attribute.name.as_str())
            .collect()
    }

    /// The attribute named `name`.
    ///
    /// ## Errors
    ///
    /// [`Error::UnknownAttribute`] if it was not recorded.
    pub fn get(
        &self,
        name: &str,
    ) -> Result<Attribute<B>, Error> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .ok_or_else(|| Error::UnknownAttribute(name.to_owned()))?
            .to_owned()
            .into_attribute()
            .map(|(_, value)| value)
    }
}

/// Collecting the attributes of the component.
///
/// Tensors are detached from the graph.
pub fn collect<B: Backend, P: Persist<B>>(
    component: &P,
    names: &[&str],
) -> Result<CheckpointRecord<B>, Error> {
    let attributes = names
        .iter()
        .map(|name| {
            if *name == "model" {
                log::warn!(
                    target: "perceptual_metric::checkpoint",
                    "Saving the model attribute, it is usually rebuilt by the caller"
                );
            }
            Ok(AttributeRecord::new(
                (*name).to_owned(),
                component.attribute(name)?,
            ))
        })
        .collect::<Result<_, Error>>()?;

    Ok(CheckpointRecord { attributes })
}

/// Saving the attributes named `names` to `path`,
/// or [`Persist::PERSISTED`] if `names` is `None`.
///
/// The recorder appends its own extension to `path`.
pub fn save<B: Backend, P: Persist<B>>(
    component: &P,
    path: impl Into<PathBuf>,
    names: Option<&[&str]>,
) -> Result<(), Error> {
    let path = path.into();
    let record = collect(component, names.unwrap_or(P::PERSISTED))?;

    #[cfg(all(debug_assertions, not(test)))]
    log::debug!(
        target: "perceptual_metric::checkpoint",
        "save > {path:?} ({:?})",
        record.names()
    );

    NamedMpkFileRecorder::<FullPrecisionSettings>::new().record(record, path)?;

    Ok(())
}

/// Loading a record saved by [`save`] onto `device`.
pub fn load_record<B: Backend>(
    path: impl Into<PathBuf>,
    device: &B::Device,
) -> Result<CheckpointRecord<B>, Error> {
    Ok(NamedMpkFileRecorder::<FullPrecisionSettings>::new().load(path.into(), device)?)
}

/// Checking that the recorded attributes named `names` agree with the component.
///
/// ## Details
///
/// - Tensors should have the same shape and close values
///   (relative tolerance [`ATTRIBUTE_TOLERANCE`]).
/// - Scalars should be equal.
pub fn check_attributes<B: Backend, P: Persist<B>>(
    component: &P,
    record: &CheckpointRecord<B>,
    names: &[&str],
) -> Result<(), Error> {
    for name in names {
        let saved = record.get(name)?;
        let current = component.attribute(name)?;

        match (current, saved) {
            (Attribute::Tensor(current), Attribute::Tensor(saved)) => {
                let (shape_current, shape_saved) = (current.dims(), saved.dims());
                if shape_current != shape_saved {
                    return Err(Error::MismatchedAttributeShape(
                        (*name).to_owned(),
                        shape_current.to_vec(),
                        shape_saved.to_vec(),
                    ));
                }

                let saved = saved.to_device(&current.device());
                let mismatch = first_mismatch(
                    host_values(current),
                    host_values(saved),
                    ATTRIBUTE_TOLERANCE,
                );
                if mismatch.is_some() {
                    return Err(Error::MismatchedAttribute((*name).to_owned()));
                }
            },
            (Attribute::Scalar(current), Attribute::Scalar(saved)) => {
                if current != saved {
                    return Err(Error::MismatchedAttribute((*name).to_owned()));
                }
            },
            (Attribute::Scalars(current), Attribute::Scalars(saved)) => {
                if current != saved {
                    return Err(Error::MismatchedAttribute((*name).to_owned()));
                }
            },
            (current, saved) => {
                return Err(Error::MismatchedAttributeKind(format!(
                    "{name} (current: {}, saved: {})",
                    current.kind(),
                    saved.kind(),
                )));
            },
        }
    }

    Ok(())
}

/// Checking that two loss functions behave alike.
///
/// Both are evaluated on the same pair of random batches of 2 images
/// with shape `signal_shape` (`[C, H, W]`),
/// and their outputs should be close (relative tolerance [`LOSS_FUNCTION_TOLERANCE`]).
pub fn check_loss_function<B: Backend, const D: usize>(
    name: &str,
    current: &impl Metric<B, D>,
    saved: &impl Metric<B, D>,
    signal_shape: [usize; 3],
    device: &B::Device,
) -> Result<(), Error> {
    let [c, h, w] = signal_shape;
    let distribution = Distribution::Uniform(0.0, 1.0);
    let input_0 = Tensor::<B, 4>::random([2, c, h, w], distribution, device);
    let input_1 = Tensor::<B, 4>::random([2, c, h, w], distribution, device);

    let output_current = current.evaluate(input_0.to_owned(), input_1.to_owned())?;
    let output_saved = saved.evaluate(input_0, input_1)?;

    match first_mismatch(
        host_values(output_current),
        host_values(output_saved),
        LOSS_FUNCTION_TOLERANCE,
    ) {
        None => Ok(()),
        Some((current, saved)) => Err(Error::MismatchedLossFunction(
            name.to_owned(),
            current,
            saved,
        )),
    }
}

/// Moving the tensor attributes named `names` of the component to `device`.
///
/// Other attributes are left as they are.
pub fn to_device<B: Backend, P: Persist<B>>(
    component: &mut P,
    names: &[&str],
    device: &B::Device,
) -> Result<(), Error> {
    for name in names {
        if let Attribute::Tensor(tensor) = component.attribute(name)? {
            component.set_attribute(name, Attribute::Tensor(tensor.to_device(device)))?;
        }
    }

    Ok(())
}

/// Writing every recorded attribute back to the component.
pub fn restore<B: Backend, P: Persist<B>>(
    component: &mut P,
    record: CheckpointRecord<B>,
) -> Result<(), Error> {
    record
        .attributes
        .into_iter()
        .try_for_each(|attribute| {
            let (name, value) = attribute.into_attribute()?;
            component.set_attribute(&name, value)
        })
}

/// Loading the record at `path` and restoring it into the component.
///
/// If `check_attributes` is `true`, every recorded attribute is checked first.
pub fn load<B: Backend, P: Persist<B>>(
    component: &mut P,
    path: impl Into<PathBuf>,
    device: &B::Device,
    check_attributes: bool,
) -> Result<(), Error> {
    let record = load_record(path, device)?;

    if check_attributes {
        self::check_attributes(component, &record, &record.names())?;
    }

    restore(component, record)
}

/// The first pair violating `|a - b| <= atol + rtol * |b|`, if any.
fn first_mismatch(
    values_0: Vec<f64>,
    values_1: Vec<f64>,
    tolerance: f64,
) -> Option<(f64, f64)> {
    if values_0.len() != values_1.len() {
        return Some((values_0.len() as f64, values_1.len() as f64));
    }

    values_0.into_iter().zip(values_1).find(|(value_0, value_1)| {
        (value_0 - value_1).abs() > ABSOLUTE_TOLERANCE + tolerance * value_1.abs()
            || value_0.is_nan() != value_1.is_nan()
    })
}
