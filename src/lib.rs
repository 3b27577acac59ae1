//! A library of perceptual image metrics for `burn`

#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::excessive_precision)]
#![deny(missing_docs)]

pub mod checkpoint;
pub mod error;
pub mod function;
pub mod metric;
pub mod nonlinear;
pub mod pyramid;
pub mod range;
