//! # burrow-core
//!
//! Core types shared by every burrow crate.
//!
//! This crate provides:
//! - [`Tensor`] — dense, row-major `f64` array with cheap clones
//! - [`Shape`] — tensor dimensions
//! - [`InputType`] — per-example activation type for static shape checks
//! - [`Error`] / [`Result`] — the single error type used across the workspace

pub mod error;
pub mod input_type;
pub mod shape;
pub mod tensor;

pub use error::{Error, Result};
pub use input_type::InputType;
pub use shape::Shape;
pub use tensor::Tensor;
