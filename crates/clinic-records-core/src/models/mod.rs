//! Domain models for clinic records.

mod patient;
mod visit;

pub use patient::*;
pub use visit::*;

use thiserror::Error;

/// Input rejected before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("No valid fields to update")]
    EmptyUpdate,

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}
