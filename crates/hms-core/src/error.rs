//! # Validation Errors
//!
//! Errors raised while parsing or normalizing caller-supplied input. They
//! are produced before any transaction is opened, so they never carry store
//! context.

use thiserror::Error;

/// Malformed or missing input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required text field was empty after trimming.
    #[error("{field} is required")]
    Missing {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A text field exceeded its maximum length.
    #[error("{field} exceeds {max} characters")]
    TooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Maximum accepted length in characters.
        max: usize,
    },

    /// An identifier was zero or negative.
    #[error("{field} must be a positive identifier, got {value}")]
    NonPositiveId {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// A room status string was not one of the known statuses.
    #[error("unknown room status: {0:?}")]
    UnknownStatus(String),

    /// A field that can no longer change was given a new value.
    #[error("{field} cannot change: {reason}")]
    Immutable {
        /// Name of the offending field.
        field: &'static str,
        /// Why the field is frozen.
        reason: &'static str,
    },

    /// A role string was not one of the known roles.
    #[error("unknown role: {0:?}")]
    UnknownRole(String),
}
