//! Error types for the seeker crate.

use thiserror::Error;

/// Errors that can occur when building or executing queries.
#[derive(Debug, Error)]
pub enum SeekerError {
    /// Invalid regular expression pattern.
    #[error("invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// A `field__lookup` key named an operator this engine does not know.
    #[error("unknown lookup '{lookup}' in '{key}'")]
    UnknownLookup { key: String, lookup: String },

    /// The clause value cannot be used with the operator.
    #[error("operator '{op}' cannot take {value_type} values")]
    InvalidValueForOperator {
        op: &'static str,
        value_type: &'static str,
    },
}

/// Result type for seeker operations.
pub type Result<T> = std::result::Result<T, SeekerError>;
