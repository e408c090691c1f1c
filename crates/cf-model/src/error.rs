//! Error types for the construct model.

use thiserror::Error;

/// Result type alias using CfError.
pub type CfResult<T> = Result<T, CfError>;

/// Primary error type for construct-model operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CfError {
    // === Lookup Errors ===
    #[error("Domain axis not found: {0}")]
    AxisNotFound(String),

    #[error("Construct not found: {0}")]
    ConstructNotFound(String),

    #[error("Identity '{identity}' matches {count} constructs, expected at most one")]
    NotUnique { identity: String, count: usize },

    // === Shape Errors ===
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Invalid axis position {position} for array of rank {ndim}")]
    InvalidAxis { position: usize, ndim: usize },

    #[error("Cannot concatenate: {0}")]
    Concatenate(String),

    // === Construct Errors ===
    #[error("Construct '{0}' has no data to convert into a field")]
    NotConvertible(String),

    #[error("Invalid construct: {0}")]
    InvalidConstruct(String),
}

impl CfError {
    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Create an InvalidConstruct error.
    pub fn invalid_construct(msg: impl Into<String>) -> Self {
        Self::InvalidConstruct(msg.into())
    }
}
