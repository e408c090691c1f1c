//! Error types for regridding.

use cf_model::CfError;
use mesh_solver::SolverError;
use thiserror::Error;

use crate::method::METHODS;
use crate::types::GridRole;

/// Result type for regridding operations.
pub type Result<T> = std::result::Result<T, RegridError>;

/// Errors that can occur while regridding.
#[derive(Error, Debug)]
pub enum RegridError {
    // === Configuration errors ===
    /// The method is missing or not in the catalogue.
    #[error("Can't regrid: must set a valid regridding method from {METHODS:?}, got {0:?}")]
    InvalidMethod(String),

    /// An option is malformed or inconsistent with the others.
    #[error("Can't regrid: {0}")]
    InvalidOption(String),

    /// Coordinates could not be resolved or are inconsistent.
    #[error("Can't regrid: {role} {message}")]
    Coordinates { role: GridRole, message: String },

    // === Grid errors ===
    /// Cell bounds are missing or not contiguous.
    #[error("Can't regrid: {role} bounds {message}")]
    Bounds { role: GridRole, message: String },

    /// A regrid operator does not fit the source grid it is applied to.
    #[error("Can't regrid: operator is incompatible with the source grid ({attribute})")]
    Incompatible { attribute: String },

    // === Resource errors ===
    /// The weight solver cannot be used.
    #[error("weight solver unavailable: {0}")]
    SolverUnavailable(String),

    /// The weight solver rejected the grids or failed.
    #[error(transparent)]
    Solver(SolverError),

    // === Data model and persistence ===
    /// The field data model rejected an operation.
    #[error(transparent)]
    Model(#[from] CfError),

    /// Metadata could not be carried over to the regridded field.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Operator file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operator (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegridError {
    pub fn invalid_option(msg: impl Into<String>) -> Self {
        Self::InvalidOption(msg.into())
    }

    pub fn coordinates(role: GridRole, msg: impl Into<String>) -> Self {
        Self::Coordinates {
            role,
            message: msg.into(),
        }
    }

    pub fn bounds(role: GridRole, msg: impl Into<String>) -> Self {
        Self::Bounds {
            role,
            message: msg.into(),
        }
    }

    pub fn incompatible(attribute: impl Into<String>) -> Self {
        Self::Incompatible {
            attribute: attribute.into(),
        }
    }

    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }
}

impl From<SolverError> for RegridError {
    fn from(err: SolverError) -> Self {
        match err {
            SolverError::Unavailable(msg) => Self::SolverUnavailable(msg),
            other => Self::Solver(other),
        }
    }
}
