//! Error types for the weight solver.

use thiserror::Error;

/// Result type alias using SolverError.
pub type SolverResult<T> = Result<T, SolverError>;

/// Errors raised by the solver manager and weight computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// The manager was finalized or its worker pool could not start.
    #[error("solver unavailable: {0}")]
    Unavailable(String),

    /// Finalize was requested while grid handles are still alive.
    #[error("cannot finalize solver: {0} grid handle(s) still alive")]
    HandlesAlive(usize),

    /// A grid failed structural validation.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// Source and destination grids cannot be paired.
    #[error("incompatible grids: {0}")]
    IncompatibleGrids(String),

    /// A method needs cell corners that the grid does not carry.
    #[error("{grid} grid has no cell corners, required by {method}")]
    MissingCorners { grid: String, method: String },

    /// Zero-area cells found while `ignore_degenerate` is off.
    #[error("{grid} grid has {count} degenerate cell(s)")]
    DegenerateCells { grid: String, count: usize },

    /// Unmasked destination cells received no weights.
    #[error("{count} destination cell(s) could not be mapped")]
    Unmapped { count: usize },

    /// The method does not support this grid layout.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl SolverError {
    /// Create an Unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an InvalidGrid error.
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }

    /// Create an IncompatibleGrids error.
    pub fn incompatible(msg: impl Into<String>) -> Self {
        Self::IncompatibleGrids(msg.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}
