//! Solver-side method catalogue and call parameters.

use serde::{Deserialize, Serialize};

/// Weight-generation method understood by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverMethod {
    /// Multilinear interpolation from surrounding cell centres.
    Bilinear,
    /// Local second-degree least-squares patch fit.
    Patch,
    /// First-order conservative remapping.
    Conserve,
    /// Second-order conservative remapping.
    Conserve2nd,
    /// Nearest source to each destination.
    NearestStod,
    /// Nearest destination to each source.
    NearestDtos,
}

impl SolverMethod {
    pub fn is_conservative(self) -> bool {
        matches!(self, Self::Conserve | Self::Conserve2nd)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bilinear => "bilinear",
            Self::Patch => "patch",
            Self::Conserve => "conserve",
            Self::Conserve2nd => "conserve_2nd",
            Self::NearestStod => "nearest_stod",
            Self::NearestDtos => "nearest_dtos",
        }
    }
}

impl std::fmt::Display for SolverMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with unmasked destination cells that receive no weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnmappedAction {
    /// Leave them unmapped; they become missing data.
    #[default]
    Ignore,
    /// Fail the weight computation.
    Error,
}

impl UnmappedAction {
    /// Parse from string (case-insensitive). Unknown values give `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ignore" => Some(Self::Ignore),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Parameters of one weight computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverParams {
    pub method: SolverMethod,
    pub unmapped_action: UnmappedAction,
    /// Skip zero-area cells for conservative methods instead of failing.
    pub ignore_degenerate: bool,
}

impl SolverParams {
    pub fn new(method: SolverMethod) -> Self {
        Self {
            method,
            unmapped_action: UnmappedAction::Ignore,
            ignore_degenerate: true,
        }
    }

    pub fn with_unmapped_action(mut self, action: UnmappedAction) -> Self {
        self.unmapped_action = action;
        self
    }

    pub fn with_ignore_degenerate(mut self, ignore: bool) -> Self {
        self.ignore_degenerate = ignore;
        self
    }
}
