//! The regridding method catalogue.

use std::fmt;
use std::str::FromStr;

use mesh_solver::SolverMethod;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RegridError, Result};

/// Every accepted method string.
pub const METHODS: &[&str] = &[
    "linear",
    "bilinear",
    "conservative",
    "conservative_1st",
    "conservative_2nd",
    "patch",
    "nearest_stod",
    "nearest_dtos",
];

/// A regridding method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegridMethod {
    /// Multilinear interpolation.
    Linear,
    /// Deprecated spelling of [`RegridMethod::Linear`].
    Bilinear,
    /// First-order conservative; same as `Conservative1st`.
    Conservative,
    #[serde(rename = "conservative_1st")]
    Conservative1st,
    #[serde(rename = "conservative_2nd")]
    Conservative2nd,
    /// Second-degree patch recovery.
    Patch,
    /// Nearest source to destination.
    NearestStod,
    /// Nearest destination to source.
    NearestDtos,
}

impl RegridMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegridMethod::Linear => "linear",
            RegridMethod::Bilinear => "bilinear",
            RegridMethod::Conservative => "conservative",
            RegridMethod::Conservative1st => "conservative_1st",
            RegridMethod::Conservative2nd => "conservative_2nd",
            RegridMethod::Patch => "patch",
            RegridMethod::NearestStod => "nearest_stod",
            RegridMethod::NearestDtos => "nearest_dtos",
        }
    }

    /// Collapse aliases onto their canonical method.
    pub fn canonical(self) -> Self {
        match self {
            RegridMethod::Bilinear => RegridMethod::Linear,
            RegridMethod::Conservative => RegridMethod::Conservative1st,
            other => other,
        }
    }

    /// Whether two methods compute the same weights.
    pub fn is_equivalent(self, other: RegridMethod) -> bool {
        self.canonical() == other.canonical()
    }

    pub fn is_conservative(self) -> bool {
        matches!(
            self,
            RegridMethod::Conservative
                | RegridMethod::Conservative1st
                | RegridMethod::Conservative2nd
        )
    }

    /// Methods that interpolate between neighbouring source centres and so
    /// cannot work along a size-1 source dimension.
    pub fn needs_neighbours(self) -> bool {
        matches!(
            self,
            RegridMethod::Linear | RegridMethod::Bilinear | RegridMethod::Patch
        )
    }

    pub fn solver_method(self) -> SolverMethod {
        match self.canonical() {
            RegridMethod::Conservative1st => SolverMethod::Conserve,
            RegridMethod::Conservative2nd => SolverMethod::Conserve2nd,
            RegridMethod::Patch => SolverMethod::Patch,
            RegridMethod::NearestStod => SolverMethod::NearestStod,
            RegridMethod::NearestDtos => SolverMethod::NearestDtos,
            _ => SolverMethod::Bilinear,
        }
    }
}

impl FromStr for RegridMethod {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(RegridMethod::Linear),
            "bilinear" => Ok(RegridMethod::Bilinear),
            "conservative" => Ok(RegridMethod::Conservative),
            "conservative_1st" => Ok(RegridMethod::Conservative1st),
            "conservative_2nd" => Ok(RegridMethod::Conservative2nd),
            "patch" => Ok(RegridMethod::Patch),
            "nearest_stod" => Ok(RegridMethod::NearestStod),
            "nearest_dtos" => Ok(RegridMethod::NearestDtos),
            other => Err(RegridError::InvalidMethod(other.to_string())),
        }
    }
}

impl fmt::Display for RegridMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a method string, rejecting anything outside the catalogue.
///
/// `bilinear` is accepted but logged as renamed.
pub fn check_method(method: Option<&str>) -> Result<RegridMethod> {
    let method = method
        .ok_or_else(|| RegridError::InvalidMethod("None".to_string()))?
        .parse::<RegridMethod>()?;
    if method == RegridMethod::Bilinear {
        info!("The 'bilinear' regridding method has been renamed to 'linear'");
    }
    Ok(method)
}

/// Only `nearest_stod` may ignore the source mask.
pub fn check_use_src_mask(use_src_mask: bool, method: RegridMethod) -> Result<()> {
    if !use_src_mask && method != RegridMethod::NearestStod {
        return Err(RegridError::invalid_option(
            "the use_src_mask parameter can only be false when using the \
             'nearest_stod' regridding method",
        ));
    }
    Ok(())
}
