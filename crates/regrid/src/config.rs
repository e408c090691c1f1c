//! Configuration and per-call options for regridding.

use mesh_solver::{SolverConfig, UnmappedAction};
use serde::{Deserialize, Serialize};

/// Process-level regridding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegridConfig {
    /// Skip zero-area cells for conservative methods instead of failing.
    pub ignore_degenerate: bool,

    /// What to do with destination cells no source cell maps to.
    pub unmapped_action: UnmappedAction,

    /// Record source and destination mass for conservative methods.
    pub check_mass: bool,

    /// Relative mass difference above which a warning is logged.
    pub mass_rtol: f64,

    /// Absolute tolerance for bounds contiguity and cyclicity checks (degrees
    /// for spherical grids).
    pub bounds_tolerance: f64,

    /// Weight solver settings.
    pub solver: SolverConfig,
}

impl Default for RegridConfig {
    fn default() -> Self {
        Self {
            ignore_degenerate: true,
            unmapped_action: UnmappedAction::Ignore,
            check_mass: false,
            mass_rtol: 1e-6,
            bounds_tolerance: 1e-6,
            solver: SolverConfig::default(),
        }
    }
}

impl RegridConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            solver: SolverConfig::from_env(),
            ..Self::default()
        };

        if let Ok(val) = std::env::var("REGRID_IGNORE_DEGENERATE") {
            config.ignore_degenerate = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("REGRID_UNMAPPED_ACTION") {
            if let Some(action) = UnmappedAction::parse(&val) {
                config.unmapped_action = action;
            }
        }

        if let Ok(val) = std::env::var("REGRID_CHECK_MASS") {
            config.check_mass = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("REGRID_MASS_RTOL") {
            if let Ok(rtol) = val.parse() {
                config.mass_rtol = rtol;
            }
        }

        if let Ok(val) = std::env::var("REGRID_BOUNDS_TOLERANCE") {
            if let Ok(tol) = val.parse() {
                config.bounds_tolerance = tol;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.mass_rtol.is_finite() && self.mass_rtol > 0.0) {
            return Err("mass_rtol must be a positive number".to_string());
        }

        if !(self.bounds_tolerance.is_finite() && self.bounds_tolerance >= 0.0) {
            return Err("bounds_tolerance must be >= 0".to_string());
        }

        self.solver.validate()
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

/// Names a domain axis either by identity or by position within the 2-d
/// auxiliary coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisSelector {
    Key(String),
    Position(usize),
}

impl From<&str> for AxisSelector {
    fn from(key: &str) -> Self {
        AxisSelector::Key(key.to_string())
    }
}

impl From<String> for AxisSelector {
    fn from(key: String) -> Self {
        AxisSelector::Key(key)
    }
}

impl From<usize> for AxisSelector {
    fn from(position: usize) -> Self {
        AxisSelector::Position(position)
    }
}

/// The X and Y axes of a spherical grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XyAxes {
    pub x: AxisSelector,
    pub y: AxisSelector,
}

impl XyAxes {
    pub fn new(x: impl Into<AxisSelector>, y: impl Into<AxisSelector>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }
}

/// Options for a single regrid call.
#[derive(Debug, Clone, PartialEq)]
pub struct RegridOptions {
    /// Method name from the catalogue. May be omitted when regridding with
    /// an operator.
    pub method: Option<String>,

    /// Source X/Y axes for spherical regridding.
    pub src_axes: Option<XyAxes>,

    /// Destination X/Y axes for spherical regridding.
    pub dst_axes: Option<XyAxes>,

    /// Axes for Cartesian regridding, in solver order. Each name is
    /// resolved in both the source and the destination.
    pub cartesian_axes: Vec<String>,

    pub use_src_mask: bool,
    pub use_dst_mask: bool,

    /// Override source longitude cyclicity.
    pub src_cyclic: Option<bool>,

    /// Override destination longitude cyclicity.
    pub dst_cyclic: Option<bool>,

    /// Override [`RegridConfig::ignore_degenerate`].
    pub ignore_degenerate: Option<bool>,

    /// Return the operator instead of regridded data.
    pub return_operator: bool,

    /// Return the destination fraction instead of regridded data.
    pub return_fraction: bool,

    /// Compare coordinate values, not only shapes, when reusing an operator.
    pub check_coordinates: bool,

    /// Loop over sections in the order of these non-regrid axes.
    pub section_order: Option<Vec<String>>,
}

impl Default for RegridOptions {
    fn default() -> Self {
        Self {
            method: None,
            src_axes: None,
            dst_axes: None,
            cartesian_axes: Vec::new(),
            use_src_mask: true,
            use_dst_mask: false,
            src_cyclic: None,
            dst_cyclic: None,
            ignore_degenerate: None,
            return_operator: false,
            return_fraction: false,
            check_coordinates: false,
            section_order: None,
        }
    }
}

impl RegridOptions {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            ..Self::default()
        }
    }

    /// Use the same X/Y axes on both sides.
    pub fn with_axes(mut self, axes: XyAxes) -> Self {
        self.dst_axes = Some(axes.clone());
        self.src_axes = Some(axes);
        self
    }

    pub fn with_src_axes(mut self, axes: XyAxes) -> Self {
        self.src_axes = Some(axes);
        self
    }

    pub fn with_dst_axes(mut self, axes: XyAxes) -> Self {
        self.dst_axes = Some(axes);
        self
    }

    pub fn with_cartesian_axes<I, S>(mut self, axes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cartesian_axes = axes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_use_src_mask(mut self, use_src_mask: bool) -> Self {
        self.use_src_mask = use_src_mask;
        self
    }

    pub fn with_use_dst_mask(mut self, use_dst_mask: bool) -> Self {
        self.use_dst_mask = use_dst_mask;
        self
    }

    pub fn with_src_cyclic(mut self, cyclic: bool) -> Self {
        self.src_cyclic = Some(cyclic);
        self
    }

    pub fn with_dst_cyclic(mut self, cyclic: bool) -> Self {
        self.dst_cyclic = Some(cyclic);
        self
    }

    pub fn with_ignore_degenerate(mut self, ignore: bool) -> Self {
        self.ignore_degenerate = Some(ignore);
        self
    }

    pub fn with_return_operator(mut self, return_operator: bool) -> Self {
        self.return_operator = return_operator;
        self
    }

    pub fn with_return_fraction(mut self, return_fraction: bool) -> Self {
        self.return_fraction = return_fraction;
        self
    }

    pub fn with_check_coordinates(mut self, check: bool) -> Self {
        self.check_coordinates = check;
        self
    }

    pub fn with_section_order<I, S>(mut self, axes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.section_order = Some(axes.into_iter().map(Into::into).collect());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RegridConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.ignore_degenerate);
        assert_eq!(config.unmapped_action, UnmappedAction::Ignore);
    }

    #[test]
    fn test_validate_rejects_bad_tolerances() {
        let config = RegridConfig {
            mass_rtol: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RegridConfig {
            bounds_tolerance: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_options_builder() {
        let options = RegridOptions::new("conservative")
            .with_axes(XyAxes::new("X", "Y"))
            .with_use_dst_mask(true)
            .with_section_order(["T"]);
        assert_eq!(options.method.as_deref(), Some("conservative"));
        assert_eq!(options.src_axes, options.dst_axes);
        assert_eq!(options.src_axes.unwrap().y, AxisSelector::Key("Y".into()));
        assert!(options.use_src_mask);
        assert!(options.use_dst_mask);
        assert_eq!(options.section_order, Some(vec!["T".to_string()]));
    }

    #[test]
    fn test_axis_selector_conversions() {
        assert_eq!(AxisSelector::from(1usize), AxisSelector::Position(1));
        assert_eq!(AxisSelector::from("ncdim%x"), AxisSelector::Key("ncdim%x".into()));
    }
}
