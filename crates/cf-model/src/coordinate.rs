//! Coordinate constructs and data variables.

use ndarray::{Array1, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::array::MaskedArray;
use crate::error::{CfError, CfResult};

/// Units that identify a longitude coordinate.
pub const LONGITUDE_UNITS: &[&str] = &[
    "degrees_east",
    "degree_east",
    "degree_E",
    "degrees_E",
    "degreeE",
    "degreesE",
];

/// Units that identify a latitude coordinate.
pub const LATITUDE_UNITS: &[&str] = &[
    "degrees_north",
    "degree_north",
    "degree_N",
    "degrees_N",
    "degreeN",
    "degreesN",
];

/// A coordinate variable: cell-center values with optional cell bounds.
///
/// Bounds have the coordinate's shape plus one trailing vertex dimension
/// (2 for 1-d coordinates, typically 4 for 2-d coordinates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub standard_name: Option<String>,
    /// CF `axis` attribute ("X", "Y", "Z" or "T").
    pub axis: Option<String>,
    pub units: Option<String>,
    data: ArrayD<f64>,
    bounds: Option<ArrayD<f64>>,
}

impl Coordinate {
    pub fn new(data: ArrayD<f64>) -> Self {
        Self {
            standard_name: None,
            axis: None,
            units: None,
            data,
            bounds: None,
        }
    }

    /// Create a 1-d coordinate.
    pub fn from_vec(values: Vec<f64>) -> Self {
        Self::new(Array1::from_vec(values).into_dyn())
    }

    /// Create a coordinate of arbitrary shape from row-major values.
    pub fn from_shape_vec(shape: &[usize], values: Vec<f64>) -> CfResult<Self> {
        let len = values.len();
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|_| CfError::shape_mismatch(shape, &[len]))?;
        Ok(Self::new(data))
    }

    /// A 1-d longitude coordinate (`degrees_east`, axis X).
    pub fn longitude(values: Vec<f64>) -> Self {
        Self::from_vec(values)
            .with_standard_name("longitude")
            .with_units("degrees_east")
            .with_axis("X")
    }

    /// A 1-d latitude coordinate (`degrees_north`, axis Y).
    pub fn latitude(values: Vec<f64>) -> Self {
        Self::from_vec(values)
            .with_standard_name("latitude")
            .with_units("degrees_north")
            .with_axis("Y")
    }

    pub fn with_standard_name(mut self, name: impl Into<String>) -> Self {
        self.standard_name = Some(name.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_axis(mut self, axis: impl Into<String>) -> Self {
        self.axis = Some(axis.into());
        self
    }

    /// Attach cell bounds. The bounds shape must be the coordinate shape
    /// plus one trailing vertex dimension.
    pub fn with_bounds(mut self, bounds: ArrayD<f64>) -> CfResult<Self> {
        let shape = self.data.shape();
        let bshape = bounds.shape();
        if bshape.len() != shape.len() + 1 || &bshape[..shape.len()] != shape {
            let mut expected = shape.to_vec();
            expected.push(bshape.last().copied().unwrap_or(2));
            return Err(CfError::shape_mismatch(&expected, bshape));
        }
        self.bounds = Some(bounds);
        Ok(self)
    }

    /// Attach bounds from row-major values with `nv` vertices per cell.
    pub fn with_bounds_vec(self, nv: usize, values: Vec<f64>) -> CfResult<Self> {
        let mut shape = self.data.shape().to_vec();
        shape.push(nv);
        let len = values.len();
        let bounds = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|_| CfError::shape_mismatch(&shape, &[len]))?;
        self.with_bounds(bounds)
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn bounds(&self) -> Option<&ArrayD<f64>> {
        self.bounds.as_ref()
    }

    pub fn has_bounds(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_longitude(&self) -> bool {
        self.standard_name.as_deref() == Some("longitude")
            || self
                .units
                .as_deref()
                .is_some_and(|u| LONGITUDE_UNITS.contains(&u))
    }

    pub fn is_latitude(&self) -> bool {
        self.standard_name.as_deref() == Some("latitude")
            || self
                .units
                .as_deref()
                .is_some_and(|u| LATITUDE_UNITS.contains(&u))
    }

    /// The canonical identity: standard name, else the axis attribute.
    pub fn identity(&self) -> Option<&str> {
        self.standard_name.as_deref().or(self.axis.as_deref())
    }

    /// Whether `identity` selects this coordinate.
    ///
    /// Matches the standard name or the `axis` attribute. "X" and "Y" also
    /// match longitude and latitude coordinates.
    pub fn matches(&self, identity: &str) -> bool {
        if self.standard_name.as_deref() == Some(identity) || self.axis.as_deref() == Some(identity)
        {
            return true;
        }
        match identity {
            "X" => self.is_longitude(),
            "Y" => self.is_latitude(),
            _ => false,
        }
    }
}

/// A named data variable: field data, a cell measure or an ancillary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: Option<String>,
    pub units: Option<String>,
    pub data: MaskedArray,
}

impl Variable {
    pub fn new(data: MaskedArray) -> Self {
        Self {
            name: None,
            units: None,
            data,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}
