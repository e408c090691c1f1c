//! Shared types used across the regridding pipeline.

use std::fmt;

use cf_model::{Field, GridMapping};
use serde::{Deserialize, Serialize};

use crate::operator::RegridOperator;

/// Which side of a regridding a grid plays. Used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridRole {
    Source,
    Destination,
}

impl GridRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridRole::Source => "source",
            GridRole::Destination => "destination",
        }
    }
}

impl fmt::Display for GridRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something coordinates can be read from.
#[derive(Debug, Clone, Copy)]
pub enum GridSource<'a> {
    Field(&'a Field),
    Mapping(&'a GridMapping),
}

/// Where regridded data should end up.
#[derive(Debug, Clone, Copy)]
pub enum Destination<'a> {
    /// Regrid onto the grid of another field.
    Field(&'a Field),
    /// Regrid onto coordinates given as a plain mapping.
    Mapping(&'a GridMapping),
    /// Reuse a previously built operator.
    Operator(&'a RegridOperator),
}

impl<'a> Destination<'a> {
    /// The destination as a coordinate source, unless it is an operator.
    pub fn as_grid_source(&self) -> Option<GridSource<'a>> {
        match *self {
            Destination::Field(f) => Some(GridSource::Field(f)),
            Destination::Mapping(m) => Some(GridSource::Mapping(m)),
            Destination::Operator(_) => None,
        }
    }
}

impl<'a> From<&'a Field> for Destination<'a> {
    fn from(field: &'a Field) -> Self {
        Destination::Field(field)
    }
}

impl<'a> From<&'a GridMapping> for Destination<'a> {
    fn from(mapping: &'a GridMapping) -> Self {
        Destination::Mapping(mapping)
    }
}

impl<'a> From<&'a RegridOperator> for Destination<'a> {
    fn from(operator: &'a RegridOperator) -> Self {
        Destination::Operator(operator)
    }
}
