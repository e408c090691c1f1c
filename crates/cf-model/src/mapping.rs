//! Plain coordinate mappings usable as grid descriptors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

/// Dimension order of 2-d coordinates in a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisOrder {
    /// First dimension is X.
    XY,
    /// First dimension is Y.
    YX,
}

/// A name-to-coordinate mapping describing a grid without a field.
///
/// Spherical mappings hold `"longitude"` and `"latitude"` entries (plus an
/// `axes` order when those are 2-d); Cartesian mappings hold one entry per
/// named axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridMapping {
    coords: BTreeMap<String, Coordinate>,
    axes: Option<AxisOrder>,
}

impl GridMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// A spherical mapping from 1-d longitude and latitude coordinates.
    pub fn spherical(longitude: Coordinate, latitude: Coordinate) -> Self {
        Self::new()
            .with("longitude", longitude)
            .with("latitude", latitude)
    }

    /// A spherical mapping from 2-d longitude and latitude coordinates.
    pub fn curvilinear(longitude: Coordinate, latitude: Coordinate, axes: AxisOrder) -> Self {
        Self::spherical(longitude, latitude).with_axes(axes)
    }

    pub fn with(mut self, name: impl Into<String>, coord: Coordinate) -> Self {
        self.coords.insert(name.into(), coord);
        self
    }

    pub fn with_axes(mut self, axes: AxisOrder) -> Self {
        self.axes = Some(axes);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Coordinate> {
        self.coords.get(name)
    }

    pub fn axes(&self) -> Option<AxisOrder> {
        self.axes
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.coords.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}
