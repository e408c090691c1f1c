//! Solver grid description.
//!
//! Axes are in solver order (x, y, z) and every flattened per-cell array
//! varies fastest along x. A rectilinear grid stores one 1-d array of
//! centres per axis; a curvilinear grid (2-d only) stores the full
//! flattened centre array for each axis.
//!
//! Corners follow the same layout with one extra point per axis, except
//! along a cyclic x axis where the wrap corner is shared and not repeated.

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};
use crate::geometry::{self, DEG2RAD};

/// Coordinate system of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordSys {
    Cartesian,
    /// Longitude (axis 0) and latitude (axis 1) in degrees.
    Spherical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layout {
    Rectilinear,
    Curvilinear,
}

/// A grid ready for weight computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    coord_sys: CoordSys,
    layout: Layout,
    shape: Vec<usize>,
    centers: Vec<Vec<f64>>,
    corners: Option<Vec<Vec<f64>>>,
    mask: Option<Vec<bool>>,
    cyclic: bool,
}

impl Grid {
    /// Create a rectilinear grid from per-axis centre arrays.
    pub fn rectilinear(coord_sys: CoordSys, centers: Vec<Vec<f64>>) -> SolverResult<Self> {
        if centers.is_empty() || centers.len() > 3 {
            return Err(SolverError::invalid_grid(format!(
                "grids must have 1 to 3 axes, got {}",
                centers.len()
            )));
        }
        if coord_sys == CoordSys::Spherical && centers.len() < 2 {
            return Err(SolverError::invalid_grid(
                "spherical grids need longitude and latitude axes",
            ));
        }
        if centers.iter().any(Vec::is_empty) {
            return Err(SolverError::invalid_grid("grid axes must not be empty"));
        }
        let shape = centers.iter().map(Vec::len).collect();
        Ok(Self {
            coord_sys,
            layout: Layout::Rectilinear,
            shape,
            centers,
            corners: None,
            mask: None,
            cyclic: false,
        })
    }

    /// Create a 2-d curvilinear grid from flattened centre arrays.
    pub fn curvilinear(
        coord_sys: CoordSys,
        shape: [usize; 2],
        centers: [Vec<f64>; 2],
    ) -> SolverResult<Self> {
        let size = shape[0] * shape[1];
        if size == 0 {
            return Err(SolverError::invalid_grid("grid axes must not be empty"));
        }
        if centers.iter().any(|c| c.len() != size) {
            return Err(SolverError::invalid_grid(format!(
                "curvilinear centres must have {size} values"
            )));
        }
        Ok(Self {
            coord_sys,
            layout: Layout::Curvilinear,
            shape: shape.to_vec(),
            centers: centers.to_vec(),
            corners: None,
            mask: None,
            cyclic: false,
        })
    }

    /// Mark the x axis as periodic. Must be set before corners are attached.
    pub fn with_cyclic(mut self, cyclic: bool) -> SolverResult<Self> {
        if cyclic && self.coord_sys != CoordSys::Spherical {
            return Err(SolverError::invalid_grid(
                "only spherical longitude can be cyclic",
            ));
        }
        if self.corners.is_some() && cyclic != self.cyclic {
            return Err(SolverError::invalid_grid(
                "cyclicity cannot change after corners are attached",
            ));
        }
        self.cyclic = cyclic;
        Ok(self)
    }

    /// Attach cell corners in the grid's layout.
    pub fn with_corners(mut self, corners: Vec<Vec<f64>>) -> SolverResult<Self> {
        if corners.len() != self.ndim() {
            return Err(SolverError::invalid_grid(format!(
                "expected corners for {} axes, got {}",
                self.ndim(),
                corners.len()
            )));
        }
        let cshape = self.corner_shape();
        for (axis, c) in corners.iter().enumerate() {
            let expected = match self.layout {
                Layout::Rectilinear => cshape[axis],
                Layout::Curvilinear => cshape.iter().product(),
            };
            if c.len() != expected {
                return Err(SolverError::invalid_grid(format!(
                    "axis {axis} corners: expected {expected} values, got {}",
                    c.len()
                )));
            }
        }
        self.corners = Some(corners);
        Ok(self)
    }

    /// Attach a cell mask (`true` = excluded) in solver order.
    pub fn with_mask(mut self, mask: Vec<bool>) -> SolverResult<Self> {
        if mask.len() != self.size() {
            return Err(SolverError::invalid_grid(format!(
                "mask has {} values for {} cells",
                mask.len(),
                self.size()
            )));
        }
        self.mask = Some(mask);
        Ok(self)
    }

    pub fn coord_sys(&self) -> CoordSys {
        self.coord_sys
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn is_curvilinear(&self) -> bool {
        self.layout == Layout::Curvilinear
    }

    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }

    /// Cell counts per axis, solver order.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn centers(&self) -> &[Vec<f64>] {
        &self.centers
    }

    pub fn corners(&self) -> Option<&[Vec<f64>]> {
        self.corners.as_deref()
    }

    pub fn has_corners(&self) -> bool {
        self.corners.is_some()
    }

    pub fn mask(&self) -> Option<&[bool]> {
        self.mask.as_deref()
    }

    pub fn is_masked(&self, idx: usize) -> bool {
        self.mask.as_ref().is_some_and(|m| m[idx])
    }

    /// Corner counts per axis.
    pub fn corner_shape(&self) -> Vec<usize> {
        self.shape
            .iter()
            .enumerate()
            .map(|(axis, &n)| if axis == 0 && self.cyclic { n } else { n + 1 })
            .collect()
    }

    /// Split a flat cell index into per-axis indices.
    #[inline]
    pub fn unravel(&self, mut idx: usize) -> [usize; 3] {
        let mut ijk = [0; 3];
        for (axis, &n) in self.shape.iter().enumerate() {
            ijk[axis] = idx % n;
            idx /= n;
        }
        ijk
    }

    /// Combine per-axis indices into a flat cell index.
    #[inline]
    pub fn ravel(&self, ijk: &[usize]) -> usize {
        let mut idx = 0;
        for axis in (0..self.ndim()).rev() {
            idx = idx * self.shape[axis] + ijk[axis];
        }
        idx
    }

    /// Centre coordinates of a cell; unused trailing axes are 0.
    pub fn point(&self, idx: usize) -> [f64; 3] {
        let mut p = [0.0; 3];
        match self.layout {
            Layout::Rectilinear => {
                let ijk = self.unravel(idx);
                for axis in 0..self.ndim() {
                    p[axis] = self.centers[axis][ijk[axis]];
                }
            }
            Layout::Curvilinear => {
                for axis in 0..self.ndim() {
                    p[axis] = self.centers[axis][idx];
                }
            }
        }
        p
    }

    /// Lower and upper edge of cell `i` along `axis` (rectilinear grids).
    pub fn axis_bounds(&self, axis: usize, i: usize) -> Option<(f64, f64)> {
        if self.layout != Layout::Rectilinear {
            return None;
        }
        let c = self.corners.as_ref()?.get(axis)?;
        let lower = *c.get(i)?;
        let upper = match c.get(i + 1) {
            Some(&u) => u,
            None if axis == 0 && self.cyclic => {
                let direction = if c.len() > 1 && c[1] < c[0] { -1.0 } else { 1.0 };
                c[0] + 360.0 * direction
            }
            None => return None,
        };
        Some((lower, upper))
    }

    /// Horizontal cell outline as raw (x, y) vertices, counter-clockwise in
    /// logical index space. Only for 2-d grids with corners.
    pub fn cell_polygon(&self, idx: usize) -> Option<Vec<[f64; 2]>> {
        if self.ndim() != 2 {
            return None;
        }
        match self.layout {
            Layout::Rectilinear => {
                let [i, j, _] = self.unravel(idx);
                let (x0, x1) = self.axis_bounds(0, i)?;
                let (y0, y1) = self.axis_bounds(1, j)?;
                Some(vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]])
            }
            Layout::Curvilinear => {
                let corners = self.corners.as_ref()?;
                let [i, j, _] = self.unravel(idx);
                let cshape = self.corner_shape();
                let ncx = cshape[0];
                let i1 = if self.cyclic { (i + 1) % ncx } else { i + 1 };
                let at = |ci: usize, cj: usize| {
                    let k = cj * ncx + ci;
                    [corners[0][k], corners[1][k]]
                };
                Some(vec![at(i, j), at(i1, j), at(i1, j + 1), at(i, j + 1)])
            }
        }
    }

    /// Cell measure: length, area or volume. Spherical measures are on the
    /// unit sphere (times the extent of any third axis).
    pub fn cell_measure(&self, idx: usize) -> Option<f64> {
        match self.layout {
            Layout::Rectilinear => {
                let ijk = self.unravel(idx);
                let mut measure = 1.0;
                for axis in 0..self.ndim() {
                    let (lo, hi) = self.axis_bounds(axis, ijk[axis])?;
                    let extent = match (self.coord_sys, axis) {
                        (CoordSys::Spherical, 0) => (hi - lo).abs() * DEG2RAD,
                        (CoordSys::Spherical, 1) => {
                            let (lo, hi) = (lo.clamp(-90.0, 90.0), hi.clamp(-90.0, 90.0));
                            ((hi * DEG2RAD).sin() - (lo * DEG2RAD).sin()).abs()
                        }
                        _ => (hi - lo).abs(),
                    };
                    measure *= extent;
                }
                Some(measure)
            }
            Layout::Curvilinear => {
                let poly = self.cell_polygon(idx)?;
                let area = match self.coord_sys {
                    CoordSys::Spherical => {
                        geometry::signed_area(&geometry::to_sine_space(&poly)).abs() * DEG2RAD
                    }
                    CoordSys::Cartesian => geometry::signed_area(&poly).abs(),
                };
                Some(area)
            }
        }
    }

    /// Whether a cell has a measure at or below the degeneracy threshold.
    /// Grids without corners have no degenerate cells.
    pub fn is_degenerate(&self, idx: usize) -> bool {
        self.cell_measure(idx)
            .is_some_and(|m| m <= geometry::DEGENERATE_AREA)
    }
}
