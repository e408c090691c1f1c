//! Solver grid construction.
//!
//! Turns extracted coordinates, bounds and masks into [`mesh_solver::Grid`]s:
//! cell centres in solver order (x fastest), a shared corner mesh stitched
//! from per-cell bounds, the cyclic flag and the cell mask.

use cf_model::AxisOrder;
use mesh_solver::{CoordSys, Grid};
use ndarray::{Array3, ArrayD, Ix3};
use tracing::warn;

use crate::error::{RegridError, Result};
use crate::extract::{CartesianCoords, SphericalCoords};
use crate::method::RegridMethod;
use crate::types::GridRole;

/// Longitude period in degrees.
pub const PERIOD: f64 = 360.0;

/// Builds solver grids, checking bounds with a fixed tolerance.
#[derive(Debug, Clone, Copy)]
pub struct GridBuilder {
    tolerance: f64,
}

impl GridBuilder {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Build a spherical grid.
    ///
    /// # Arguments
    /// * `coords` - Extracted longitude/latitude coordinates and bounds
    /// * `cyclic` - Explicit cyclicity, or `None` to detect it from bounds
    /// * `mask` - Cell mask in solver order (`true` = excluded)
    /// * `method` - Conservative methods get a corner mesh
    /// * `role` - Used in error messages
    pub fn spherical(
        &self,
        coords: &SphericalCoords,
        cyclic: Option<bool>,
        mask: Option<Vec<bool>>,
        method: RegridMethod,
        role: GridRole,
    ) -> Result<Grid> {
        let [nx, ny] = coords.sizes;
        let mut is_cyclic = match cyclic {
            Some(c) => c,
            None => self.detect(coords),
        };

        let corners = if method.is_conservative() {
            let lon_b = coords
                .lon_bounds
                .as_ref()
                .ok_or_else(|| RegridError::bounds(role, "are missing for longitude"))?;
            let lat_b = coords
                .lat_bounds
                .as_ref()
                .ok_or_else(|| RegridError::bounds(role, "are missing for latitude"))?
                .mapv(|v| v.clamp(-90.0, 90.0));
            Some(match coords.coord_order {
                None => self.corners_1d(lon_b, &lat_b, is_cyclic, role)?,
                Some(order) => self.corners_2d(lon_b, &lat_b, order, is_cyclic, role)?,
            })
        } else {
            if is_cyclic && cyclic.is_none() {
                if let Some(lon_b) = &coords.lon_bounds {
                    if !contiguous_bounds(lon_b, true, self.tolerance).unwrap_or(false) {
                        warn!(%role, "Longitude bounds are not contiguous; grid is not cyclic");
                        is_cyclic = false;
                    }
                }
            }
            None
        };

        let grid = match coords.coord_order {
            None => Grid::rectilinear(
                CoordSys::Spherical,
                vec![
                    coords.lon.values().iter().copied().collect(),
                    coords.lat.values().iter().copied().collect(),
                ],
            )?,
            Some(order) => Grid::curvilinear(
                CoordSys::Spherical,
                [nx, ny],
                [
                    solver_order_2d(coords.lon.values(), order),
                    solver_order_2d(coords.lat.values(), order),
                ],
            )?,
        };
        finish(grid.with_cyclic(is_cyclic)?, corners, mask)
    }

    /// Build a Cartesian grid. A single axis is padded with a leading
    /// size-1 axis centred on 0 so the solver always sees at least 2 axes.
    pub fn cartesian(
        &self,
        coords: &CartesianCoords,
        mask: Option<Vec<bool>>,
        method: RegridMethod,
        role: GridRole,
    ) -> Result<Grid> {
        let mut centers: Vec<Vec<f64>> = coords
            .coords
            .iter()
            .map(|c| c.values().iter().copied().collect())
            .collect();

        let mut corners = if method.is_conservative() {
            let mut out = Vec::with_capacity(centers.len());
            for (bounds, axis) in coords.bounds.iter().zip(&coords.axis_keys) {
                let b = bounds.as_ref().ok_or_else(|| {
                    RegridError::bounds(role, format!("are missing for axis '{axis}'"))
                })?;
                check_1d_shape(b, role)?;
                if !contiguous_bounds(b, false, self.tolerance).map_err(|m| RegridError::bounds(role, m))? {
                    return Err(RegridError::bounds(
                        role,
                        format!("are not contiguous along axis '{axis}'"),
                    ));
                }
                out.push(stitch_1d(b, false));
            }
            Some(out)
        } else {
            None
        };

        if centers.len() == 1 {
            let eps = f64::from(f32::EPSILON);
            centers.insert(0, vec![0.0]);
            if let Some(c) = corners.as_mut() {
                c.insert(0, vec![-eps, eps]);
            }
        }

        finish(Grid::rectilinear(CoordSys::Cartesian, centers)?, corners, mask)
    }

    fn detect(&self, coords: &SphericalCoords) -> bool {
        let Some(lon_b) = &coords.lon_bounds else {
            return false;
        };
        match coords.coord_order {
            None => detect_cyclic(lon_b, self.tolerance),
            Some(order) => match cf_frame(lon_b, order) {
                Some(b) => {
                    let nx = b.shape()[1];
                    b.outer_iter().all(|row| {
                        let span = (row[[nx - 1, 1]] - row[[0, 0]]).abs();
                        (span - PERIOD).abs() <= self.tolerance
                    })
                }
                None => false,
            },
        }
    }

    fn corners_1d(
        &self,
        lon_b: &ArrayD<f64>,
        lat_b: &ArrayD<f64>,
        cyclic: bool,
        role: GridRole,
    ) -> Result<Vec<Vec<f64>>> {
        check_1d_shape(lon_b, role)?;
        check_1d_shape(lat_b, role)?;
        for (b, name, periodic) in [(lon_b, "longitude", cyclic), (lat_b, "latitude", false)] {
            if !contiguous_bounds(b, periodic, self.tolerance).map_err(|m| RegridError::bounds(role, m))? {
                return Err(RegridError::bounds(
                    role,
                    format!("are not contiguous for {name}"),
                ));
            }
        }
        Ok(vec![stitch_1d(lon_b, cyclic), stitch_1d(lat_b, false)])
    }

    fn corners_2d(
        &self,
        lon_b: &ArrayD<f64>,
        lat_b: &ArrayD<f64>,
        order: AxisOrder,
        cyclic: bool,
        role: GridRole,
    ) -> Result<Vec<Vec<f64>>> {
        let frame = |b: &ArrayD<f64>| {
            cf_frame(b, order).ok_or_else(|| {
                RegridError::bounds(
                    role,
                    format!(
                        "of 2-d cells with shape {:?} cannot be checked for contiguity",
                        b.shape()
                    ),
                )
            })
        };
        let lon = frame(lon_b)?;
        let lat = frame(lat_b)?;
        for (b, name, periodic) in [(&lon, "longitude", cyclic), (&lat, "latitude", false)] {
            if !contiguous_quads(b, periodic, self.tolerance) {
                return Err(RegridError::bounds(
                    role,
                    format!("are not contiguous for {name}"),
                ));
            }
        }
        Ok(vec![stitch_2d(&lon, cyclic), stitch_2d(&lat, cyclic)])
    }
}

fn finish(mut grid: Grid, corners: Option<Vec<Vec<f64>>>, mask: Option<Vec<bool>>) -> Result<Grid> {
    if let Some(c) = corners {
        grid = grid.with_corners(c)?;
    }
    if let Some(m) = mask {
        grid = grid.with_mask(m)?;
    }
    Ok(grid)
}

/// Whether 1-d longitude bounds span exactly one period.
pub fn detect_cyclic(lon_bounds: &ArrayD<f64>, tolerance: f64) -> bool {
    let shape = lon_bounds.shape();
    if shape.len() != 2 || shape[0] == 0 || shape[1] != 2 {
        return false;
    }
    let n = shape[0];
    let span = (lon_bounds[[n - 1, 1]] - lon_bounds[[0, 0]]).abs();
    (span - PERIOD).abs() <= tolerance
}

/// Whether adjacent cells share their edges.
///
/// Accepts 1-d cell bounds `(n, 2)` and 2-d quadrilateral bounds
/// `(nj, ni, 4)` in CF vertex order. With `cyclic`, edges may differ by
/// whole periods.
pub fn contiguous_bounds(
    bounds: &ArrayD<f64>,
    cyclic: bool,
    tolerance: f64,
) -> std::result::Result<bool, String> {
    match bounds.ndim() {
        2 => {
            let n = bounds.shape()[0];
            Ok((1..n).all(|k| {
                close(bounds[[k, 0]], bounds[[k - 1, 1]], cyclic, tolerance)
            }))
        }
        3 => {
            let nv = bounds.shape()[2];
            if nv != 4 {
                return Err(format!(
                    "of 2-d cells with {nv} vertices cannot be checked for contiguity"
                ));
            }
            let b = bounds
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(|e| e.to_string())?;
            Ok(contiguous_quads(&b.to_owned(), cyclic, tolerance))
        }
        n => Err(format!("with {n} dimensions are not cell bounds")),
    }
}

fn contiguous_quads(b: &Array3<f64>, cyclic: bool, tol: f64) -> bool {
    let (nj, ni, _) = b.dim();
    for j in 0..nj {
        for i in 0..ni {
            if i + 1 < ni
                && !(close(b[[j, i, 1]], b[[j, i + 1, 0]], cyclic, tol)
                    && close(b[[j, i, 2]], b[[j, i + 1, 3]], cyclic, tol))
            {
                return false;
            }
            if j + 1 < nj
                && !(close(b[[j, i, 3]], b[[j + 1, i, 0]], cyclic, tol)
                    && close(b[[j, i, 2]], b[[j + 1, i, 1]], cyclic, tol))
            {
                return false;
            }
        }
    }
    true
}

fn close(a: f64, b: f64, cyclic: bool, tol: f64) -> bool {
    let mut d = a - b;
    if cyclic {
        d -= PERIOD * (d / PERIOD).round();
    }
    d.abs() <= tol
}

fn check_1d_shape(b: &ArrayD<f64>, role: GridRole) -> Result<()> {
    if b.ndim() != 2 || b.shape()[1] != 2 || b.shape()[0] == 0 {
        return Err(RegridError::bounds(
            role,
            format!("of 1-d cells must have shape (n, 2), got {:?}", b.shape()),
        ));
    }
    Ok(())
}

/// n+1 corners from (n, 2) bounds; n when cyclic, the wrap corner shared.
fn stitch_1d(b: &ArrayD<f64>, cyclic: bool) -> Vec<f64> {
    let n = b.shape()[0];
    let mut corners: Vec<f64> = (0..n).map(|i| b[[i, 0]]).collect();
    if !cyclic {
        corners.push(b[[n - 1, 1]]);
    }
    corners
}

/// Corner mesh from (ny, nx, 4) quads, flattened with x fastest. The wrap
/// column is dropped when cyclic.
fn stitch_2d(b: &Array3<f64>, cyclic: bool) -> Vec<f64> {
    let (ny, nx, _) = b.dim();
    let ncx = if cyclic { nx } else { nx + 1 };
    let mut corners = Vec::with_capacity((ny + 1) * ncx);
    for cj in 0..=ny {
        for ci in 0..ncx {
            let v = match (cj < ny, ci < nx) {
                (true, true) => b[[cj, ci, 0]],
                (true, false) => b[[cj, nx - 1, 1]],
                (false, true) => b[[ny - 1, ci, 3]],
                (false, false) => b[[ny - 1, nx - 1, 2]],
            };
            corners.push(v);
        }
    }
    corners
}

/// 2-d quad bounds as (ny, nx, 4) in CF vertex order.
///
/// Bounds stored with X first are transposed, which swaps vertices 1 and 3.
fn cf_frame(b: &ArrayD<f64>, order: AxisOrder) -> Option<Array3<f64>> {
    let b = b.view().into_dimensionality::<Ix3>().ok()?;
    let (n0, n1, nv) = b.dim();
    if nv != 4 {
        return None;
    }
    Some(match order {
        AxisOrder::YX => b.to_owned(),
        AxisOrder::XY => {
            const VERTEX: [usize; 4] = [0, 3, 2, 1];
            Array3::from_shape_fn((n1, n0, 4), |(j, i, v)| b[[i, j, VERTEX[v]]])
        }
    })
}

/// 2-d coordinate values flattened with x fastest.
fn solver_order_2d(values: &ArrayD<f64>, order: AxisOrder) -> Vec<f64> {
    match order {
        AxisOrder::YX => values.iter().copied().collect(),
        AxisOrder::XY => values.t().iter().copied().collect(),
    }
}
