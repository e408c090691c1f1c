//! Multilinear interpolation weights.
//!
//! Rectilinear sources use separable per-axis brackets. Curvilinear sources
//! locate the destination point inside a quad of neighbouring source
//! centres and invert the bilinear map.

use rayon::prelude::*;

use crate::error::SolverResult;
use crate::geometry::wrap_near;
use crate::grid::{CoordSys, Grid};
use crate::solve::{Context, Row};

const TOL: f64 = 1e-9;

/// Interpolation stencil along one axis.
pub(crate) type Stencil = Vec<(usize, f64)>;

pub(crate) fn rows(ctx: &Context<'_>) -> SolverResult<Vec<Row>> {
    let rows = (0..ctx.dst.size())
        .into_par_iter()
        .map(|j| {
            if !ctx.dst_ok[j] {
                return None;
            }
            let p = ctx.dst.point(j);
            let row = locate(ctx.src, &p)?;
            row.iter().all(|&(i, _)| ctx.src_ok[i]).then_some(row)
        })
        .collect();
    Ok(rows)
}

/// Interpolation weights of `p` over source cells, ignoring masks.
/// `None` when `p` lies outside the source domain.
pub(crate) fn locate(src: &Grid, p: &[f64; 3]) -> Option<Vec<(usize, f64)>> {
    if src.is_curvilinear() {
        let (corners, weights) = locate_in_quads(src, [p[0], p[1]])?;
        let row: Vec<(usize, f64)> = corners
            .into_iter()
            .zip(weights)
            .filter(|&(_, w)| w.abs() > TOL)
            .collect();
        return Some(row);
    }

    let mut stencils = Vec::with_capacity(src.ndim());
    for axis in 0..src.ndim() {
        stencils.push(axis_stencil(src, axis, p[axis])?);
    }
    Some(combine(src, &stencils))
}

/// Bracket `x` along one axis of a rectilinear grid.
pub(crate) fn axis_stencil(grid: &Grid, axis: usize, x: f64) -> Option<Stencil> {
    let c = &grid.centers()[axis];
    if grid.coord_sys() == CoordSys::Spherical && axis == 0 {
        if grid.is_cyclic() {
            return periodic_bracket(c, x);
        }
        return [x, x - 360.0, x + 360.0]
            .into_iter()
            .find_map(|v| bracket(c, v));
    }
    bracket(c, x)
}

/// Bracket `x` in a monotonic (increasing or decreasing) array.
pub(crate) fn bracket(c: &[f64], x: f64) -> Option<Stencil> {
    let n = c.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        let tol = TOL * c[0].abs().max(1.0);
        return ((x - c[0]).abs() <= tol).then(|| vec![(0, 1.0)]);
    }

    let increasing = c[n - 1] >= c[0];
    let (lo, hi) = if increasing {
        (c[0], c[n - 1])
    } else {
        (c[n - 1], c[0])
    };
    let tol = TOL * (hi - lo).abs().max(1.0);
    if x < lo - tol || x > hi + tol {
        return None;
    }

    let k = if increasing {
        c.partition_point(|&v| v <= x)
    } else {
        c.partition_point(|&v| v >= x)
    };
    let i = k.clamp(1, n - 1) - 1;
    let t = ((x - c[i]) / (c[i + 1] - c[i])).clamp(0.0, 1.0);
    Some(two_point(i, i + 1, t))
}

/// Bracket a longitude on a periodic axis, including the wrap interval
/// between the last and first centres.
fn periodic_bracket(c: &[f64], x: f64) -> Option<Stencil> {
    let n = c.len();
    let direction = if n > 1 && c[1] < c[0] { -1.0 } else { 1.0 };
    let mut extended = c.to_vec();
    extended.push(c[0] + 360.0 * direction);
    let lo = extended[0].min(extended[n]);
    let x = lo + (x - lo).rem_euclid(360.0);
    let stencil = bracket(&extended, x)?;
    Some(stencil.into_iter().map(|(i, w)| (i % n, w)).collect())
}

fn two_point(i0: usize, i1: usize, t: f64) -> Stencil {
    if t <= TOL {
        vec![(i0, 1.0)]
    } else if t >= 1.0 - TOL {
        vec![(i1, 1.0)]
    } else {
        vec![(i0, 1.0 - t), (i1, t)]
    }
}

/// Tensor product of per-axis stencils into flat source indices.
fn combine(grid: &Grid, stencils: &[Stencil]) -> Vec<(usize, f64)> {
    let mut acc: Vec<([usize; 3], f64)> = vec![([0; 3], 1.0)];
    for (axis, stencil) in stencils.iter().enumerate() {
        let mut next = Vec::with_capacity(acc.len() * stencil.len());
        for (ijk, w) in &acc {
            for &(i, wi) in stencil {
                let mut ijk = *ijk;
                ijk[axis] = i;
                next.push((ijk, w * wi));
            }
        }
        acc = next;
    }
    acc.into_iter()
        .map(|(ijk, w)| (grid.ravel(&ijk[..grid.ndim()]), w))
        .collect()
}

/// Find the quad of source centres containing `p` and its bilinear weights.
fn locate_in_quads(src: &Grid, p: [f64; 2]) -> Option<([usize; 4], [f64; 4])> {
    let (nx, ny) = (src.shape()[0], src.shape()[1]);
    if ny < 2 || nx < 2 {
        return None;
    }
    let spherical = src.coord_sys() == CoordSys::Spherical;
    let quads_x = if src.is_cyclic() { nx } else { nx - 1 };
    let centers = src.centers();

    for j in 0..ny - 1 {
        for i in 0..quads_x {
            let i1 = (i + 1) % nx;
            let idx = [j * nx + i, j * nx + i1, (j + 1) * nx + i1, (j + 1) * nx + i];
            let mut quad = [[0.0; 2]; 4];
            for (q, &k) in quad.iter_mut().zip(&idx) {
                let x = centers[0][k];
                *q = [if spherical { wrap_near(x, p[0]) } else { x }, centers[1][k]];
            }
            if !in_bbox(&quad, p) {
                continue;
            }
            if let Some((s, t)) = inverse_bilinear(&quad, p) {
                let w = [(1.0 - s) * (1.0 - t), s * (1.0 - t), s * t, (1.0 - s) * t];
                return Some((idx, w));
            }
        }
    }
    None
}

fn in_bbox(quad: &[[f64; 2]; 4], p: [f64; 2]) -> bool {
    let (mut x0, mut x1, mut y0, mut y1) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for q in quad {
        x0 = x0.min(q[0]);
        x1 = x1.max(q[0]);
        y0 = y0.min(q[1]);
        y1 = y1.max(q[1]);
    }
    let tol = TOL * (x1 - x0).abs().max(y1 - y0).max(1.0);
    p[0] >= x0 - tol && p[0] <= x1 + tol && p[1] >= y0 - tol && p[1] <= y1 + tol
}

/// Newton inversion of the bilinear map of a quad; `(s, t)` in the unit
/// square when `p` lies inside.
fn inverse_bilinear(quad: &[[f64; 2]; 4], p: [f64; 2]) -> Option<(f64, f64)> {
    let [p0, p1, p2, p3] = *quad;
    let (mut s, mut t) = (0.5, 0.5);
    for _ in 0..30 {
        let fx = (1.0 - s) * (1.0 - t) * p0[0] + s * (1.0 - t) * p1[0] + s * t * p2[0]
            + (1.0 - s) * t * p3[0]
            - p[0];
        let fy = (1.0 - s) * (1.0 - t) * p0[1] + s * (1.0 - t) * p1[1] + s * t * p2[1]
            + (1.0 - s) * t * p3[1]
            - p[1];
        let dxs = (1.0 - t) * (p1[0] - p0[0]) + t * (p2[0] - p3[0]);
        let dys = (1.0 - t) * (p1[1] - p0[1]) + t * (p2[1] - p3[1]);
        let dxt = (1.0 - s) * (p3[0] - p0[0]) + s * (p2[0] - p1[0]);
        let dyt = (1.0 - s) * (p3[1] - p0[1]) + s * (p2[1] - p1[1]);
        let det = dxs * dyt - dxt * dys;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let ds = (fx * dyt - fy * dxt) / det;
        let dt = (fy * dxs - fx * dys) / det;
        s -= ds;
        t -= dt;
        if ds.abs() < 1e-13 && dt.abs() < 1e-13 {
            break;
        }
    }
    let inside = |v: f64| (-TOL..=1.0 + TOL).contains(&v);
    (inside(s) && inside(t)).then(|| (s.clamp(0.0, 1.0), t.clamp(0.0, 1.0)))
}
