//! Patch recovery weights.
//!
//! Fits a local polynomial by least squares over the nearest eligible
//! source centres and evaluates it at the destination point. The fit's
//! value at the origin is the first row of the pseudo-inverse of the
//! Vandermonde matrix, which gives the weights directly.

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::error::SolverResult;
use crate::geometry::{wrap_near, DEG2RAD};
use crate::grid::CoordSys;
use crate::linear;
use crate::solve::{Context, Row};

const RANK_TOL: f64 = 1e-10;

pub(crate) fn rows(ctx: &Context<'_>) -> SolverResult<Vec<Row>> {
    let k = match ctx.src.ndim() {
        1 => 4,
        2 => 16,
        _ => 32,
    };
    let rows = (0..ctx.dst.size())
        .into_par_iter()
        .map(|j| {
            if !ctx.dst_ok[j] {
                return None;
            }
            let p = ctx.dst.point(j);
            // Points outside the source domain are not extrapolated.
            linear::locate(ctx.src, &p)?;
            let neighbours = ctx.nearest_sources(&p, k);
            if neighbours.is_empty() {
                return None;
            }
            let offsets: Vec<Vec<f64>> = neighbours
                .iter()
                .map(|&i| local_offset(ctx, &ctx.src_points[i], &p))
                .collect();
            let weights = fit(&offsets, 2)
                .or_else(|| fit(&offsets, 1))
                .unwrap_or_else(|| {
                    let mut w = vec![0.0; offsets.len()];
                    w[0] = 1.0;
                    w
                });
            Some(neighbours.into_iter().zip(weights).collect())
        })
        .collect();
    Ok(rows)
}

/// Offset of a source centre from the destination point in local
/// coordinates (a tangent plane for spherical grids).
fn local_offset(ctx: &Context<'_>, q: &[f64; 3], p: &[f64; 3]) -> Vec<f64> {
    let nd = ctx.src.ndim();
    match ctx.src.coord_sys() {
        CoordSys::Cartesian => (0..nd).map(|a| q[a] - p[a]).collect(),
        CoordSys::Spherical => {
            let mut d = Vec::with_capacity(nd);
            d.push(wrap_near(q[0] - p[0], 0.0) * (p[1] * DEG2RAD).cos());
            d.push(q[1] - p[1]);
            for a in 2..nd {
                d.push(q[a] - p[a]);
            }
            d
        }
    }
}

/// Least-squares weights of a polynomial of `degree` evaluated at the
/// origin. `None` when the points cannot determine the polynomial.
fn fit(offsets: &[Vec<f64>], degree: usize) -> Option<Vec<f64>> {
    let nd = offsets.first()?.len();
    // Axes along which every neighbour shares the destination coordinate
    // carry no information.
    let active: Vec<usize> = (0..nd)
        .filter(|&a| offsets.iter().any(|o| o[a] != 0.0))
        .collect();
    let scale = offsets
        .iter()
        .flat_map(|o| o.iter())
        .fold(0.0_f64, |m, v| m.max(v.abs()))
        .max(f64::MIN_POSITIVE);

    let terms = |o: &Vec<f64>| -> Vec<f64> {
        let x: Vec<f64> = active.iter().map(|&a| o[a] / scale).collect();
        let mut t = vec![1.0];
        t.extend(x.iter().copied());
        if degree >= 2 {
            for a in 0..x.len() {
                for b in a..x.len() {
                    t.push(x[a] * x[b]);
                }
            }
        }
        t
    };

    let rows: Vec<Vec<f64>> = offsets.iter().map(terms).collect();
    let ncols = rows[0].len();
    if rows.len() < ncols {
        return None;
    }
    let a = DMatrix::from_fn(rows.len(), ncols, |r, c| rows[r][c]);
    let svd = a.svd(true, true);
    let max_sv = svd.singular_values.max();
    if svd.rank(RANK_TOL * max_sv.max(1.0)) < ncols {
        return None;
    }
    let pinv = svd.pseudo_inverse(RANK_TOL).ok()?;
    Some(pinv.row(0).iter().copied().collect())
}
