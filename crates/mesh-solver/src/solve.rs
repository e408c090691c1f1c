//! Weight computation entry point.

use rayon::prelude::*;

use crate::conservative;
use crate::error::{SolverError, SolverResult};
use crate::geometry;
use crate::grid::Grid;
use crate::linear;
use crate::method::{SolverMethod, SolverParams, UnmappedAction};
use crate::nearest;
use crate::patch;
use crate::weights::{RegridWeights, WeightMatrix};

/// One destination row: `(source index, weight)` pairs. `None` = unmapped.
pub(crate) type Row = Option<Vec<(usize, f64)>>;

/// Shared state of a non-conservative weight computation.
pub(crate) struct Context<'a> {
    pub src: &'a Grid,
    pub dst: &'a Grid,
    /// Source cells that may contribute (unmasked, non-degenerate).
    pub src_ok: Vec<bool>,
    /// Destination cells that should be mapped.
    pub dst_ok: Vec<bool>,
    pub src_points: Vec<[f64; 3]>,
}

impl<'a> Context<'a> {
    pub fn new(src: &'a Grid, dst: &'a Grid) -> Self {
        let src_ok = (0..src.size())
            .into_par_iter()
            .map(|i| !src.is_masked(i) && !src.is_degenerate(i))
            .collect();
        let dst_ok = (0..dst.size())
            .into_par_iter()
            .map(|j| !dst.is_masked(j) && !dst.is_degenerate(j))
            .collect();
        let src_points = (0..src.size()).map(|i| src.point(i)).collect();
        Self {
            src,
            dst,
            src_ok,
            dst_ok,
            src_points,
        }
    }

    /// Squared distance between a source cell centre and a point.
    #[inline]
    pub fn distance2(&self, src_idx: usize, p: &[f64; 3]) -> f64 {
        let nd = self.src.ndim();
        geometry::squared_distance(
            self.src.coord_sys(),
            &self.src_points[src_idx][..nd],
            &p[..nd],
        )
    }

    /// Nearest eligible source to `p`; ties go to the lowest index.
    pub fn nearest_source(&self, p: &[f64; 3]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for i in 0..self.src.size() {
            if !self.src_ok[i] {
                continue;
            }
            let d = self.distance2(i, p);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Up to `k` nearest eligible sources, closest first.
    pub fn nearest_sources(&self, p: &[f64; 3], k: usize) -> Vec<usize> {
        let mut candidates: Vec<(f64, usize)> = (0..self.src.size())
            .filter(|&i| self.src_ok[i])
            .map(|i| (self.distance2(i, p), i))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        candidates.truncate(k);
        candidates.into_iter().map(|(_, i)| i).collect()
    }
}

/// Compute regridding weights from `src` to `dst`.
///
/// # Arguments
/// * `src` - Source grid, with its mask applied when the source mask is in use
/// * `dst` - Destination grid
/// * `params` - Method, unmapped-destination policy and degeneracy handling
///
/// # Returns
/// The sparse weight matrix together with source and destination fractions.
pub fn compute_weights(src: &Grid, dst: &Grid, params: &SolverParams) -> SolverResult<RegridWeights> {
    check_pair(src, dst)?;

    let ctx = Context::new(src, dst);
    let rows = match params.method {
        SolverMethod::Bilinear => linear::rows(&ctx)?,
        SolverMethod::Patch => patch::rows(&ctx)?,
        SolverMethod::NearestStod => nearest::stod_rows(&ctx),
        SolverMethod::NearestDtos => nearest::dtos_rows(&ctx),
        SolverMethod::Conserve => return conservative::weights(src, dst, params, false),
        SolverMethod::Conserve2nd => return conservative::weights(src, dst, params, true),
    };
    finish(&ctx, rows, params.unmapped_action)
}

fn check_pair(src: &Grid, dst: &Grid) -> SolverResult<()> {
    if src.coord_sys() != dst.coord_sys() {
        return Err(SolverError::incompatible(format!(
            "source is {:?} but destination is {:?}",
            src.coord_sys(),
            dst.coord_sys()
        )));
    }
    if src.ndim() != dst.ndim() {
        return Err(SolverError::incompatible(format!(
            "source has {} axes but destination has {}",
            src.ndim(),
            dst.ndim()
        )));
    }
    Ok(())
}

/// Fail when unmapped destinations are not allowed.
pub(crate) fn check_unmapped(count: usize, action: UnmappedAction) -> SolverResult<()> {
    if count > 0 && action == UnmappedAction::Error {
        return Err(SolverError::Unmapped { count });
    }
    Ok(())
}

fn finish(ctx: &Context<'_>, rows: Vec<Row>, action: UnmappedAction) -> SolverResult<RegridWeights> {
    let unmapped = rows
        .iter()
        .zip(&ctx.dst_ok)
        .filter(|(row, &ok)| ok && row.is_none())
        .count();
    check_unmapped(unmapped, action)?;

    let mut triples = Vec::new();
    let mut dst_frac = vec![0.0; ctx.dst.size()];
    for (j, row) in rows.into_iter().enumerate() {
        if let Some(row) = row {
            dst_frac[j] = 1.0;
            triples.extend(row.into_iter().map(|(i, w)| (j, i, w)));
        }
    }
    let src_frac = ctx
        .src_ok
        .iter()
        .map(|&ok| if ok { 1.0 } else { 0.0 })
        .collect();

    Ok(RegridWeights {
        matrix: WeightMatrix::from_triples(ctx.dst.size(), ctx.src.size(), triples),
        src_frac,
        dst_frac,
        src_area: None,
        dst_area: None,
    })
}
