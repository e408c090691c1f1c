//! Nearest-neighbour weights.

use rayon::prelude::*;

use crate::geometry;
use crate::solve::{Context, Row};

/// Each destination takes its nearest eligible source.
pub(crate) fn stod_rows(ctx: &Context<'_>) -> Vec<Row> {
    (0..ctx.dst.size())
        .into_par_iter()
        .map(|j| {
            if !ctx.dst_ok[j] {
                return None;
            }
            let p = ctx.dst.point(j);
            ctx.nearest_source(&p).map(|i| vec![(i, 1.0)])
        })
        .collect()
}

/// Each eligible source is pushed to its nearest destination. Destinations
/// reached by several sources average them; destinations reached by none
/// fall back to their nearest source.
pub(crate) fn dtos_rows(ctx: &Context<'_>) -> Vec<Row> {
    let nd = ctx.dst.ndim();
    let dst_points: Vec<[f64; 3]> = (0..ctx.dst.size()).map(|j| ctx.dst.point(j)).collect();
    let coord_sys = ctx.dst.coord_sys();

    let targets: Vec<Option<usize>> = (0..ctx.src.size())
        .into_par_iter()
        .map(|i| {
            if !ctx.src_ok[i] {
                return None;
            }
            let q = &ctx.src_points[i];
            let mut best: Option<(usize, f64)> = None;
            for (j, p) in dst_points.iter().enumerate() {
                if !ctx.dst_ok[j] {
                    continue;
                }
                let d = geometry::squared_distance(coord_sys, &q[..nd], &p[..nd]);
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((j, d));
                }
            }
            best.map(|(j, _)| j)
        })
        .collect();

    let mut pushed: Vec<Vec<usize>> = vec![Vec::new(); ctx.dst.size()];
    for (i, target) in targets.into_iter().enumerate() {
        if let Some(j) = target {
            pushed[j].push(i);
        }
    }

    pushed
        .into_par_iter()
        .enumerate()
        .map(|(j, sources)| {
            if !ctx.dst_ok[j] {
                return None;
            }
            if sources.is_empty() {
                return ctx.nearest_source(&dst_points[j]).map(|i| vec![(i, 1.0)]);
            }
            let w = 1.0 / sources.len() as f64;
            Some(sources.into_iter().map(|i| (i, w)).collect())
        })
        .collect()
}
