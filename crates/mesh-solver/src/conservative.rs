//! Conservative remapping weights.
//!
//! `weight(j, i) = overlap(i, j) / area(j)`. Rectilinear grid pairs
//! intersect axis by axis; any pairing involving a curvilinear grid clips
//! cell polygons. Spherical cells live in (longitude, sin latitude) space.
//!
//! Second order adds a gradient correction: each source cell's gradient is
//! a least-squares fit over its logical neighbours, evaluated at the overlap
//! centroid.

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::error::{SolverError, SolverResult};
use crate::geometry::{
    self, clip_polygon, interval_overlap, make_ccw, overlap_midpoint, shift_lon, signed_area,
    to_sine_space, wrap_near, DEG2RAD, DEGENERATE_AREA,
};
use crate::grid::{CoordSys, Grid};
use crate::method::SolverParams;
use crate::solve::check_unmapped;
use crate::weights::{RegridWeights, WeightMatrix};

/// Overlaps smaller than this fraction of the destination cell are dropped.
const OVERLAP_TOL: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct Overlap {
    src: usize,
    area: f64,
    /// Centroid in the source cell's frame.
    centroid: [f64; 3],
}

/// Neighbour contributions to one source cell's gradient.
type GradientStencil = Vec<(usize, [f64; 3])>;

pub(crate) fn weights(
    src: &Grid,
    dst: &Grid,
    params: &SolverParams,
    second_order: bool,
) -> SolverResult<RegridWeights> {
    for (grid, name) in [(src, "source"), (dst, "destination")] {
        if !grid.has_corners() {
            return Err(SolverError::MissingCorners {
                grid: name.to_string(),
                method: params.method.to_string(),
            });
        }
    }

    let src_area = measures(src)?;
    let dst_area = measures(dst)?;

    let src_ok = eligible(src, &src_area, "source", params.ignore_degenerate)?;
    let dst_ok = eligible(dst, &dst_area, "destination", params.ignore_degenerate)?;

    let overlaps = if !src.is_curvilinear() && !dst.is_curvilinear() {
        separable_overlaps(src, dst)
    } else if src.ndim() == 2 {
        polygon_overlaps(src, dst)
    } else {
        return Err(SolverError::unsupported(
            "conservative remapping of curvilinear grids needs 2 axes",
        ));
    };

    let gradients = second_order.then(|| gradient_stencils(src, &src_ok));
    let centroids: Vec<[f64; 3]> = (0..src.size()).map(|i| cell_centroid(src, i)).collect();

    let mut triples = Vec::new();
    let mut dst_frac = vec![0.0; dst.size()];
    let mut src_frac = vec![0.0; src.size()];
    for (j, cell_overlaps) in overlaps.iter().enumerate() {
        if !dst_ok[j] {
            continue;
        }
        for ov in cell_overlaps {
            let i = ov.src;
            if !src_ok[i] {
                continue;
            }
            let frac = ov.area / dst_area[j];
            if frac <= OVERLAP_TOL {
                continue;
            }
            dst_frac[j] += frac;
            src_frac[i] += ov.area / src_area[i];
            triples.push((j, i, frac));

            if let Some(Some(stencil)) = gradients.as_ref().map(|g| &g[i]) {
                let r = offset(src.coord_sys(), &ov.centroid, &centroids[i]);
                for (n, g) in stencil {
                    let coef = frac * (r[0] * g[0] + r[1] * g[1] + r[2] * g[2]);
                    triples.push((j, *n, coef));
                    triples.push((j, i, -coef));
                }
            }
        }
    }

    let unmapped = (0..dst.size())
        .filter(|&j| dst_ok[j] && dst_frac[j] == 0.0)
        .count();
    check_unmapped(unmapped, params.unmapped_action)?;

    Ok(RegridWeights {
        matrix: WeightMatrix::from_triples(dst.size(), src.size(), triples),
        src_frac,
        dst_frac,
        src_area: Some(src_area),
        dst_area: Some(dst_area),
    })
}

fn measures(grid: &Grid) -> SolverResult<Vec<f64>> {
    (0..grid.size())
        .into_par_iter()
        .map(|i| {
            grid.cell_measure(i)
                .ok_or_else(|| SolverError::invalid_grid(format!("cell {i} has no measure")))
        })
        .collect()
}

/// Cells that take part: unmasked and non-degenerate. Degenerate unmasked
/// cells are an error unless `ignore_degenerate` is set.
fn eligible(grid: &Grid, area: &[f64], name: &str, ignore_degenerate: bool) -> SolverResult<Vec<bool>> {
    let degenerate = (0..grid.size())
        .filter(|&i| !grid.is_masked(i) && area[i] <= DEGENERATE_AREA)
        .count();
    if degenerate > 0 && !ignore_degenerate {
        return Err(SolverError::DegenerateCells {
            grid: name.to_string(),
            count: degenerate,
        });
    }
    Ok((0..grid.size())
        .map(|i| !grid.is_masked(i) && area[i] > DEGENERATE_AREA)
        .collect())
}

/// Offset between two points in gradient space, unwrapping longitude.
fn offset(coord_sys: CoordSys, a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    let mut d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    if coord_sys == CoordSys::Spherical {
        d[0] = wrap_near(d[0], 0.0);
    }
    d
}

/// Cell centroid in gradient space: (lon°, sin lat, z) or plain coordinates.
fn cell_centroid(grid: &Grid, idx: usize) -> [f64; 3] {
    let spherical = grid.coord_sys() == CoordSys::Spherical;
    if grid.is_curvilinear() {
        let Some(poly) = grid.cell_polygon(idx) else {
            return grid.point(idx);
        };
        let poly = if spherical { to_sine_space(&poly) } else { poly };
        return match geometry::centroid(&poly) {
            Some([x, y]) => [x, y, 0.0],
            None => [poly[0][0], poly[0][1], 0.0],
        };
    }

    let ijk = grid.unravel(idx);
    let mut c = [0.0; 3];
    for axis in 0..grid.ndim() {
        let Some((lo, hi)) = grid.axis_bounds(axis, ijk[axis]) else {
            c[axis] = grid.point(idx)[axis];
            continue;
        };
        c[axis] = if spherical && axis == 1 {
            0.5 * (sin_deg(lo) + sin_deg(hi))
        } else {
            0.5 * (lo + hi)
        };
    }
    c
}

#[inline]
fn sin_deg(lat: f64) -> f64 {
    (lat.clamp(-90.0, 90.0) * DEG2RAD).sin()
}

// === Rectilinear pairs ===

/// Per destination index along one axis: `(source index, measure, midpoint)`.
type AxisOverlaps = Vec<Vec<(usize, f64, f64)>>;

fn separable_overlaps(src: &Grid, dst: &Grid) -> Vec<Vec<Overlap>> {
    let per_axis: Vec<AxisOverlaps> = (0..dst.ndim())
        .map(|axis| axis_overlaps(src, dst, axis))
        .collect();

    (0..dst.size())
        .into_par_iter()
        .map(|j| {
            let ijk = dst.unravel(j);
            let mut acc: Vec<([usize; 3], f64, [f64; 3])> = vec![([0; 3], 1.0, [0.0; 3])];
            for (axis, lists) in per_axis.iter().enumerate() {
                let list = &lists[ijk[axis]];
                let mut next = Vec::with_capacity(acc.len() * list.len());
                for (sijk, area, centroid) in &acc {
                    for &(i, measure, mid) in list {
                        let mut sijk = *sijk;
                        let mut centroid = *centroid;
                        sijk[axis] = i;
                        centroid[axis] = mid;
                        next.push((sijk, area * measure, centroid));
                    }
                }
                acc = next;
            }
            acc.into_iter()
                .map(|(sijk, area, centroid)| Overlap {
                    src: src.ravel(&sijk[..src.ndim()]),
                    area,
                    centroid,
                })
                .collect()
        })
        .collect()
}

fn axis_overlaps(src: &Grid, dst: &Grid, axis: usize) -> AxisOverlaps {
    let spherical = src.coord_sys() == CoordSys::Spherical;
    (0..dst.shape()[axis])
        .map(|jd| {
            let Some(b) = dst.axis_bounds(axis, jd) else {
                return Vec::new();
            };
            (0..src.shape()[axis])
                .filter_map(|is| {
                    let a = src.axis_bounds(axis, is)?;
                    let (measure, mid) = match (spherical, axis) {
                        (true, 0) => {
                            let (len, mid) = lon_overlap(a, b)?;
                            (len * DEG2RAD, mid)
                        }
                        (true, 1) => {
                            let a = (sin_deg(a.0), sin_deg(a.1));
                            let b = (sin_deg(b.0), sin_deg(b.1));
                            (interval_overlap(a, b), overlap_midpoint(a, b)?)
                        }
                        _ => (interval_overlap(a, b), overlap_midpoint(a, b)?),
                    };
                    (measure > 0.0).then_some((is, measure, mid))
                })
                .collect()
        })
        .collect()
}

/// Overlap length of a source and destination longitude interval under any
/// 360° shift, with the overlap midpoint in the source frame.
fn lon_overlap(src: (f64, f64), dst: (f64, f64)) -> Option<(f64, f64)> {
    let base = wrap_near(src.0, dst.0) - src.0;
    let mut total = 0.0;
    let mut moment = 0.0;
    for k in -1..=1 {
        let s = base + 360.0 * f64::from(k);
        let shifted = (src.0 + s, src.1 + s);
        let len = interval_overlap(shifted, dst);
        if let Some(mid) = overlap_midpoint(shifted, dst) {
            total += len;
            moment += len * (mid - s);
        }
    }
    (total > 0.0).then(|| (total, moment / total))
}

// === Polygon clipping ===

fn polygon_overlaps(src: &Grid, dst: &Grid) -> Vec<Vec<Overlap>> {
    let spherical = src.coord_sys() == CoordSys::Spherical;
    let to_space = |poly: Vec<[f64; 2]>| if spherical { to_sine_space(&poly) } else { poly };

    let src_polys: Vec<Option<(Vec<[f64; 2]>, [f64; 4])>> = (0..src.size())
        .into_par_iter()
        .map(|i| {
            let poly = to_space(src.cell_polygon(i)?);
            let bbox = bbox(&poly);
            Some((poly, bbox))
        })
        .collect();

    (0..dst.size())
        .into_par_iter()
        .map(|j| {
            let Some(raw) = dst.cell_polygon(j) else {
                return Vec::new();
            };
            let mut dpoly = to_space(raw);
            make_ccw(&mut dpoly);
            let db = bbox(&dpoly);

            let mut found = Vec::new();
            for (i, entry) in src_polys.iter().enumerate() {
                let Some((spoly, sb)) = entry else {
                    continue;
                };
                let shifts: Vec<f64> = if spherical {
                    let base = wrap_near(spoly[0][0], dpoly[0][0]) - spoly[0][0];
                    vec![base - 360.0, base, base + 360.0]
                } else {
                    vec![0.0]
                };
                for s in shifts {
                    if sb[0] + s > db[1] || sb[1] + s < db[0] || sb[2] > db[3] || sb[3] < db[2] {
                        continue;
                    }
                    let clipped = clip_polygon(&shift_lon(spoly, s), &dpoly);
                    let area = signed_area(&clipped).abs();
                    if area <= 0.0 {
                        continue;
                    }
                    let Some(c) = geometry::centroid(&clipped) else {
                        continue;
                    };
                    found.push(Overlap {
                        src: i,
                        area: if spherical { area * DEG2RAD } else { area },
                        centroid: [c[0] - s, c[1], 0.0],
                    });
                }
            }
            found
        })
        .collect()
}

/// `[xmin, xmax, ymin, ymax]`
fn bbox(poly: &[[f64; 2]]) -> [f64; 4] {
    poly.iter().fold(
        [f64::MAX, f64::MIN, f64::MAX, f64::MIN],
        |b, v| [b[0].min(v[0]), b[1].max(v[0]), b[2].min(v[1]), b[3].max(v[1])],
    )
}

// === Second order ===

fn gradient_stencils(src: &Grid, src_ok: &[bool]) -> Vec<Option<GradientStencil>> {
    let centroids: Vec<[f64; 3]> = (0..src.size()).map(|i| cell_centroid(src, i)).collect();
    let nd = src.ndim();

    (0..src.size())
        .into_par_iter()
        .map(|i| {
            if !src_ok[i] {
                return None;
            }
            let neighbours = logical_neighbours(src, i)
                .into_iter()
                .filter(|&n| src_ok[n])
                .collect::<Vec<_>>();
            if neighbours.is_empty() {
                return None;
            }
            let offsets: Vec<[f64; 3]> = neighbours
                .iter()
                .map(|&n| offset(src.coord_sys(), &centroids[n], &centroids[i]))
                .collect();
            let d = DMatrix::from_fn(offsets.len(), nd, |r, c| offsets[r][c]);
            let pinv = d.pseudo_inverse(1e-12).ok()?;
            Some(
                neighbours
                    .iter()
                    .enumerate()
                    .map(|(k, &n)| {
                        let mut g = [0.0; 3];
                        for (a, ga) in g.iter_mut().enumerate().take(nd) {
                            *ga = pinv[(a, k)];
                        }
                        (n, g)
                    })
                    .collect(),
            )
        })
        .collect()
}

/// Cells one logical step away along each axis, wrapping a cyclic x axis.
fn logical_neighbours(grid: &Grid, idx: usize) -> Vec<usize> {
    let ijk = grid.unravel(idx);
    let mut out = Vec::new();
    for axis in 0..grid.ndim() {
        let n = grid.shape()[axis];
        let wrap = axis == 0 && grid.is_cyclic();
        let i = ijk[axis];
        let mut candidates = Vec::with_capacity(2);
        if i > 0 {
            candidates.push(i - 1);
        } else if wrap && n > 1 {
            candidates.push(n - 1);
        }
        if i + 1 < n {
            candidates.push(i + 1);
        } else if wrap && n > 1 {
            candidates.push(0);
        }
        for c in candidates {
            let mut nijk = ijk;
            nijk[axis] = c;
            let k = grid.ravel(&nijk[..grid.ndim()]);
            if k != idx && !out.contains(&k) {
                out.push(k);
            }
        }
    }
    out
}
