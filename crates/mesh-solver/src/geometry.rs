//! Planar and spherical geometry helpers.
//!
//! Spherical cells are handled in (longitude, sin latitude) space, where
//! area is proportional to area on the unit sphere: a cell spanning
//! `Δλ` radians of longitude and `Δsinφ` has area `Δλ·Δsinφ`.

use crate::grid::CoordSys;

pub const DEG2RAD: f64 = std::f64::consts::PI / 180.0;

/// Cells with a measure at or below this are degenerate.
pub const DEGENERATE_AREA: f64 = 1e-20;

/// Shift `lon` by a multiple of 360 so it lies within 180 of `reference`.
#[inline]
pub fn wrap_near(lon: f64, reference: f64) -> f64 {
    lon - 360.0 * ((lon - reference) / 360.0).round()
}

/// Unit vector of a (lon, lat) position given in degrees.
#[inline]
pub fn unit_vector(lon: f64, lat: f64) -> [f64; 3] {
    let (lon, lat) = (lon * DEG2RAD, lat * DEG2RAD);
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Squared distance between two points.
///
/// Spherical: squared chord length on the unit sphere over (lon, lat), plus
/// the squared difference of any third coordinate.
pub fn squared_distance(coord_sys: CoordSys, a: &[f64], b: &[f64]) -> f64 {
    match coord_sys {
        CoordSys::Cartesian => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        CoordSys::Spherical => {
            let ua = unit_vector(a[0], a[1]);
            let ub = unit_vector(b[0], b[1]);
            let chord: f64 = ua.iter().zip(&ub).map(|(x, y)| (x - y) * (x - y)).sum();
            let rest: f64 = a[2..]
                .iter()
                .zip(&b[2..])
                .map(|(x, y)| (x - y) * (x - y))
                .sum();
            chord + rest
        }
    }
}

/// Length of the intersection of two intervals given in either order.
#[inline]
pub fn interval_overlap(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (a0, a1) = (a.0.min(a.1), a.0.max(a.1));
    let (b0, b1) = (b.0.min(b.1), b.0.max(b.1));
    (a1.min(b1) - a0.max(b0)).max(0.0)
}

/// Overlap of two longitude intervals, allowing for any 360° shift.
pub fn periodic_overlap(a: (f64, f64), b: (f64, f64)) -> f64 {
    let shift = wrap_near(b.0, a.0) - b.0;
    (-1..=1)
        .map(|k| {
            let s = shift + 360.0 * f64::from(k);
            interval_overlap(a, (b.0 + s, b.1 + s))
        })
        .sum()
}

/// Midpoint of the intersection of two intervals, if they overlap.
pub fn overlap_midpoint(a: (f64, f64), b: (f64, f64)) -> Option<f64> {
    let (a0, a1) = (a.0.min(a.1), a.0.max(a.1));
    let (b0, b1) = (b.0.min(b.1), b.0.max(b.1));
    let (lo, hi) = (a0.max(b0), a1.min(b1));
    (hi > lo).then(|| 0.5 * (lo + hi))
}

/// Shoelace signed area; positive for counter-clockwise polygons.
pub fn signed_area(poly: &[[f64; 2]]) -> f64 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let p = poly[i];
        let q = poly[(i + 1) % n];
        sum += p[0] * q[1] - q[0] * p[1];
    }
    0.5 * sum
}

/// Area-weighted centroid.
pub fn centroid(poly: &[[f64; 2]]) -> Option<[f64; 2]> {
    let area = signed_area(poly);
    if area.abs() <= DEGENERATE_AREA {
        return None;
    }
    let n = poly.len();
    let (mut cx, mut cy) = (0.0, 0.0);
    for i in 0..n {
        let p = poly[i];
        let q = poly[(i + 1) % n];
        let cross = p[0] * q[1] - q[0] * p[1];
        cx += (p[0] + q[0]) * cross;
        cy += (p[1] + q[1]) * cross;
    }
    Some([cx / (6.0 * area), cy / (6.0 * area)])
}

/// Reverse the vertex order of a clockwise polygon.
pub fn make_ccw(poly: &mut [[f64; 2]]) {
    if signed_area(poly) < 0.0 {
        poly.reverse();
    }
}

#[inline]
fn cross(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

/// Sutherland–Hodgman clipping of `subject` by the convex, counter-clockwise
/// polygon `clip`.
pub fn clip_polygon(subject: &[[f64; 2]], clip: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut output = subject.to_vec();
    let m = clip.len();
    for e in 0..m {
        if output.is_empty() {
            break;
        }
        let a = clip[e];
        let b = clip[(e + 1) % m];
        let input = std::mem::take(&mut output);
        let n = input.len();
        for i in 0..n {
            let p = input[i];
            let q = input[(i + 1) % n];
            let cp = cross(a, b, p);
            let cq = cross(a, b, q);
            let p_in = cp >= 0.0;
            let q_in = cq >= 0.0;
            if p_in {
                output.push(p);
            }
            if p_in != q_in {
                let t = cp / (cp - cq);
                output.push([p[0] + t * (q[0] - p[0]), p[1] + t * (q[1] - p[1])]);
            }
        }
    }
    output
}

/// Map raw (lon, lat) polygon vertices into (lon, sin lat) space with the
/// longitudes unwrapped around the first vertex.
pub fn to_sine_space(poly: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let Some(first) = poly.first() else {
        return Vec::new();
    };
    let reference = first[0];
    poly.iter()
        .map(|v| {
            let lat = v[1].clamp(-90.0, 90.0);
            [wrap_near(v[0], reference), (lat * DEG2RAD).sin()]
        })
        .collect()
}

/// Shift an unwrapped (lon, sin lat) polygon by a longitude offset.
pub fn shift_lon(poly: &[[f64; 2]], offset: f64) -> Vec<[f64; 2]> {
    poly.iter().map(|v| [v[0] + offset, v[1]]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_near() {
        assert!((wrap_near(350.0, 0.0) - -10.0).abs() < 1e-12);
        assert!((wrap_near(-170.0, 180.0) - 190.0).abs() < 1e-12);
        assert!((wrap_near(5.0, 0.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_periodic_overlap_across_dateline() {
        assert!((periodic_overlap((-10.0, 10.0), (350.0, 370.0)) - 20.0).abs() < 1e-12);
        assert!((periodic_overlap((0.0, 360.0), (0.0, 360.0)) - 360.0).abs() < 1e-12);
        assert_eq!(periodic_overlap((0.0, 10.0), (20.0, 30.0)), 0.0);
    }

    #[test]
    fn test_clip_unit_squares() {
        let a = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let b = [[0.5, 0.5], [1.5, 0.5], [1.5, 1.5], [0.5, 1.5]];
        let clipped = clip_polygon(&a, &b);
        assert!((signed_area(&clipped) - 0.25).abs() < 1e-12);
        let c = centroid(&clipped).unwrap();
        assert!((c[0] - 0.75).abs() < 1e-12);
        assert!((c[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_clip_disjoint_is_empty() {
        let a = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let b = [[2.0, 0.0], [3.0, 0.0], [3.0, 1.0], [2.0, 1.0]];
        assert!(signed_area(&clip_polygon(&a, &b)).abs() < 1e-12);
    }

    #[test]
    fn test_make_ccw() {
        let mut p = [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];
        assert!(signed_area(&p) < 0.0);
        make_ccw(&mut p);
        assert!(signed_area(&p) > 0.0);
    }

    #[test]
    fn test_chord_distance_antipodes() {
        let d = squared_distance(CoordSys::Spherical, &[0.0, 0.0], &[180.0, 0.0]);
        assert!((d - 4.0).abs() < 1e-12);
    }
}
