//! Weight computation tests across methods and grid layouts.

use mesh_solver::{
    compute_weights, CoordSys, Grid, RegridWeights, SolverError, SolverMethod, SolverParams,
    UnmappedAction,
};

// ============================================================================
// Helpers
// ============================================================================

/// Global cyclic lat-lon grid with cell corners.
fn global_grid(nx: usize, ny: usize) -> Grid {
    let dx = 360.0 / nx as f64;
    let dy = 180.0 / ny as f64;
    let lon: Vec<f64> = (0..nx).map(|i| (i as f64 + 0.5) * dx).collect();
    let lat: Vec<f64> = (0..ny).map(|j| -90.0 + (j as f64 + 0.5) * dy).collect();
    let lon_c: Vec<f64> = (0..nx).map(|i| i as f64 * dx).collect();
    let lat_c: Vec<f64> = (0..=ny).map(|j| -90.0 + j as f64 * dy).collect();
    Grid::rectilinear(CoordSys::Spherical, vec![lon, lat])
        .unwrap()
        .with_cyclic(true)
        .unwrap()
        .with_corners(vec![lon_c, lat_c])
        .unwrap()
}

/// Regular Cartesian 2-d grid with unit cells, centres at 0..n.
fn cartesian_grid(nx: usize, ny: usize) -> Grid {
    let x: Vec<f64> = (0..nx).map(|i| i as f64).collect();
    let y: Vec<f64> = (0..ny).map(|j| j as f64).collect();
    let xc: Vec<f64> = (0..=nx).map(|i| i as f64 - 0.5).collect();
    let yc: Vec<f64> = (0..=ny).map(|j| j as f64 - 0.5).collect();
    Grid::rectilinear(CoordSys::Cartesian, vec![x, y])
        .unwrap()
        .with_corners(vec![xc, yc])
        .unwrap()
}

/// Same cells as `cartesian_grid`, stored curvilinearly.
fn cartesian_curvilinear(nx: usize, ny: usize) -> Grid {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            x.push(i as f64);
            y.push(j as f64);
        }
    }
    let mut xc = Vec::new();
    let mut yc = Vec::new();
    for j in 0..=ny {
        for i in 0..=nx {
            xc.push(i as f64 - 0.5);
            yc.push(j as f64 - 0.5);
        }
    }
    Grid::curvilinear(CoordSys::Cartesian, [nx, ny], [x, y])
        .unwrap()
        .with_corners(vec![xc, yc])
        .unwrap()
}

fn apply(w: &RegridWeights, src: &[f64]) -> Vec<Option<f64>> {
    (0..w.matrix.n_dst())
        .map(|j| {
            let row = w.matrix.row(j);
            (!row.is_empty()).then(|| row.iter().map(|&(_, i, wt)| wt * src[i]).sum())
        })
        .collect()
}

fn params(method: SolverMethod) -> SolverParams {
    SolverParams::new(method)
}

// ============================================================================
// Conservative
// ============================================================================

#[test]
fn test_conservative_onto_same_grid_is_identity() {
    let g = global_grid(8, 4);
    let w = compute_weights(&g, &g, &params(SolverMethod::Conserve)).unwrap();
    assert_eq!(w.matrix.nnz(), g.size());
    for &(d, s, wt) in w.matrix.entries() {
        assert_eq!(d, s);
        assert!((wt - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_conservative_preserves_global_integral() {
    let src = global_grid(8, 4);
    let dst = global_grid(5, 3);
    let w = compute_weights(&src, &dst, &params(SolverMethod::Conserve)).unwrap();

    let values: Vec<f64> = (0..src.size()).map(|i| (i as f64 * 0.37).sin() + 2.0).collect();
    let out = apply(&w, &values);

    let src_area = w.src_area.as_ref().unwrap();
    let dst_area = w.dst_area.as_ref().unwrap();
    let src_mass: f64 = values.iter().zip(src_area).map(|(v, a)| v * a).sum();
    let dst_mass: f64 = out.iter().zip(dst_area).map(|(v, a)| v.unwrap() * a).sum();
    assert!((src_mass - dst_mass).abs() < 1e-10 * src_mass.abs());

    for f in &w.dst_frac {
        assert!((f - 1.0).abs() < 1e-10);
    }
}

#[test]
fn test_conservative_uniform_field_stays_uniform() {
    let src = global_grid(12, 6);
    let dst = global_grid(7, 5);
    let w = compute_weights(&src, &dst, &params(SolverMethod::Conserve)).unwrap();
    let out = apply(&w, &vec![3.5; src.size()]);
    for v in out {
        assert!((v.unwrap() - 3.5).abs() < 1e-10);
    }
}

#[test]
fn test_conservative_masked_source_reduces_fraction() {
    let mut mask = vec![false; 4];
    mask[1] = true;
    let src = cartesian_grid(2, 2).with_mask(mask).unwrap();
    let dst = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.5], vec![0.5]])
        .unwrap()
        .with_corners(vec![vec![-0.5, 1.5], vec![-0.5, 1.5]])
        .unwrap();
    let w = compute_weights(&src, &dst, &params(SolverMethod::Conserve)).unwrap();
    assert!((w.dst_frac[0] - 0.75).abs() < 1e-12);
    assert!(w.matrix.entries().iter().all(|&(_, s, _)| s != 1));
    assert_eq!(w.src_frac[1], 0.0);
}

#[test]
fn test_conservative_requires_corners() {
    let src = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.0, 1.0], vec![0.0, 1.0]]).unwrap();
    let dst = cartesian_grid(2, 2);
    let err = compute_weights(&src, &dst, &params(SolverMethod::Conserve)).unwrap_err();
    assert!(matches!(err, SolverError::MissingCorners { .. }));
}

#[test]
fn test_degenerate_cells_fatal_unless_ignored() {
    let src = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.0, 1.0, 2.0], vec![0.0]])
        .unwrap()
        .with_corners(vec![vec![-0.5, 0.5, 0.5, 2.5], vec![-0.5, 0.5]])
        .unwrap();
    let dst = cartesian_grid(3, 1);

    let strict = params(SolverMethod::Conserve).with_ignore_degenerate(false);
    let err = compute_weights(&src, &dst, &strict).unwrap_err();
    assert_eq!(
        err,
        SolverError::DegenerateCells {
            grid: "source".to_string(),
            count: 1
        }
    );

    let lenient = params(SolverMethod::Conserve).with_ignore_degenerate(true);
    let w = compute_weights(&src, &dst, &lenient).unwrap();
    assert!(w.matrix.entries().iter().all(|&(_, s, _)| s != 1));
}

#[test]
fn test_conservative_curvilinear_matches_rectilinear() {
    let src_rect = cartesian_grid(4, 3);
    let src_curv = cartesian_curvilinear(4, 3);
    let dst = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.5, 2.5], vec![0.5]])
        .unwrap()
        .with_corners(vec![vec![-0.5, 1.5, 3.5], vec![-0.5, 1.5]])
        .unwrap();

    let a = compute_weights(&src_rect, &dst, &params(SolverMethod::Conserve)).unwrap();
    let b = compute_weights(&src_curv, &dst, &params(SolverMethod::Conserve)).unwrap();
    assert_eq!(a.matrix.nnz(), b.matrix.nnz());
    for (x, y) in a.matrix.entries().iter().zip(b.matrix.entries()) {
        assert_eq!((x.0, x.1), (y.0, y.1));
        assert!((x.2 - y.2).abs() < 1e-12);
    }
}

#[test]
fn test_conservative_second_order_rows_and_mass() {
    let src = global_grid(12, 6);
    let dst = global_grid(5, 4);
    let w = compute_weights(&src, &dst, &params(SolverMethod::Conserve2nd)).unwrap();
    for s in w.matrix.row_sums() {
        assert!((s - 1.0).abs() < 1e-10);
    }

    let values: Vec<f64> = (0..src.size()).map(|i| (i % 12) as f64).collect();
    let out = apply(&w, &values);
    let src_mass: f64 = values
        .iter()
        .zip(w.src_area.as_ref().unwrap())
        .map(|(v, a)| v * a)
        .sum();
    let dst_mass: f64 = out
        .iter()
        .zip(w.dst_area.as_ref().unwrap())
        .map(|(v, a)| v.unwrap() * a)
        .sum();
    assert!((src_mass - dst_mass).abs() < 1e-9 * src_mass.abs());
}

// ============================================================================
// Bilinear
// ============================================================================

#[test]
fn test_bilinear_onto_same_grid_is_identity() {
    let g = global_grid(8, 4);
    let w = compute_weights(&g, &g, &params(SolverMethod::Bilinear)).unwrap();
    let values: Vec<f64> = (0..g.size()).map(|i| i as f64).collect();
    let out = apply(&w, &values);
    for (o, v) in out.iter().zip(&values) {
        assert!((o.unwrap() - v).abs() < 1e-12);
    }
}

#[test]
fn test_bilinear_wraps_cyclic_longitude() {
    let src = global_grid(4, 2);
    let dst = Grid::rectilinear(CoordSys::Spherical, vec![vec![0.0], vec![-45.0]]).unwrap();
    let w = compute_weights(&src, &dst, &params(SolverMethod::Bilinear)).unwrap();
    let mut row: Vec<(usize, f64)> = w.matrix.row(0).iter().map(|&(_, s, wt)| (s, wt)).collect();
    row.sort_by_key(|r| r.0);
    assert_eq!(row.len(), 2);
    assert_eq!(row[0].0, 0);
    assert_eq!(row[1].0, 3);
    assert!((row[0].1 - 0.5).abs() < 1e-12);
}

#[test]
fn test_bilinear_cartesian_1d() {
    let src = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.0, 1.0, 2.0, 3.0]]).unwrap();
    let dst = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.5, 1.5, 2.5]]).unwrap();
    let w = compute_weights(&src, &dst, &params(SolverMethod::Bilinear)).unwrap();
    let out = apply(&w, &[0.0, 10.0, 20.0, 30.0]);
    assert_eq!(out, vec![Some(5.0), Some(15.0), Some(25.0)]);
}

#[test]
fn test_bilinear_masked_contributor_unmaps() {
    let src = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.0, 1.0, 2.0]])
        .unwrap()
        .with_mask(vec![false, true, false])
        .unwrap();
    let dst = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.0, 0.5, 2.0]]).unwrap();
    let w = compute_weights(&src, &dst, &params(SolverMethod::Bilinear)).unwrap();
    assert_eq!(w.matrix.mapped(), vec![true, false, true]);
    assert_eq!(w.dst_frac, vec![1.0, 0.0, 1.0]);
}

#[test]
fn test_bilinear_outside_domain_policy() {
    let src = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.0, 1.0]]).unwrap();
    let dst = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.5, 4.0]]).unwrap();

    let w = compute_weights(&src, &dst, &params(SolverMethod::Bilinear)).unwrap();
    assert_eq!(w.matrix.mapped(), vec![true, false]);

    let strict = params(SolverMethod::Bilinear).with_unmapped_action(UnmappedAction::Error);
    let err = compute_weights(&src, &dst, &strict).unwrap_err();
    assert_eq!(err, SolverError::Unmapped { count: 1 });
}

#[test]
fn test_bilinear_curvilinear_source() {
    let src_rect = cartesian_grid(4, 4);
    let src_curv = cartesian_curvilinear(4, 4);
    let dst = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.25, 1.5, 2.9], vec![0.5, 2.75]])
        .unwrap();
    let values: Vec<f64> = (0..16).map(|i| ((i % 4) * 3 + (i / 4) * 7) as f64).collect();

    let a = apply(
        &compute_weights(&src_rect, &dst, &params(SolverMethod::Bilinear)).unwrap(),
        &values,
    );
    let b = apply(
        &compute_weights(&src_curv, &dst, &params(SolverMethod::Bilinear)).unwrap(),
        &values,
    );
    for (x, y) in a.iter().zip(&b) {
        assert!((x.unwrap() - y.unwrap()).abs() < 1e-9);
    }
}

// ============================================================================
// Patch
// ============================================================================

#[test]
fn test_patch_reproduces_quadratic() {
    let src = cartesian_grid(10, 10);
    let f = |x: f64, y: f64| 1.0 + 0.5 * x - 0.25 * y + 0.1 * x * y + 0.05 * x * x;
    let values: Vec<f64> = (0..src.size())
        .map(|i| {
            let p = src.point(i);
            f(p[0], p[1])
        })
        .collect();
    let dst = Grid::rectilinear(CoordSys::Cartesian, vec![vec![2.3, 4.5, 6.1], vec![3.7, 5.2]])
        .unwrap();
    let w = compute_weights(&src, &dst, &params(SolverMethod::Patch)).unwrap();
    let out = apply(&w, &values);
    for j in 0..dst.size() {
        let p = dst.point(j);
        assert!((out[j].unwrap() - f(p[0], p[1])).abs() < 1e-8);
    }
}

#[test]
fn test_patch_does_not_extrapolate() {
    let src = cartesian_grid(5, 5);
    let dst = Grid::rectilinear(CoordSys::Cartesian, vec![vec![7.0], vec![2.0]]).unwrap();
    let w = compute_weights(&src, &dst, &params(SolverMethod::Patch)).unwrap();
    assert!(w.matrix.is_empty());
}

// ============================================================================
// Nearest neighbour
// ============================================================================

#[test]
fn test_nearest_stod_masked_donor() {
    let src = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.0, 1.0, 2.0]])
        .unwrap()
        .with_mask(vec![false, true, false])
        .unwrap();
    let dst = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.9, 2.1]]).unwrap();
    let w = compute_weights(&src, &dst, &params(SolverMethod::NearestStod)).unwrap();
    // The masked donor is skipped in favour of the next nearest.
    assert_eq!(w.matrix.entries(), &[(0, 0, 1.0), (1, 2, 1.0)]);
}

#[test]
fn test_nearest_stod_ties_take_lowest_index() {
    let src = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.0, 2.0]]).unwrap();
    let dst = Grid::rectilinear(CoordSys::Cartesian, vec![vec![1.0]]).unwrap();
    let w = compute_weights(&src, &dst, &params(SolverMethod::NearestStod)).unwrap();
    assert_eq!(w.matrix.entries(), &[(0, 0, 1.0)]);
}

#[test]
fn test_nearest_stod_no_eligible_source() {
    let src = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.0, 1.0]])
        .unwrap()
        .with_mask(vec![true, true])
        .unwrap();
    let dst = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.5]]).unwrap();

    let w = compute_weights(&src, &dst, &params(SolverMethod::NearestStod)).unwrap();
    assert!(w.matrix.is_empty());

    let strict = params(SolverMethod::NearestStod).with_unmapped_action(UnmappedAction::Error);
    assert!(matches!(
        compute_weights(&src, &dst, &strict),
        Err(SolverError::Unmapped { count: 1 })
    ));
}

#[test]
fn test_nearest_dtos_averages_and_fills() {
    let src = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.0, 0.1, 0.9, 1.0]]).unwrap();
    let dst = Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.0, 1.0, 5.0]]).unwrap();
    let w = compute_weights(&src, &dst, &params(SolverMethod::NearestDtos)).unwrap();
    assert_eq!(
        w.matrix.entries(),
        &[(0, 0, 0.5), (0, 1, 0.5), (1, 2, 0.5), (1, 3, 0.5), (2, 3, 1.0)]
    );
}

#[test]
fn test_nearest_spherical_uses_great_circle() {
    let src = Grid::rectilinear(CoordSys::Spherical, vec![vec![10.0, 350.0], vec![0.0]]).unwrap();
    let dst = Grid::rectilinear(CoordSys::Spherical, vec![vec![355.0], vec![0.0]]).unwrap();
    let w = compute_weights(&src, &dst, &params(SolverMethod::NearestStod)).unwrap();
    assert_eq!(w.matrix.entries(), &[(0, 1, 1.0)]);
}

// ============================================================================
// Grid pairing
// ============================================================================

#[test]
fn test_mixed_coordinate_systems_rejected() {
    let src = global_grid(4, 2);
    let dst = cartesian_grid(2, 2);
    assert!(matches!(
        compute_weights(&src, &dst, &params(SolverMethod::Bilinear)),
        Err(SolverError::IncompatibleGrids(_))
    ));
}
