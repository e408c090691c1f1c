//! End-to-end regridding tests: methods, masks, cyclicity, Cartesian axes
//! and metadata on the regridded field.

use cf_model::{Construct, ConstructKind, Field, GridMapping, MaskedArray, Variable};
use mesh_solver::{SolverError, SolverManager, UnmappedAction};
use regrid::{RegridConfig, RegridError, RegridOptions, RegridOutput, Regridder};
use test_utils::grid::{GridSpec, GLOBAL_4X2, GLOBAL_8X4};
use test_utils::{
    assert_approx_eq, assert_values_approx_eq, create_test_grid, create_uniform_grid,
    curvilinear_field, init_tracing, lat_lon_field, lat_lon_field_from, line_field,
    lon_lat_mapping, time_lat_lon_field, time_lat_lon_field_from,
};

// ============================================================================
// Helpers
// ============================================================================

fn regrid_field<'d>(
    manager: &SolverManager,
    src: &Field,
    dst: impl Into<regrid::Destination<'d>>,
    options: &RegridOptions,
) -> Field {
    Regridder::new(manager, RegridConfig::default())
        .regrids(src, dst, options)
        .expect("regridding succeeds")
        .into_field()
        .expect("a field is returned")
}

fn values(f: &Field) -> Vec<Option<f64>> {
    f.data().to_options()
}

/// `GLOBAL_8X4` data with one cell masked at `(row, col)`.
fn masked_8x4(row: usize, col: usize) -> MaskedArray {
    let mut data: Vec<Option<f64>> = create_test_grid(8, 4).into_iter().map(Some).collect();
    data[row * 8 + col] = None;
    MaskedArray::from_options(&[4, 8], data).unwrap()
}

fn point_mapping(lon: f64, lat: f64) -> GridMapping {
    GridMapping::spherical(
        cf_model::Coordinate::longitude(vec![lon]),
        cf_model::Coordinate::latitude(vec![lat]),
    )
}

// ============================================================================
// Idempotence and conservation
// ============================================================================

#[test]
fn test_linear_onto_own_grid_is_identity() {
    init_tracing();
    let manager = SolverManager::default();
    let src = lat_lon_field(&GLOBAL_8X4, create_test_grid(8, 4));
    let out = regrid_field(&manager, &src, &src, &RegridOptions::new("linear"));
    assert_eq!(out.shape(), &[4, 8]);
    assert_values_approx_eq!(&values(&out), &values(&src), 1e-9);
}

#[test]
fn test_conservative_onto_own_grid_is_identity() {
    let manager = SolverManager::default();
    let src = lat_lon_field(&GLOBAL_8X4, create_test_grid(8, 4));
    let out = regrid_field(&manager, &src, &src, &RegridOptions::new("conservative_1st"));
    assert_values_approx_eq!(&values(&out), &values(&src), 1e-9);
}

#[test]
fn test_conservative_uniform_field_is_conserved() {
    let manager = SolverManager::default();
    let config = RegridConfig {
        check_mass: true,
        ..Default::default()
    };
    let src = lat_lon_field(&GLOBAL_8X4, create_uniform_grid(8, 4, 3.5));
    let dst = lat_lon_field(&GLOBAL_4X2, vec![0.0; 8]);

    let regridded = Regridder::new(&manager, config)
        .regrids(&src, &dst, &RegridOptions::new("conservative"))
        .unwrap()
        .into_regridded()
        .unwrap();

    assert_eq!(regridded.field.shape(), &[2, 4]);
    for v in values(&regridded.field) {
        assert_approx_eq!(v.unwrap(), 3.5, 1e-10);
    }
    assert_eq!(regridded.mass.len(), 1);
    assert!(regridded.mass[0].relative_difference() < 1e-9);
}

#[test]
fn test_mass_records_are_empty_unless_requested() {
    let manager = SolverManager::default();
    let src = lat_lon_field(&GLOBAL_8X4, create_uniform_grid(8, 4, 1.0));
    let dst = lat_lon_field(&GLOBAL_4X2, vec![0.0; 8]);
    let regridded = Regridder::new(&manager, RegridConfig::default())
        .regrids(&src, &dst, &RegridOptions::new("conservative_1st"))
        .unwrap()
        .into_regridded()
        .unwrap();
    assert!(regridded.mass.is_empty());
}

#[test]
fn test_conservative_2nd_uniform_field_with_masked_cell() {
    let manager = SolverManager::default();
    let config = RegridConfig {
        check_mass: true,
        ..Default::default()
    };
    let mut data: Vec<Option<f64>> = vec![Some(2.0); 32];
    data[8 + 1] = None;
    let src = lat_lon_field_from(
        &GLOBAL_8X4,
        MaskedArray::from_options(&[4, 8], data).unwrap(),
    );
    let dst = lat_lon_field(&GLOBAL_4X2, vec![0.0; 8]);

    let regridded = Regridder::new(&manager, config)
        .regrids(&src, &dst, &RegridOptions::new("conservative_2nd"))
        .unwrap()
        .into_regridded()
        .unwrap();

    // The block holding the masked cell is renormalised by its fraction.
    for v in values(&regridded.field) {
        assert_approx_eq!(v.unwrap(), 2.0, 1e-9);
    }
    assert_eq!(regridded.mass.len(), 1);
    assert!(regridded.mass[0].relative_difference() < 1e-9);
}

#[test]
fn test_patch_reproduces_uniform_field() {
    let manager = SolverManager::default();
    let src = lat_lon_field(&GLOBAL_8X4, create_uniform_grid(8, 4, 5.0));
    let dst = lat_lon_field(&GLOBAL_4X2, vec![0.0; 8]);
    let out = regrid_field(&manager, &src, &dst, &RegridOptions::new("patch"));

    assert_eq!(out.shape(), &[2, 4]);
    for v in values(&out) {
        assert_approx_eq!(v.expect("every destination is inside the source"), 5.0, 1e-9);
    }
}

#[test]
fn test_nearest_dtos_averages_contributing_sources() {
    // Each 90x90 degree destination cell is nearest to the four 45x45
    // degree source cells it contains.
    let manager = SolverManager::default();
    let src = lat_lon_field(&GLOBAL_8X4, create_test_grid(8, 4));
    let dst = lat_lon_field(&GLOBAL_4X2, vec![0.0; 8]);
    let out = regrid_field(&manager, &src, &dst, &RegridOptions::new("nearest_dtos"));

    let out = values(&out);
    for row in 0..2 {
        for col in 0..4 {
            let expected = (2 * col) as f64 * 1000.0 + 500.0 + (2 * row) as f64 + 0.5;
            assert_approx_eq!(out[row * 4 + col].unwrap(), expected, 1e-9);
        }
    }
}

// ============================================================================
// Masks
// ============================================================================

#[test]
fn test_masked_source_cell_stays_missing() {
    let manager = SolverManager::default();
    let src = lat_lon_field_from(&GLOBAL_8X4, masked_8x4(1, 2));
    let out = regrid_field(&manager, &src, &src, &RegridOptions::new("linear"));

    let out = values(&out);
    assert_eq!(out[8 + 2], None);
    assert_eq!(out.iter().filter(|v| v.is_none()).count(), 1);
    assert_approx_eq!(out[0].unwrap(), 0.0, 1e-9);
}

#[test]
fn test_conservative_masked_cell_renormalised() {
    // Coarsening 2x2 blocks: the block holding the masked cell averages
    // the remaining three.
    let manager = SolverManager::default();
    let src = lat_lon_field_from(&GLOBAL_8X4, masked_8x4(0, 0));
    let dst = lat_lon_field(&GLOBAL_4X2, vec![0.0; 8]);
    let out = regrid_field(&manager, &src, &dst, &RegridOptions::new("conservative_1st"));
    let first = values(&out)[0].unwrap();
    // Remaining cells (col, row): (1, 0), (0, 1), (1, 1) with unequal areas
    // between the two latitude bands; the mean lies strictly between them.
    assert!(first > 1.0 && first < 1001.0, "got {first}");
}

#[test]
fn test_destination_mask_is_honoured() {
    let manager = SolverManager::default();
    let src = lat_lon_field(&GLOBAL_8X4, create_test_grid(8, 4));
    let dst = lat_lon_field_from(&GLOBAL_8X4, masked_8x4(3, 7));

    let plain = regrid_field(&manager, &src, &dst, &RegridOptions::new("linear"));
    assert!(values(&plain).iter().all(Option::is_some));

    let masked = regrid_field(
        &manager,
        &src,
        &dst,
        &RegridOptions::new("linear").with_use_dst_mask(true),
    );
    assert_eq!(values(&masked)[3 * 8 + 7], None);
}

#[test]
fn test_sections_with_different_masks() {
    let manager = SolverManager::default();
    let mut data: Vec<Option<f64>> = create_test_grid(8, 4)
        .into_iter()
        .chain(create_test_grid(8, 4))
        .map(Some)
        .collect();
    data[32 + 5] = None;
    let src = time_lat_lon_field_from(
        &GLOBAL_8X4,
        MaskedArray::from_options(&[2, 4, 8], data).unwrap(),
    );

    let out = regrid_field(&manager, &src, &src, &RegridOptions::new("linear"));
    let out = values(&out);
    assert!(out[..32].iter().all(Option::is_some));
    assert_eq!(out[32 + 5], None);
    assert_approx_eq!(out[32 + 6].unwrap(), 6000.0, 1e-9);
}

#[test]
fn test_domain_ancillary_ignores_data_mask() {
    let manager = SolverManager::default();
    let mut src = lat_lon_field_from(&GLOBAL_8X4, masked_8x4(1, 1));
    let mut orography: Vec<Option<f64>> = vec![Some(100.0); 32];
    orography[2 * 8 + 5] = None;
    src.set_construct(
        Construct::DomainAncillary(Variable::new(
            MaskedArray::from_options(&[4, 8], orography).unwrap(),
        )),
        vec!["domainaxis0".to_string(), "domainaxis1".to_string()],
    )
    .unwrap();

    let out = regrid_field(&manager, &src, &src, &RegridOptions::new("linear"));
    assert_eq!(values(&out)[8 + 1], None);

    let ancillaries = out.constructs_of_kind(ConstructKind::DomainAncillary);
    assert_eq!(ancillaries.len(), 1);
    let Construct::DomainAncillary(orography) = ancillaries[0].1 else {
        panic!("expected a domain ancillary");
    };
    let orography = orography.data.to_options();
    // Only the ancillary's own masked cell is missing.
    assert_eq!(orography[2 * 8 + 5], None);
    assert_eq!(orography.iter().filter(|v| v.is_none()).count(), 1);
    assert_approx_eq!(orography[8 + 1].unwrap(), 100.0, 1e-9);
}

#[test]
fn test_return_fraction() {
    let manager = SolverManager::default();
    let src = lat_lon_field_from(&GLOBAL_8X4, masked_8x4(2, 3));
    let out = regrid_field(
        &manager,
        &src,
        &src,
        &RegridOptions::new("conservative_1st").with_return_fraction(true),
    );
    let out = values(&out);
    assert_approx_eq!(out[2 * 8 + 3].unwrap(), 0.0, 1e-12);
    assert_approx_eq!(out[0].unwrap(), 1.0, 1e-12);
}

#[test]
fn test_hardmask_is_carried() {
    let manager = SolverManager::default();
    let mut data = masked_8x4(0, 0);
    data.harden_mask();
    let src = lat_lon_field_from(&GLOBAL_8X4, data);
    let out = regrid_field(&manager, &src, &src, &RegridOptions::new("linear"));
    assert!(out.data().is_hardmask());
}

// ============================================================================
// Method and option checks
// ============================================================================

#[test]
fn test_invalid_method_rejected() {
    let manager = SolverManager::default();
    let regridder = Regridder::new(&manager, RegridConfig::default());
    let src = lat_lon_field(&GLOBAL_4X2, vec![0.0; 8]);

    let err = regridder
        .regrids(&src, &src, &RegridOptions::new("spline"))
        .unwrap_err();
    assert!(matches!(err, RegridError::InvalidMethod(m) if m == "spline"));

    let err = regridder
        .regrids(&src, &src, &RegridOptions::default())
        .unwrap_err();
    assert!(matches!(err, RegridError::InvalidMethod(_)));
}

#[test]
fn test_use_src_mask_only_for_nearest_stod() {
    let manager = SolverManager::default();
    let regridder = Regridder::new(&manager, RegridConfig::default());
    let src = lat_lon_field(&GLOBAL_8X4, create_test_grid(8, 4));

    let err = regridder
        .regrids(&src, &src, &RegridOptions::new("linear").with_use_src_mask(false))
        .unwrap_err();
    assert!(matches!(err, RegridError::InvalidOption(_)));

    assert!(regridder
        .regrids(
            &src,
            &src,
            &RegridOptions::new("nearest_stod").with_use_src_mask(false)
        )
        .is_ok());
}

#[test]
fn test_bilinear_alias_matches_linear() {
    let manager = SolverManager::default();
    let src = lat_lon_field(&GLOBAL_8X4, create_test_grid(8, 4));
    let dst = lat_lon_field(&GLOBAL_4X2, vec![0.0; 8]);
    let a = regrid_field(&manager, &src, &dst, &RegridOptions::new("linear"));
    let b = regrid_field(&manager, &src, &dst, &RegridOptions::new("bilinear"));
    assert_eq!(values(&a), values(&b));
}

#[test]
fn test_conservative_needs_bounds() {
    let manager = SolverManager::default();
    let src = lat_lon_field(&GLOBAL_8X4, create_test_grid(8, 4));
    let dst = lon_lat_mapping(&GLOBAL_4X2, false);
    let err = Regridder::new(&manager, RegridConfig::default())
        .regrids(&src, &dst, &RegridOptions::new("conservative"))
        .unwrap_err();
    assert!(matches!(
        err,
        RegridError::Bounds {
            role: regrid::GridRole::Destination,
            ..
        }
    ));
}

#[test]
fn test_section_order_validation() {
    let manager = SolverManager::default();
    let regridder = Regridder::new(&manager, RegridConfig::default());
    let src = time_lat_lon_field(&GLOBAL_8X4, 2, vec![1.0; 64]);

    let err = regridder
        .regrids(
            &src,
            &src,
            &RegridOptions::new("linear").with_section_order(["depth"]),
        )
        .unwrap_err();
    assert!(matches!(err, RegridError::InvalidOption(m) if m.contains("not found")));

    let err = regridder
        .regrids(
            &src,
            &src,
            &RegridOptions::new("linear").with_section_order(["lat"]),
        )
        .unwrap_err();
    assert!(matches!(err, RegridError::InvalidOption(m) if m.contains("regrid axis")));

    let err = regridder
        .regrids(
            &src,
            &src,
            &RegridOptions::new("linear").with_section_order(["time", "time"]),
        )
        .unwrap_err();
    assert!(matches!(err, RegridError::InvalidOption(m) if m.contains("more than once")));

    assert!(regridder
        .regrids(
            &src,
            &src,
            &RegridOptions::new("linear").with_section_order(["time"]),
        )
        .is_ok());
}

#[test]
fn test_size_one_source_rejected_for_linear() {
    let manager = SolverManager::default();
    let spec = GridSpec {
        nlat: 1,
        ..GLOBAL_4X2
    };
    let src = lat_lon_field(&spec, vec![0.0; 4]);
    let err = Regridder::new(&manager, RegridConfig::default())
        .regrids(&src, &src, &RegridOptions::new("linear"))
        .unwrap_err();
    assert!(matches!(
        err,
        RegridError::Coordinates {
            role: regrid::GridRole::Source,
            ..
        }
    ));
}

// ============================================================================
// Cyclicity and unmapped destinations
// ============================================================================

#[test]
fn test_cyclic_source_maps_across_the_wrap() {
    let manager = SolverManager::default();
    let src = lat_lon_field(&GLOBAL_8X4, create_test_grid(8, 4));
    // Longitude 0 lies between the last centre (337.5) and the first (22.5).
    let dst = point_mapping(0.0, -22.5);
    let out = regrid_field(&manager, &src, &dst, &RegridOptions::new("linear"));
    assert_approx_eq!(values(&out)[0].unwrap(), 3501.0, 1e-9);
}

#[test]
fn test_non_cyclic_source_leaves_wrap_unmapped() {
    let manager = SolverManager::default();
    let src = lat_lon_field(&GLOBAL_8X4, create_test_grid(8, 4));
    let dst = point_mapping(0.0, -22.5);
    let options = RegridOptions::new("linear").with_src_cyclic(false);

    let out = regrid_field(&manager, &src, &dst, &options);
    assert_eq!(values(&out), vec![None]);

    let config = RegridConfig {
        unmapped_action: UnmappedAction::Error,
        ..Default::default()
    };
    let err = Regridder::new(&manager, config)
        .regrids(&src, &dst, &options)
        .unwrap_err();
    assert!(matches!(
        err,
        RegridError::Solver(SolverError::Unmapped { count: 1 })
    ));
    assert_eq!(manager.live_handles(), 0);
}

#[test]
fn test_finalized_solver_is_unavailable() {
    let manager = SolverManager::default();
    manager.finalize().unwrap();
    let src = lat_lon_field(&GLOBAL_4X2, vec![0.0; 8]);
    let err = Regridder::new(&manager, RegridConfig::default())
        .regrids(&src, &src, &RegridOptions::new("nearest_stod"))
        .unwrap_err();
    assert!(matches!(err, RegridError::SolverUnavailable(_)));
}

// ============================================================================
// Cartesian
// ============================================================================

#[test]
fn test_cartesian_linear_1d() {
    let manager = SolverManager::default();
    let src = line_field("x", vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 10.0, 20.0, 30.0]);
    let dst = line_field("x", vec![0.5, 1.5, 2.5], vec![0.0; 3]);
    let out = Regridder::new(&manager, RegridConfig::default())
        .regridc(&src, &dst, &RegridOptions::new("linear").with_cartesian_axes(["x"]))
        .unwrap()
        .into_field()
        .unwrap();
    assert_values_approx_eq!(&values(&out), &[Some(5.0), Some(15.0), Some(25.0)], 1e-12);
}

#[test]
fn test_cartesian_axes_must_be_distinct() {
    let manager = SolverManager::default();
    let src = line_field("x", vec![0.0, 1.0], vec![0.0, 1.0]);
    let err = Regridder::new(&manager, RegridConfig::default())
        .regridc(
            &src,
            &src,
            &RegridOptions::new("linear").with_cartesian_axes(["x", "x"]),
        )
        .unwrap_err();
    assert!(matches!(err, RegridError::Coordinates { .. }));
}

#[test]
fn test_nearest_with_masked_donor() {
    let manager = SolverManager::default();
    let data =
        MaskedArray::from_options(&[4], vec![Some(0.0), Some(10.0), None, Some(30.0)]).unwrap();
    let mut src = line_field("x", vec![0.0, 1.0, 2.0, 3.0], vec![0.0; 4]);
    src.set_data(data).unwrap();
    let dst = line_field("x", vec![0.1, 2.1, 2.9], vec![0.0; 3]);
    let regridder = Regridder::new(&manager, RegridConfig::default());

    // Unmasked solver grid: the masked donor is still chosen.
    let options = RegridOptions::new("nearest_stod")
        .with_cartesian_axes(["x"])
        .with_use_src_mask(false);
    let out = regridder.regridc(&src, &dst, &options).unwrap().into_field().unwrap();
    assert_eq!(values(&out), vec![Some(0.0), None, Some(30.0)]);

    // Masked solver grid: the next nearest donor steps in.
    let options = RegridOptions::new("nearest_stod").with_cartesian_axes(["x"]);
    let out = regridder.regridc(&src, &dst, &options).unwrap().into_field().unwrap();
    assert_eq!(values(&out), vec![Some(0.0), Some(30.0), Some(30.0)]);
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn test_field_destination_metadata() {
    let manager = SolverManager::default();
    let src = time_lat_lon_field(&GLOBAL_8X4, 2, vec![1.0; 64]);
    let mut dst = lat_lon_field(&GLOBAL_4X2, vec![0.0; 8]);
    dst.domain_axis_mut("domainaxis1").unwrap().nc_dimension = Some("longitude".into());

    let out = regrid_field(&manager, &src, &dst, &RegridOptions::new("conservative"));
    assert_eq!(out.shape(), &[2, 2, 4]);

    let (_, lon) = out.dimension_coordinate("longitude").unwrap().unwrap();
    assert_eq!(
        lon.values().iter().copied().collect::<Vec<_>>(),
        GLOBAL_4X2.lon_centers()
    );
    assert!(lon.has_bounds());
    let (_, time) = out.dimension_coordinate("time").unwrap().unwrap();
    assert_eq!(time.size(), 2);
    assert_eq!(
        out.domain_axis("domainaxis2").unwrap().nc_dimension.as_deref(),
        Some("longitude")
    );
}

#[test]
fn test_mapping_destination_metadata() {
    let manager = SolverManager::default();
    let src = lat_lon_field(&GLOBAL_8X4, create_test_grid(8, 4));
    let dst = lon_lat_mapping(&GLOBAL_4X2, false);
    let out = regrid_field(&manager, &src, &dst, &RegridOptions::new("nearest_stod"));

    assert_eq!(out.shape(), &[2, 4]);
    let (key, lat) = out.dimension_coordinate("latitude").unwrap().unwrap();
    assert_eq!(lat.standard_name.as_deref(), Some("latitude"));
    assert_eq!(out.construct_axes(&key).unwrap(), &["domainaxis0".to_string()]);
}

#[test]
fn test_curvilinear_source_onto_rectilinear() {
    let manager = SolverManager::default();
    let src = curvilinear_field(&GLOBAL_8X4, create_test_grid(8, 4));
    let dst = lon_lat_mapping(&GLOBAL_8X4, false);
    let out = regrid_field(&manager, &src, &dst, &RegridOptions::new("nearest_stod"));

    assert_eq!(values(&out), values(&src));
    assert!(out.auxiliary_coordinates(Some(2)).is_empty());
    assert!(out.dimension_coordinate("longitude").unwrap().is_some());
}

#[test]
fn test_returns_operator_on_request() {
    let manager = SolverManager::default();
    let src = lat_lon_field(&GLOBAL_8X4, create_test_grid(8, 4));
    let dst = lat_lon_field(&GLOBAL_4X2, vec![0.0; 8]);
    let out = Regridder::new(&manager, RegridConfig::default())
        .regrids(
            &src,
            &dst,
            &RegridOptions::new("linear").with_return_operator(true),
        )
        .unwrap();
    let RegridOutput::Operator(op) = out else {
        panic!("expected an operator");
    };
    assert_eq!(op.dst_sizes(), &[4, 2]);
    assert_eq!(op.src_grid().shape(), &[8, 4]);
}
