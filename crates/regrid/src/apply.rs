//! Regridding entry points and sparse weight application.
//!
//! [`Regridder`] drives the whole pipeline: method checks, coordinate
//! extraction, grid building, weight computation per distinct source mask,
//! application section by section, and metadata propagation.

use std::borrow::Cow;

use cf_model::{Field, MaskedArray};
use mesh_solver::{Grid, RegridWeights};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{RegridConfig, RegridOptions};
use crate::error::{RegridError, Result};
use crate::extract::{extract_cartesian, extract_spherical};
use crate::grid::GridBuilder;
use crate::metadata::MetadataPropagator;
use crate::method::{check_method, check_use_src_mask, RegridMethod};
use crate::operator::{DestinationMetadata, RegridOperator};
use crate::section::{MaskGroup, SectionPlan};
use crate::types::{Destination, GridRole, GridSource};
use crate::weights::{WeightComputer, WeightSolver};

/// Source and destination mass of one section (conservative methods).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassRecord {
    /// Index of the section in the source data; regrid positions hold 0.
    pub section: Vec<usize>,
    pub src_mass: f64,
    pub dst_mass: f64,
}

impl MassRecord {
    /// `|dst - src| / |src|`, or the absolute difference when the source
    /// mass is zero.
    pub fn relative_difference(&self) -> f64 {
        let diff = (self.dst_mass - self.src_mass).abs();
        if self.src_mass == 0.0 {
            diff
        } else {
            diff / self.src_mass.abs()
        }
    }
}

/// A regridded field with its mass diagnostics.
#[derive(Debug, Clone)]
pub struct Regridded {
    pub field: Field,
    /// Empty unless mass checking is enabled and the method is conservative.
    pub mass: Vec<MassRecord>,
}

/// What a regridding call produced.
#[derive(Debug, Clone)]
pub enum RegridOutput {
    Field(Regridded),
    Operator(RegridOperator),
}

impl RegridOutput {
    pub fn into_field(self) -> Option<Field> {
        match self {
            RegridOutput::Field(r) => Some(r.field),
            RegridOutput::Operator(_) => None,
        }
    }

    pub fn into_regridded(self) -> Option<Regridded> {
        match self {
            RegridOutput::Field(r) => Some(r),
            RegridOutput::Operator(_) => None,
        }
    }

    pub fn into_operator(self) -> Option<RegridOperator> {
        match self {
            RegridOutput::Operator(op) => Some(op),
            RegridOutput::Field(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Spherical,
    Cartesian,
}

/// One side of a regridding, ready for the solver.
struct Side {
    axis_keys: Vec<String>,
    sizes: Vec<usize>,
    grid: Grid,
}

/// Regrids fields using a weight solver.
pub struct Regridder<'s> {
    solver: &'s dyn WeightSolver,
    config: RegridConfig,
}

impl<'s> Regridder<'s> {
    pub fn new(solver: &'s dyn WeightSolver, config: RegridConfig) -> Self {
        Self { solver, config }
    }

    pub fn config(&self) -> &RegridConfig {
        &self.config
    }

    /// Regrid over longitude/latitude.
    ///
    /// # Arguments
    /// * `src` - Field to regrid
    /// * `dst` - Destination field, coordinate mapping, or operator
    /// * `options` - Method and per-call options
    ///
    /// # Returns
    /// The regridded field, or an operator when `return_operator` is set
    pub fn regrids<'d>(
        &self,
        src: &Field,
        dst: impl Into<Destination<'d>>,
        options: &RegridOptions,
    ) -> Result<RegridOutput> {
        self.regrid(Kind::Spherical, src, dst.into(), options)
    }

    /// Regrid over 1 to 3 named Cartesian axes
    /// (`options.cartesian_axes`, first listed is X).
    pub fn regridc<'d>(
        &self,
        src: &Field,
        dst: impl Into<Destination<'d>>,
        options: &RegridOptions,
    ) -> Result<RegridOutput> {
        self.regrid(Kind::Cartesian, src, dst.into(), options)
    }

    fn regrid(
        &self,
        kind: Kind,
        src: &Field,
        dst: Destination<'_>,
        options: &RegridOptions,
    ) -> Result<RegridOutput> {
        // Method and mask flags first, before any data is touched.
        let operator = match dst {
            Destination::Operator(op) => Some(op),
            _ => None,
        };
        let (method, use_src_mask, use_dst_mask, ignore_degenerate) = match operator {
            Some(op) => {
                op.check_method(options.method.as_deref())?;
                (
                    op.method(),
                    op.use_src_mask(),
                    op.use_dst_mask(),
                    op.ignore_degenerate(),
                )
            }
            None => {
                let method = check_method(options.method.as_deref())?;
                check_use_src_mask(options.use_src_mask, method)?;
                (
                    method,
                    options.use_src_mask,
                    options.use_dst_mask,
                    options
                        .ignore_degenerate
                        .unwrap_or(self.config.ignore_degenerate),
                )
            }
        };

        let builder = GridBuilder::new(self.config.bounds_tolerance);
        let source = self.source_side(kind, &builder, src, method, options)?;

        let (dst_grid, dst_sizes, destination) = match dst {
            Destination::Operator(op) => {
                op.check_compatible(&source.grid, !options.check_coordinates)?;
                (
                    op.dst_grid().clone(),
                    op.dst_sizes().to_vec(),
                    Cow::Borrowed(op.destination()),
                )
            }
            Destination::Field(f) => {
                let side = self.destination_side(
                    kind,
                    &builder,
                    GridSource::Field(f),
                    method,
                    use_dst_mask,
                    options,
                )?;
                let metadata = DestinationMetadata::Field {
                    field: f.domain_subset(&side.axis_keys)?,
                    axis_keys: side.axis_keys,
                };
                (side.grid, side.sizes, Cow::Owned(metadata))
            }
            Destination::Mapping(m) => {
                let side = self.destination_side(
                    kind,
                    &builder,
                    GridSource::Mapping(m),
                    method,
                    use_dst_mask,
                    options,
                )?;
                let metadata = DestinationMetadata::Mapping {
                    mapping: m.clone(),
                    axis_keys: side.axis_keys,
                };
                (side.grid, side.sizes, Cow::Owned(metadata))
            }
        };

        let mut field = src.clone();
        for axis in &source.axis_keys {
            if field.axis_position(axis).is_none() {
                field.insert_dimension(axis, 0)?;
            }
        }
        let positions = axis_positions(&field, &source.axis_keys)?;
        let loop_order = self.loop_order(&field, &source.axis_keys, options)?;
        let plan = SectionPlan::new(field.shape(), positions.clone(), &loop_order);

        let n_src = source.grid.size();
        let mut groups = if use_src_mask {
            plan.group_by_mask(field.data())
        } else {
            vec![MaskGroup {
                mask: vec![false; n_src],
                sections: (0..plan.len()).collect(),
            }]
        };
        if groups.is_empty() {
            groups.push(MaskGroup {
                mask: vec![false; n_src],
                sections: Vec::new(),
            });
        }
        debug!(
            sections = plan.len(),
            mask_groups = groups.len(),
            "Partitioned source data"
        );

        let computer = WeightComputer::new(self.solver, self.config.unmapped_action);
        let masked_grid = |mask: &[bool]| -> Result<Grid> {
            let grid = source.grid.clone();
            Ok(if mask.iter().any(|&m| m) {
                grid.with_mask(mask.to_vec())?
            } else {
                grid
            })
        };

        if options.return_operator {
            if let Some(op) = operator {
                return Ok(RegridOutput::Operator(op.clone()));
            }
            let src_grid = masked_grid(&groups[0].mask)?;
            let weights =
                computer.compute(src_grid.clone(), dst_grid.clone(), method, ignore_degenerate)?;
            return Ok(RegridOutput::Operator(RegridOperator::new(
                method,
                weights,
                src_grid,
                dst_grid,
                dst_sizes,
                ignore_degenerate,
                use_src_mask,
                use_dst_mask,
                destination.into_owned(),
            )));
        }

        let mut out_shape = field.shape().to_vec();
        for (&p, &n) in positions.iter().zip(&dst_sizes) {
            out_shape[p] = n;
        }
        let mut out_data = ArrayD::zeros(IxDyn(&out_shape));
        let mut out_mask = ArrayD::from_elem(IxDyn(&out_shape), true);
        let conservative = method.is_conservative();
        let check_mass = self.config.check_mass && conservative && !options.return_fraction;
        let mut mass = Vec::new();
        let mut unmasked_weights: Option<RegridWeights> = None;

        for (g, group) in groups.iter().enumerate() {
            let weights: Cow<'_, RegridWeights> = match operator {
                Some(op) if same_mask(op.src_grid().mask(), &group.mask) => {
                    Cow::Borrowed(op.weights())
                }
                _ => Cow::Owned(computer.compute(
                    masked_grid(&group.mask)?,
                    dst_grid.clone(),
                    method,
                    ignore_degenerate,
                )?),
            };
            debug!(
                group = g,
                sections = group.sections.len(),
                masked = group.mask.iter().filter(|&&m| m).count(),
                reused = matches!(weights, Cow::Borrowed(_)),
                "Applying weights to mask group"
            );

            for &s in &group.sections {
                let values = plan.read(field.data(), s);
                let result: Vec<Option<f64>> = if options.return_fraction {
                    weights.dst_frac.iter().map(|&f| Some(f)).collect()
                } else {
                    apply_weights(&weights, &values, conservative)
                };
                if check_mass {
                    if let Some(record) = mass_record(&weights, &values, &result, &plan, s) {
                        if record.relative_difference() > self.config.mass_rtol {
                            warn!(
                                section = ?record.section,
                                src_mass = record.src_mass,
                                dst_mass = record.dst_mass,
                                "Conservative regridding did not preserve mass"
                            );
                        }
                        mass.push(record);
                    }
                }
                plan.write(&mut out_data, &mut out_mask, s, &result);
            }

            if unmasked_weights.is_none() && !group.mask.iter().any(|&m| m) {
                unmasked_weights = Some(weights.into_owned());
            }
        }

        let mut data = MaskedArray::with_mask(out_data, out_mask)?;
        if field.data().is_hardmask() {
            data.harden_mask();
        } else {
            data.soften_mask();
        }

        let propagator = MetadataPropagator::new(
            &source.axis_keys,
            &dst_sizes,
            &destination,
            kind == Kind::Spherical,
        );
        // Domain ancillaries never see the data mask.
        let weights = match unmasked_weights {
            Some(w) => w,
            None if propagator.regrids_domain_ancillaries(&field) => match operator {
                Some(op) if op.src_grid().mask().map_or(true, |m| !m.contains(&true)) => {
                    op.weights().clone()
                }
                _ => computer.compute(
                    source.grid.clone(),
                    dst_grid.clone(),
                    method,
                    ignore_degenerate,
                )?,
            },
            None => RegridWeights::default(),
        };
        propagator.apply(&mut field, data, &weights, method)?;

        Ok(RegridOutput::Field(Regridded { field, mass }))
    }

    fn source_side(
        &self,
        kind: Kind,
        builder: &GridBuilder,
        src: &Field,
        method: RegridMethod,
        options: &RegridOptions,
    ) -> Result<Side> {
        let role = GridRole::Source;
        match kind {
            Kind::Spherical => {
                let coords = extract_spherical(
                    GridSource::Field(src),
                    role,
                    method,
                    options.src_axes.as_ref(),
                    options.src_cyclic,
                )?;
                let grid = builder.spherical(&coords, options.src_cyclic, None, method, role)?;
                Ok(Side {
                    axis_keys: coords.axis_keys.to_vec(),
                    sizes: coords.sizes.to_vec(),
                    grid,
                })
            }
            Kind::Cartesian => {
                let coords =
                    extract_cartesian(GridSource::Field(src), role, &options.cartesian_axes, method)?;
                let grid = builder.cartesian(&coords, None, method, role)?;
                Ok(Side {
                    sizes: coords.sizes(),
                    axis_keys: coords.axis_keys,
                    grid,
                })
            }
        }
    }

    fn destination_side(
        &self,
        kind: Kind,
        builder: &GridBuilder,
        dst: GridSource<'_>,
        method: RegridMethod,
        use_dst_mask: bool,
        options: &RegridOptions,
    ) -> Result<Side> {
        let role = GridRole::Destination;
        match kind {
            Kind::Spherical => {
                let coords = extract_spherical(
                    dst,
                    role,
                    method,
                    options.dst_axes.as_ref(),
                    options.dst_cyclic,
                )?;
                let mask = destination_mask(dst, &coords.axis_keys, use_dst_mask)?;
                let grid = builder.spherical(&coords, options.dst_cyclic, mask, method, role)?;
                Ok(Side {
                    axis_keys: coords.axis_keys.to_vec(),
                    sizes: coords.sizes.to_vec(),
                    grid,
                })
            }
            Kind::Cartesian => {
                let coords = extract_cartesian(dst, role, &options.cartesian_axes, method)?;
                let mask = destination_mask(dst, &coords.axis_keys, use_dst_mask)?;
                let grid = builder.cartesian(&coords, mask, method, role)?;
                Ok(Side {
                    sizes: coords.sizes(),
                    axis_keys: coords.axis_keys,
                    grid,
                })
            }
        }
    }

    /// Array positions of the non-regrid axes named in `section_order`.
    fn loop_order(
        &self,
        field: &Field,
        regrid_axes: &[String],
        options: &RegridOptions,
    ) -> Result<Vec<usize>> {
        let Some(names) = &options.section_order else {
            return Ok(Vec::new());
        };
        let mut order = Vec::with_capacity(names.len());
        for name in names {
            let not_found = || {
                RegridError::invalid_option(format!(
                    "section_order: source field axis not found: {name:?}"
                ))
            };
            let key = field.domain_axis_key(name).map_err(|_| not_found())?;
            if regrid_axes.contains(&key) {
                return Err(RegridError::invalid_option(format!(
                    "section_order names regrid axis {name:?}"
                )));
            }
            let position = field.axis_position(&key).ok_or_else(not_found)?;
            if order.contains(&position) {
                return Err(RegridError::invalid_option(format!(
                    "section_order names axis {name:?} more than once"
                )));
            }
            order.push(position);
        }
        Ok(order)
    }
}

/// Data positions of `axes` in `field`.
fn axis_positions(field: &Field, axes: &[String]) -> Result<Vec<usize>> {
    axes.iter()
        .map(|a| {
            field.axis_position(a).ok_or_else(|| {
                RegridError::coordinates(GridRole::Source, format!("axis '{a}' is not a data axis"))
            })
        })
        .collect()
}

/// Whether an operator's stored source mask equals a group mask; no stored
/// mask means nothing was masked.
fn same_mask(stored: Option<&[bool]>, mask: &[bool]) -> bool {
    match stored {
        Some(m) => m == mask,
        None => mask.iter().all(|&m| !m),
    }
}

/// The destination field's mask over its regrid axes, taken at index 0 of
/// every other axis. Mappings carry no mask.
fn destination_mask(
    dst: GridSource<'_>,
    axis_keys: &[String],
    use_dst_mask: bool,
) -> Result<Option<Vec<bool>>> {
    let GridSource::Field(f) = dst else {
        return Ok(None);
    };
    if !use_dst_mask {
        return Ok(None);
    }
    let mut f = f.clone();
    for axis in axis_keys {
        if f.axis_position(axis).is_none() {
            f.insert_dimension(axis, 0)?;
        }
    }
    let plan = SectionPlan::new(f.shape(), axis_positions(&f, axis_keys)?, &[]);
    if plan.is_empty() {
        return Ok(None);
    }
    let mask = plan.mask(f.data(), 0);
    Ok(mask.iter().any(|&m| m).then_some(mask))
}

/// Apply weights to one section's values, solver order.
///
/// A destination with no weights, or with a masked contributor, is missing.
/// Conservative results are divided by the destination fraction; a zero
/// fraction is missing.
pub(crate) fn apply_weights(
    weights: &RegridWeights,
    values: &[Option<f64>],
    conservative: bool,
) -> Vec<Option<f64>> {
    (0..weights.matrix.n_dst())
        .map(|j| {
            let row = weights.matrix.row(j);
            if row.is_empty() {
                return None;
            }
            let mut sum = 0.0;
            for &(_, i, w) in row {
                sum += w * values.get(i).copied().flatten()?;
            }
            if conservative {
                let frac = weights.dst_frac.get(j).copied().unwrap_or(0.0);
                if frac == 0.0 {
                    return None;
                }
                sum /= frac;
            }
            Some(sum)
        })
        .collect()
}

/// Regrid every section of `data` with one weight set.
///
/// # Arguments
/// * `data` - Array to regrid
/// * `positions` - Positions of the regrid axes in `data`, solver order
/// * `dst_sizes` - Destination sizes, solver order
pub(crate) fn regrid_array(
    data: &MaskedArray,
    positions: Vec<usize>,
    dst_sizes: &[usize],
    weights: &RegridWeights,
    conservative: bool,
) -> Result<MaskedArray> {
    let mut shape = data.shape().to_vec();
    for (&p, &n) in positions.iter().zip(dst_sizes) {
        shape[p] = n;
    }
    let plan = SectionPlan::new(data.shape(), positions, &[]);
    let mut out = ArrayD::zeros(IxDyn(&shape));
    let mut mask = ArrayD::from_elem(IxDyn(&shape), true);
    for s in 0..plan.len() {
        let values = plan.read(data, s);
        plan.write(&mut out, &mut mask, s, &apply_weights(weights, &values, conservative));
    }
    let mut array = MaskedArray::with_mask(out, mask)?;
    if data.is_hardmask() {
        array.harden_mask();
    }
    Ok(array)
}

fn mass_record(
    weights: &RegridWeights,
    values: &[Option<f64>],
    result: &[Option<f64>],
    plan: &SectionPlan,
    section: usize,
) -> Option<MassRecord> {
    let src_area = weights.src_area.as_ref()?;
    let dst_area = weights.dst_area.as_ref()?;
    let src_mass = values
        .iter()
        .zip(src_area.iter().zip(&weights.src_frac))
        .filter_map(|(v, (a, f))| v.map(|v| a * f * v))
        .sum();
    let dst_mass = result
        .iter()
        .zip(dst_area.iter().zip(&weights.dst_frac))
        .filter_map(|(v, (a, f))| v.map(|v| a * f * v))
        .sum();
    Some(MassRecord {
        section: plan.sections()[section].clone(),
        src_mass,
        dst_mass,
    })
}
