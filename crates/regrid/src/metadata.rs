//! Metadata propagation onto regridded fields.
//!
//! After regridding, constructs that span the regrid axes describe the old
//! grid. They are removed (or, for domain ancillaries spanning every regrid
//! axis, regridded too) and the destination's coordinates, coordinate
//! references and netCDF dimension names take their place.

use std::collections::BTreeMap;

use cf_model::{
    AxisOrder, Construct, Coordinate, CoordinateReference, Field, GridMapping, MaskedArray,
    LATITUDE_UNITS, LONGITUDE_UNITS,
};
use mesh_solver::RegridWeights;
use tracing::debug;

use crate::apply::regrid_array;
use crate::error::{RegridError, Result};
use crate::method::RegridMethod;
use crate::operator::DestinationMetadata;

/// Rewrites a field's metadata for a new horizontal (or Cartesian) grid.
pub struct MetadataPropagator<'a> {
    src_axes: &'a [String],
    dst_sizes: &'a [usize],
    destination: &'a DestinationMetadata,
    spherical: bool,
}

impl<'a> MetadataPropagator<'a> {
    /// # Arguments
    /// * `src_axes` - The field's regrid axes, solver order
    /// * `dst_sizes` - Destination sizes, solver order
    /// * `destination` - Destination metadata to copy from
    /// * `spherical` - Whether mapping destinations hold longitude/latitude
    pub fn new(
        src_axes: &'a [String],
        dst_sizes: &'a [usize],
        destination: &'a DestinationMetadata,
        spherical: bool,
    ) -> Self {
        Self {
            src_axes,
            dst_sizes,
            destination,
            spherical,
        }
    }

    /// Whether `field` has domain ancillaries spanning every regrid axis,
    /// which [`MetadataPropagator::apply`] regrids.
    pub fn regrids_domain_ancillaries(&self, field: &Field) -> bool {
        field.constructs().any(|(key, construct)| {
            matches!(construct, Construct::DomainAncillary(_))
                && field
                    .construct_axes(key)
                    .is_some_and(|axes| self.src_axes.iter().all(|a| axes.contains(a)))
        })
    }

    /// Install regridded `data` in `field` and bring its metadata in line.
    ///
    /// `weights` regrid domain ancillaries and must come from the source grid
    /// without the data mask.
    pub fn apply(
        &self,
        field: &mut Field,
        data: MaskedArray,
        weights: &RegridWeights,
        method: RegridMethod,
    ) -> Result<()> {
        let intersecting: Vec<(String, Vec<String>)> = field
            .constructs()
            .filter_map(|(key, _)| {
                let axes = field.construct_axes(key)?;
                axes.iter()
                    .any(|a| self.src_axes.contains(a))
                    .then(|| (key.clone(), axes.to_vec()))
            })
            .collect();

        // Domain ancillaries spanning every regrid axis are regridded in
        // place; everything else on the old grid goes.
        let mut regridded = Vec::new();
        for (key, axes) in &intersecting {
            let Some(Construct::DomainAncillary(var)) = field.construct(key) else {
                continue;
            };
            let positions: Option<Vec<usize>> = self
                .src_axes
                .iter()
                .map(|a| axes.iter().position(|b| b == a))
                .collect();
            if let Some(positions) = positions {
                let mut var = var.clone();
                var.data = regrid_array(
                    &var.data,
                    positions,
                    self.dst_sizes,
                    weights,
                    method.is_conservative(),
                )?;
                regridded.push((key.clone(), Construct::DomainAncillary(var), axes.clone()));
            }
        }

        let stale_refs: Vec<String> = field
            .coordinate_references()
            .iter()
            .filter(|(_, r)| {
                r.coordinates
                    .iter()
                    .any(|c| intersecting.iter().any(|(k, _)| k == c))
            })
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale_refs {
            field.del_coordinate_reference(key);
        }
        for (key, _) in &intersecting {
            if !regridded.iter().any(|(k, _, _)| k == key) {
                field.del_construct(key);
            }
        }
        debug!(
            removed = intersecting.len() - regridded.len(),
            regridded = regridded.len(),
            coordinate_references = stale_refs.len(),
            "Removed source grid metadata"
        );

        for (axis, &size) in self.src_axes.iter().zip(self.dst_sizes) {
            field.set_axis_size(axis, size)?;
        }
        field.set_data(data)?;
        for (key, construct, axes) in regridded {
            field.set_construct_with_key(key, construct, axes)?;
        }

        match self.destination {
            DestinationMetadata::Field {
                field: dst,
                axis_keys,
            } => self.copy_from_field(field, dst, axis_keys),
            DestinationMetadata::Mapping { mapping, axis_keys } => {
                self.copy_from_mapping(field, mapping, axis_keys)
            }
        }
    }

    fn copy_from_field(&self, field: &mut Field, dst: &Field, dst_axes: &[String]) -> Result<()> {
        let axis_map: BTreeMap<&str, &str> = dst_axes
            .iter()
            .map(String::as_str)
            .zip(self.src_axes.iter().map(String::as_str))
            .collect();

        let mut key_map: BTreeMap<String, String> = BTreeMap::new();
        for (key, construct) in dst.constructs() {
            if !construct.is_coordinate() {
                continue;
            }
            let axes: Option<Vec<String>> = dst
                .construct_axes(key)
                .unwrap_or_default()
                .iter()
                .map(|a| axis_map.get(a.as_str()).map(|s| s.to_string()))
                .collect();
            let Some(axes) = axes else {
                continue;
            };
            let new_key = field.set_construct(construct.clone(), axes)?;
            key_map.insert(key.clone(), new_key);
        }

        for reference in dst.coordinate_references().values() {
            if reference.coordinates.is_empty()
                || !reference.coordinates.iter().all(|c| key_map.contains_key(c))
            {
                continue;
            }
            let mut copy = CoordinateReference::new(reference.name.clone());
            for c in &reference.coordinates {
                copy = copy.with_coordinate(key_map[c].clone());
            }
            field.set_coordinate_reference(copy);
        }

        for (src_axis, dst_axis) in self.src_axes.iter().zip(dst_axes) {
            let nc = dst.domain_axis(dst_axis).and_then(|a| a.nc_dimension.clone());
            if let (Some(nc), Some(axis)) = (nc, field.domain_axis_mut(src_axis)) {
                axis.nc_dimension = Some(nc);
            }
        }
        Ok(())
    }

    fn copy_from_mapping(
        &self,
        field: &mut Field,
        mapping: &GridMapping,
        dst_axes: &[String],
    ) -> Result<()> {
        if !self.spherical {
            for (name, src_axis) in dst_axes.iter().zip(self.src_axes) {
                let coord = mapping.get(name).ok_or_else(|| {
                    RegridError::metadata(format!("destination mapping has no '{name}' entry"))
                })?;
                field.set_construct(
                    Construct::DimensionCoordinate(coord.clone()),
                    vec![src_axis.clone()],
                )?;
            }
            return Ok(());
        }

        let lon = mapping
            .get("longitude")
            .map(|c| with_identity(c, "longitude", LONGITUDE_UNITS[0]))
            .ok_or_else(|| RegridError::metadata("destination mapping has no longitude"))?;
        let lat = mapping
            .get("latitude")
            .map(|c| with_identity(c, "latitude", LATITUDE_UNITS[0]))
            .ok_or_else(|| RegridError::metadata("destination mapping has no latitude"))?;
        let (x, y) = (self.src_axes[0].clone(), self.src_axes[1].clone());

        if lon.ndim() == 1 {
            field.set_construct(Construct::DimensionCoordinate(lon), vec![x.clone()])?;
            field.set_construct(Construct::DimensionCoordinate(lat), vec![y])?;
        } else {
            let axes = match mapping.axes() {
                Some(AxisOrder::XY) => vec![x, y],
                _ => vec![y, x],
            };
            field.set_construct(Construct::AuxiliaryCoordinate(lon), axes.clone())?;
            field.set_construct(Construct::AuxiliaryCoordinate(lat), axes)?;
        }
        Ok(())
    }
}

fn with_identity(coord: &Coordinate, standard_name: &str, units: &str) -> Coordinate {
    let mut coord = coord.clone();
    coord.standard_name.get_or_insert_with(|| standard_name.to_string());
    coord.units.get_or_insert_with(|| units.to_string());
    coord
}
