//! Fields and their metadata constructs.
//!
//! A [`Field`] owns a masked data array whose dimensions are named domain
//! axes, plus a keyed collection of metadata constructs (coordinates, cell
//! measures, ancillaries) each spanning a subset of those axes. Coordinate
//! references tie coordinates and domain ancillaries together by key.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::array::MaskedArray;
use crate::coordinate::{Coordinate, Variable};
use crate::error::{CfError, CfResult};

/// The kind of a metadata construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstructKind {
    DimensionCoordinate,
    AuxiliaryCoordinate,
    CellMeasure,
    FieldAncillary,
    DomainAncillary,
}

impl ConstructKind {
    /// Prefix used when generating construct keys.
    pub fn key_prefix(self) -> &'static str {
        match self {
            Self::DimensionCoordinate => "dimensioncoordinate",
            Self::AuxiliaryCoordinate => "auxiliarycoordinate",
            Self::CellMeasure => "cellmeasure",
            Self::FieldAncillary => "fieldancillary",
            Self::DomainAncillary => "domainancillary",
        }
    }
}

/// A metadata construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Construct {
    DimensionCoordinate(Coordinate),
    AuxiliaryCoordinate(Coordinate),
    CellMeasure(Variable),
    FieldAncillary(Variable),
    DomainAncillary(Variable),
}

impl Construct {
    pub fn kind(&self) -> ConstructKind {
        match self {
            Self::DimensionCoordinate(_) => ConstructKind::DimensionCoordinate,
            Self::AuxiliaryCoordinate(_) => ConstructKind::AuxiliaryCoordinate,
            Self::CellMeasure(_) => ConstructKind::CellMeasure,
            Self::FieldAncillary(_) => ConstructKind::FieldAncillary,
            Self::DomainAncillary(_) => ConstructKind::DomainAncillary,
        }
    }

    pub fn as_coordinate(&self) -> Option<&Coordinate> {
        match self {
            Self::DimensionCoordinate(c) | Self::AuxiliaryCoordinate(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::CellMeasure(v) | Self::FieldAncillary(v) | Self::DomainAncillary(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_coordinate(&self) -> bool {
        self.as_coordinate().is_some()
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::DimensionCoordinate(c) | Self::AuxiliaryCoordinate(c) => c.shape(),
            Self::CellMeasure(v) | Self::FieldAncillary(v) | Self::DomainAncillary(v) => v.shape(),
        }
    }
}

/// A named dimension of the field's domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainAxis {
    pub size: usize,
    /// netCDF dimension name, when known.
    pub nc_dimension: Option<String>,
}

impl DomainAxis {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            nc_dimension: None,
        }
    }
}

/// Links coordinates and domain ancillaries that together define a
/// coordinate system (grid mapping or formula terms).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinateReference {
    pub name: String,
    /// Keys of the coordinate constructs this reference applies to.
    pub coordinates: BTreeSet<String>,
    /// Formula term name to domain ancillary key.
    pub domain_ancillaries: BTreeMap<String, String>,
}

impl CoordinateReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_coordinate(mut self, key: impl Into<String>) -> Self {
        self.coordinates.insert(key.into());
        self
    }

    pub fn with_domain_ancillary(mut self, term: impl Into<String>, key: impl Into<String>) -> Self {
        self.domain_ancillaries.insert(term.into(), key.into());
        self
    }
}

/// A field: data on a domain plus its metadata constructs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    name: Option<String>,
    data: MaskedArray,
    data_axes: Vec<String>,
    domain_axes: BTreeMap<String, DomainAxis>,
    constructs: BTreeMap<String, Construct>,
    construct_axes: BTreeMap<String, Vec<String>>,
    coordinate_references: BTreeMap<String, CoordinateReference>,
}

impl Field {
    /// Create a field whose data dimensions are new domain axes
    /// `domainaxis0..domainaxisN`.
    pub fn new(data: MaskedArray) -> Self {
        let data_axes: Vec<String> = (0..data.ndim()).map(|i| format!("domainaxis{i}")).collect();
        let domain_axes = data_axes
            .iter()
            .zip(data.shape())
            .map(|(k, &n)| (k.clone(), DomainAxis::new(n)))
            .collect();
        Self {
            name: None,
            data,
            data_axes,
            domain_axes,
            constructs: BTreeMap::new(),
            construct_axes: BTreeMap::new(),
            coordinate_references: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn data(&self) -> &MaskedArray {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut MaskedArray {
        &mut self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Domain axis keys of the data dimensions, in order.
    pub fn data_axes(&self) -> &[String] {
        &self.data_axes
    }

    /// Position of a domain axis among the data dimensions.
    pub fn axis_position(&self, axis: &str) -> Option<usize> {
        self.data_axes.iter().position(|a| a == axis)
    }

    /// Replace the data array, keeping the data axes.
    ///
    /// Domain axis sizes are updated from the new shape; callers are
    /// responsible for keeping constructs spanning resized axes consistent.
    pub fn set_data(&mut self, data: MaskedArray) -> CfResult<()> {
        if data.ndim() != self.data_axes.len() {
            return Err(CfError::shape_mismatch(self.data.shape(), data.shape()));
        }
        for (axis, &n) in self.data_axes.iter().zip(data.shape()) {
            if let Some(d) = self.domain_axes.get_mut(axis) {
                d.size = n;
            }
        }
        self.data = data;
        Ok(())
    }

    // === Domain axes ===

    pub fn domain_axes(&self) -> &BTreeMap<String, DomainAxis> {
        &self.domain_axes
    }

    pub fn domain_axis(&self, key: &str) -> Option<&DomainAxis> {
        self.domain_axes.get(key)
    }

    pub fn domain_axis_mut(&mut self, key: &str) -> Option<&mut DomainAxis> {
        self.domain_axes.get_mut(key)
    }

    /// Add a domain axis that is not (yet) spanned by the data.
    pub fn add_domain_axis(&mut self, axis: DomainAxis) -> String {
        let key = self.next_key("domainaxis");
        self.domain_axes.insert(key.clone(), axis);
        key
    }

    pub fn set_axis_size(&mut self, key: &str, size: usize) -> CfResult<()> {
        let axis = self
            .domain_axes
            .get_mut(key)
            .ok_or_else(|| CfError::AxisNotFound(key.to_string()))?;
        axis.size = size;
        Ok(())
    }

    /// Resolve a domain axis from its key, its netCDF dimension name, or the
    /// identity of the 1-d dimension coordinate spanning it.
    pub fn domain_axis_key(&self, identity: &str) -> CfResult<String> {
        if self.domain_axes.contains_key(identity) {
            return Ok(identity.to_string());
        }

        let by_ncdim: Vec<&String> = self
            .domain_axes
            .iter()
            .filter(|(_, a)| a.nc_dimension.as_deref() == Some(identity))
            .map(|(k, _)| k)
            .collect();
        match by_ncdim.len() {
            1 => return Ok(by_ncdim[0].clone()),
            0 => {}
            count => {
                return Err(CfError::NotUnique {
                    identity: identity.to_string(),
                    count,
                })
            }
        }

        match self.dimension_coordinate(identity)? {
            Some((key, _)) => self
                .construct_axes(&key)
                .and_then(|axes| axes.first().cloned())
                .ok_or_else(|| CfError::AxisNotFound(identity.to_string())),
            None => Err(CfError::AxisNotFound(identity.to_string())),
        }
    }

    /// Insert a size-1 domain axis into the data at `position`.
    pub fn insert_dimension(&mut self, axis: &str, position: usize) -> CfResult<()> {
        let size = self
            .domain_axes
            .get(axis)
            .ok_or_else(|| CfError::AxisNotFound(axis.to_string()))?
            .size;
        if size != 1 || self.axis_position(axis).is_some() {
            return Err(CfError::invalid_construct(format!(
                "cannot insert axis '{axis}' of size {size} into the data"
            )));
        }
        self.data = self.data.insert_axis(position)?;
        self.data_axes.insert(position, axis.to_string());
        Ok(())
    }

    // === Constructs ===

    /// Add a construct spanning `axes`, returning its new key.
    pub fn set_construct(&mut self, construct: Construct, axes: Vec<String>) -> CfResult<String> {
        let key = self.next_key(construct.kind().key_prefix());
        self.set_construct_with_key(key.clone(), construct, axes)?;
        Ok(key)
    }

    /// Add or replace a construct under an explicit key.
    pub fn set_construct_with_key(
        &mut self,
        key: String,
        construct: Construct,
        axes: Vec<String>,
    ) -> CfResult<()> {
        let mut expected = Vec::with_capacity(axes.len());
        for axis in &axes {
            let size = self
                .domain_axes
                .get(axis)
                .ok_or_else(|| CfError::AxisNotFound(axis.clone()))?
                .size;
            expected.push(size);
        }
        if construct.shape() != expected.as_slice() {
            return Err(CfError::shape_mismatch(&expected, construct.shape()));
        }
        if construct.kind() == ConstructKind::DimensionCoordinate && axes.len() != 1 {
            return Err(CfError::invalid_construct(
                "dimension coordinates must span exactly one axis",
            ));
        }
        self.constructs.insert(key.clone(), construct);
        self.construct_axes.insert(key, axes);
        Ok(())
    }

    pub fn construct(&self, key: &str) -> Option<&Construct> {
        self.constructs.get(key)
    }

    pub fn construct_axes(&self, key: &str) -> Option<&[String]> {
        self.construct_axes.get(key).map(Vec::as_slice)
    }

    /// Remove a construct and any coordinate-reference links to it.
    pub fn del_construct(&mut self, key: &str) -> Option<Construct> {
        let removed = self.constructs.remove(key)?;
        self.construct_axes.remove(key);
        for reference in self.coordinate_references.values_mut() {
            reference.coordinates.remove(key);
            reference.domain_ancillaries.retain(|_, k| k != key);
        }
        Some(removed)
    }

    pub fn constructs(&self) -> impl Iterator<Item = (&String, &Construct)> {
        self.constructs.iter()
    }

    pub fn constructs_of_kind(&self, kind: ConstructKind) -> Vec<(&str, &Construct)> {
        self.constructs
            .iter()
            .filter(|(_, c)| c.kind() == kind)
            .map(|(k, c)| (k.as_str(), c))
            .collect()
    }

    /// The unique dimension coordinate matching `identity`, if any.
    pub fn dimension_coordinate(&self, identity: &str) -> CfResult<Option<(String, &Coordinate)>> {
        let matches: Vec<(&String, &Coordinate)> = self
            .constructs
            .iter()
            .filter_map(|(k, c)| match c {
                Construct::DimensionCoordinate(coord) if k == identity || coord.matches(identity) => {
                    Some((k, coord))
                }
                _ => None,
            })
            .collect();
        match matches.as_slice() {
            [] => Ok(None),
            [(k, c)] => Ok(Some(((*k).clone(), *c))),
            _ => Err(CfError::NotUnique {
                identity: identity.to_string(),
                count: matches.len(),
            }),
        }
    }

    /// The dimension coordinate spanning domain axis `axis`.
    pub fn dimension_coordinate_for_axis(&self, axis: &str) -> Option<(&str, &Coordinate)> {
        self.constructs.iter().find_map(|(k, c)| match c {
            Construct::DimensionCoordinate(coord)
                if self
                    .construct_axes(k)
                    .is_some_and(|span| span.len() == 1 && span[0] == axis) =>
            {
                Some((k.as_str(), coord))
            }
            _ => None,
        })
    }

    /// Auxiliary coordinates, optionally restricted to those spanning exactly
    /// `naxes` axes.
    pub fn auxiliary_coordinates(&self, naxes: Option<usize>) -> Vec<(&str, &Coordinate)> {
        self.constructs
            .iter()
            .filter_map(|(k, c)| match c {
                Construct::AuxiliaryCoordinate(coord)
                    if naxes.map_or(true, |n| coord.ndim() == n) =>
                {
                    Some((k.as_str(), coord))
                }
                _ => None,
            })
            .collect()
    }

    // === Coordinate references ===

    pub fn coordinate_references(&self) -> &BTreeMap<String, CoordinateReference> {
        &self.coordinate_references
    }

    pub fn set_coordinate_reference(&mut self, reference: CoordinateReference) -> String {
        let key = self.next_key("coordinatereference");
        self.coordinate_references.insert(key.clone(), reference);
        key
    }

    pub fn del_coordinate_reference(&mut self, key: &str) -> Option<CoordinateReference> {
        self.coordinate_references.remove(key)
    }

    /// Create a new field from a metadata construct.
    ///
    /// The new field's data is the construct's data, spanning the construct's
    /// axes; 1-d and N-d coordinates lying within those axes are copied.
    pub fn convert(&self, key: &str) -> CfResult<Field> {
        let construct = self
            .constructs
            .get(key)
            .ok_or_else(|| CfError::ConstructNotFound(key.to_string()))?;
        let axes = self.construct_axes(key).unwrap_or_default().to_vec();
        let data = match construct {
            Construct::DimensionCoordinate(c) | Construct::AuxiliaryCoordinate(c) => {
                MaskedArray::new(c.values().clone())
            }
            Construct::CellMeasure(v)
            | Construct::FieldAncillary(v)
            | Construct::DomainAncillary(v) => v.data.clone(),
        };

        let domain_axes = axes
            .iter()
            .filter_map(|a| self.domain_axes.get(a).map(|d| (a.clone(), d.clone())))
            .collect();
        let name = construct.as_variable().and_then(|v| v.name.clone());
        let mut field = Field {
            name,
            data,
            data_axes: axes.clone(),
            domain_axes,
            constructs: BTreeMap::new(),
            construct_axes: BTreeMap::new(),
            coordinate_references: BTreeMap::new(),
        };

        for (k, c) in &self.constructs {
            if !c.is_coordinate() {
                continue;
            }
            let span = &self.construct_axes[k];
            if span.iter().all(|a| axes.contains(a)) {
                field.set_construct_with_key(k.clone(), c.clone(), span.clone())?;
            }
        }
        Ok(field)
    }

    /// A copy of the field's domain restricted to `axes`.
    ///
    /// Keeps the listed domain axes (with their sizes and netCDF names), every
    /// construct lying entirely within them, and the coordinate references
    /// whose coordinates all survive. The data is a zero-filled placeholder.
    pub fn domain_subset(&self, axes: &[String]) -> CfResult<Field> {
        let mut domain_axes = BTreeMap::new();
        let mut shape = Vec::with_capacity(axes.len());
        for a in axes {
            let axis = self
                .domain_axes
                .get(a)
                .ok_or_else(|| CfError::AxisNotFound(a.clone()))?;
            shape.push(axis.size);
            domain_axes.insert(a.clone(), axis.clone());
        }
        let n = shape.iter().product();
        let mut field = Field {
            name: self.name.clone(),
            data: MaskedArray::from_shape_vec(&shape, vec![0.0; n])?,
            data_axes: axes.to_vec(),
            domain_axes,
            constructs: BTreeMap::new(),
            construct_axes: BTreeMap::new(),
            coordinate_references: BTreeMap::new(),
        };

        for (k, c) in &self.constructs {
            let span = &self.construct_axes[k];
            if span.iter().all(|a| axes.contains(a)) {
                field.set_construct_with_key(k.clone(), c.clone(), span.clone())?;
            }
        }
        for (k, r) in &self.coordinate_references {
            if !r.coordinates.iter().all(|c| field.constructs.contains_key(c)) {
                continue;
            }
            let mut reference = r.clone();
            reference
                .domain_ancillaries
                .retain(|_, key| field.constructs.contains_key(key));
            field.coordinate_references.insert(k.clone(), reference);
        }
        Ok(field)
    }

    fn next_key(&self, prefix: &str) -> String {
        (0..)
            .map(|i| format!("{prefix}{i}"))
            .find(|k| {
                !self.constructs.contains_key(k)
                    && !self.domain_axes.contains_key(k)
                    && !self.coordinate_references.contains_key(k)
            })
            .unwrap_or_else(|| prefix.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lat_lon_field() -> Field {
        let data = MaskedArray::from_shape_vec(&[2, 3], (0..6).map(f64::from).collect()).unwrap();
        let mut f = Field::new(data).with_name("air_temperature");
        f.set_construct(
            Construct::DimensionCoordinate(Coordinate::latitude(vec![-45.0, 45.0])),
            vec!["domainaxis0".into()],
        )
        .unwrap();
        f.set_construct(
            Construct::DimensionCoordinate(Coordinate::longitude(vec![0.0, 120.0, 240.0])),
            vec!["domainaxis1".into()],
        )
        .unwrap();
        f
    }

    #[test]
    fn test_new_field_axes() {
        let f = lat_lon_field();
        assert_eq!(f.data_axes(), &["domainaxis0", "domainaxis1"]);
        assert_eq!(f.domain_axis("domainaxis1").unwrap().size, 3);
    }

    #[test]
    fn test_domain_axis_key_by_identity() {
        let mut f = lat_lon_field();
        assert_eq!(f.domain_axis_key("X").unwrap(), "domainaxis1");
        assert_eq!(f.domain_axis_key("latitude").unwrap(), "domainaxis0");
        f.domain_axis_mut("domainaxis0").unwrap().nc_dimension = Some("lat".into());
        assert_eq!(f.domain_axis_key("lat").unwrap(), "domainaxis0");
        assert!(f.domain_axis_key("Z").is_err());
    }

    #[test]
    fn test_set_construct_shape_checked() {
        let mut f = lat_lon_field();
        let err = f.set_construct(
            Construct::DimensionCoordinate(Coordinate::longitude(vec![0.0, 1.0])),
            vec!["domainaxis1".into()],
        );
        assert!(matches!(err, Err(CfError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_del_construct_scrubs_references() {
        let mut f = lat_lon_field();
        let (lon_key, _) = f.dimension_coordinate("longitude").unwrap().unwrap();
        let cr = CoordinateReference::new("latitude_longitude").with_coordinate(lon_key.clone());
        let cr_key = f.set_coordinate_reference(cr);
        f.del_construct(&lon_key).unwrap();
        assert!(f.coordinate_references()[&cr_key].coordinates.is_empty());
    }

    #[test]
    fn test_insert_dimension() {
        let mut f = lat_lon_field();
        let t = f.add_domain_axis(DomainAxis::new(1));
        f.insert_dimension(&t, 0).unwrap();
        assert_eq!(f.shape(), &[1, 2, 3]);
        assert_eq!(f.data_axes()[0], t);
    }

    #[test]
    fn test_convert_cell_measure() {
        let mut f = lat_lon_field();
        let area = MaskedArray::from_shape_vec(&[2, 3], vec![1.0; 6]).unwrap();
        let key = f
            .set_construct(
                Construct::CellMeasure(Variable::new(area).with_name("cell_area")),
                vec!["domainaxis0".into(), "domainaxis1".into()],
            )
            .unwrap();
        let g = f.convert(&key).unwrap();
        assert_eq!(g.name(), Some("cell_area"));
        assert_eq!(g.shape(), &[2, 3]);
        assert!(g.dimension_coordinate("longitude").unwrap().is_some());
    }

    #[test]
    fn test_domain_subset() {
        let mut f = lat_lon_field();
        f.domain_axis_mut("domainaxis1").unwrap().nc_dimension = Some("lon".into());
        let lon_key = f.dimension_coordinate("longitude").unwrap().unwrap().0;
        let lat_key = f.dimension_coordinate("latitude").unwrap().unwrap().0;
        let keep = f.set_coordinate_reference(CoordinateReference::new("a").with_coordinate(&lon_key));
        let drop = f.set_coordinate_reference(CoordinateReference::new("b").with_coordinate(&lat_key));

        let g = f.domain_subset(&["domainaxis1".to_string()]).unwrap();
        assert_eq!(g.shape(), &[3]);
        assert_eq!(g.domain_axis("domainaxis1").unwrap().nc_dimension.as_deref(), Some("lon"));
        assert!(g.construct(&lon_key).is_some());
        assert!(g.construct(&lat_key).is_none());
        assert!(g.coordinate_references().contains_key(&keep));
        assert!(!g.coordinate_references().contains_key(&drop));
    }
}
