//! Common field and mapping fixtures for regridding tests.
//!
//! Fields are laid out `(lat, lon)` or `(time, lat, lon)` with domain axes
//! `domainaxis0..` in that order, and carry netCDF dimension names.

use cf_model::{
    AxisOrder, Construct, Coordinate, Field, GridMapping, MaskedArray,
};
use tempfile::TempDir;

use crate::generators::{meshgrid, quad_bounds};

/// Common grid specifications for testing.
pub mod grid {
    /// 4x2 global grid (90 x 90 degrees)
    pub const GLOBAL_4X2: GridSpec = GridSpec {
        nlon: 4,
        nlat: 2,
        min_lon: 0.0,
        max_lon: 360.0,
        min_lat: -90.0,
        max_lat: 90.0,
    };

    /// 8x4 global grid (45 x 45 degrees)
    pub const GLOBAL_8X4: GridSpec = GridSpec {
        nlon: 8,
        nlat: 4,
        min_lon: 0.0,
        max_lon: 360.0,
        min_lat: -90.0,
        max_lat: 90.0,
    };

    /// 12x6 global grid (30 x 30 degrees), starting at the antimeridian
    pub const GLOBAL_12X6: GridSpec = GridSpec {
        nlon: 12,
        nlat: 6,
        min_lon: -180.0,
        max_lon: 180.0,
        min_lat: -90.0,
        max_lat: 90.0,
    };

    /// Regional 4x4 grid around the origin (5 x 5 degrees)
    pub const REGIONAL_4X4: GridSpec = GridSpec {
        nlon: 4,
        nlat: 4,
        min_lon: -10.0,
        max_lon: 10.0,
        min_lat: -10.0,
        max_lat: 10.0,
    };

    /// A regular longitude/latitude grid.
    #[derive(Debug, Clone, Copy)]
    pub struct GridSpec {
        pub nlon: usize,
        pub nlat: usize,
        pub min_lon: f64,
        pub max_lon: f64,
        pub min_lat: f64,
        pub max_lat: f64,
    }

    impl GridSpec {
        /// Returns the total number of grid cells.
        pub fn size(&self) -> usize {
            self.nlon * self.nlat
        }

        /// Returns the resolution in degrees as (dlon, dlat).
        pub fn resolution(&self) -> (f64, f64) {
            (
                (self.max_lon - self.min_lon) / self.nlon as f64,
                (self.max_lat - self.min_lat) / self.nlat as f64,
            )
        }

        pub fn lon_centers(&self) -> Vec<f64> {
            crate::cell_centers(self.min_lon, self.resolution().0, self.nlon)
        }

        pub fn lat_centers(&self) -> Vec<f64> {
            crate::cell_centers(self.min_lat, self.resolution().1, self.nlat)
        }

        pub fn lon_bounds(&self) -> Vec<f64> {
            crate::cell_bounds(self.min_lon, self.resolution().0, self.nlon)
        }

        pub fn lat_bounds(&self) -> Vec<f64> {
            crate::cell_bounds(self.min_lat, self.resolution().1, self.nlat)
        }
    }
}

use grid::GridSpec;

/// 1-d longitude coordinate of `spec`, with bounds if requested.
pub fn lon_coordinate(spec: &GridSpec, with_bounds: bool) -> Coordinate {
    let lon = Coordinate::longitude(spec.lon_centers());
    if with_bounds {
        lon.with_bounds_vec(2, spec.lon_bounds())
            .expect("longitude bounds match centres")
    } else {
        lon
    }
}

/// 1-d latitude coordinate of `spec`, with bounds if requested.
pub fn lat_coordinate(spec: &GridSpec, with_bounds: bool) -> Coordinate {
    let lat = Coordinate::latitude(spec.lat_centers());
    if with_bounds {
        lat.with_bounds_vec(2, spec.lat_bounds())
            .expect("latitude bounds match centres")
    } else {
        lat
    }
}

/// A `(lat, lon)` field on `spec` holding `values` (row-major), with
/// bounded 1-d coordinates.
pub fn lat_lon_field(spec: &GridSpec, values: Vec<f64>) -> Field {
    let data = MaskedArray::from_shape_vec(&[spec.nlat, spec.nlon], values)
        .expect("values match the grid size");
    lat_lon_field_from(spec, data)
}

/// Like [`lat_lon_field`] with an explicit (possibly masked) array.
pub fn lat_lon_field_from(spec: &GridSpec, data: MaskedArray) -> Field {
    let mut f = Field::new(data).with_name("air_temperature");
    add_lat_lon(&mut f, spec, "domainaxis0", "domainaxis1");
    f
}

/// A `(time, lat, lon)` field on `spec` with `nt` time steps.
pub fn time_lat_lon_field(spec: &GridSpec, nt: usize, values: Vec<f64>) -> Field {
    let data = MaskedArray::from_shape_vec(&[nt, spec.nlat, spec.nlon], values)
        .expect("values match the grid size");
    time_lat_lon_field_from(spec, data)
}

/// Like [`time_lat_lon_field`] with an explicit (possibly masked) array.
pub fn time_lat_lon_field_from(spec: &GridSpec, data: MaskedArray) -> Field {
    let nt = data.shape()[0];
    let mut f = Field::new(data).with_name("air_temperature");
    let time = Coordinate::from_vec((0..nt).map(|t| t as f64).collect())
        .with_standard_name("time")
        .with_units("days since 2000-01-01")
        .with_axis("T");
    f.set_construct(Construct::DimensionCoordinate(time), vec!["domainaxis0".into()])
        .expect("time coordinate matches its axis");
    if let Some(axis) = f.domain_axis_mut("domainaxis0") {
        axis.nc_dimension = Some("time".into());
    }
    add_lat_lon(&mut f, spec, "domainaxis1", "domainaxis2");
    f
}

fn add_lat_lon(f: &mut Field, spec: &GridSpec, lat_axis: &str, lon_axis: &str) {
    f.set_construct(
        Construct::DimensionCoordinate(lat_coordinate(spec, true)),
        vec![lat_axis.into()],
    )
    .expect("latitude matches its axis");
    f.set_construct(
        Construct::DimensionCoordinate(lon_coordinate(spec, true)),
        vec![lon_axis.into()],
    )
    .expect("longitude matches its axis");
    if let Some(axis) = f.domain_axis_mut(lat_axis) {
        axis.nc_dimension = Some("lat".into());
    }
    if let Some(axis) = f.domain_axis_mut(lon_axis) {
        axis.nc_dimension = Some("lon".into());
    }
}

/// A `(y, x)` field on `spec` described by 2-d auxiliary longitude and
/// latitude (with quadrilateral bounds) over index dimension coordinates.
pub fn curvilinear_field(spec: &GridSpec, values: Vec<f64>) -> Field {
    let data = MaskedArray::from_shape_vec(&[spec.nlat, spec.nlon], values)
        .expect("values match the grid size");
    let mut f = Field::new(data).with_name("air_temperature");
    let axes: Vec<String> = vec!["domainaxis0".into(), "domainaxis1".into()];

    let y = Coordinate::from_vec((0..spec.nlat).map(|j| j as f64).collect())
        .with_standard_name("projection_y_coordinate")
        .with_axis("Y");
    let x = Coordinate::from_vec((0..spec.nlon).map(|i| i as f64).collect())
        .with_standard_name("projection_x_coordinate")
        .with_axis("X");
    f.set_construct(Construct::DimensionCoordinate(y), vec![axes[0].clone()])
        .expect("y matches its axis");
    f.set_construct(Construct::DimensionCoordinate(x), vec![axes[1].clone()])
        .expect("x matches its axis");

    let (lon, lat) = curvilinear_coordinates(spec);
    f.set_construct(Construct::AuxiliaryCoordinate(lon), axes.clone())
        .expect("2-d longitude matches its axes");
    f.set_construct(Construct::AuxiliaryCoordinate(lat), axes)
        .expect("2-d latitude matches its axes");
    f
}

/// 2-d `(nlat, nlon)` longitude and latitude of `spec` with quadrilateral
/// bounds.
pub fn curvilinear_coordinates(spec: &GridSpec) -> (Coordinate, Coordinate) {
    let shape = [spec.nlat, spec.nlon];
    let (lon2, lat2) = meshgrid(&spec.lon_centers(), &spec.lat_centers());
    let (lon_q, lat_q) = quad_bounds(&spec.lon_bounds(), &spec.lat_bounds());
    let lon = Coordinate::from_shape_vec(&shape, lon2)
        .and_then(|c| c.with_bounds_vec(4, lon_q))
        .expect("2-d longitude shapes agree")
        .with_standard_name("longitude")
        .with_units("degrees_east");
    let lat = Coordinate::from_shape_vec(&shape, lat2)
        .and_then(|c| c.with_bounds_vec(4, lat_q))
        .expect("2-d latitude shapes agree")
        .with_standard_name("latitude")
        .with_units("degrees_north");
    (lon, lat)
}

/// A spherical mapping of `spec`'s 1-d coordinates.
pub fn lon_lat_mapping(spec: &GridSpec, with_bounds: bool) -> GridMapping {
    GridMapping::spherical(
        lon_coordinate(spec, with_bounds),
        lat_coordinate(spec, with_bounds),
    )
}

/// A spherical mapping of `spec`'s 2-d coordinates, `(nlat, nlon)` (YX).
pub fn curvilinear_mapping(spec: &GridSpec) -> GridMapping {
    let (lon, lat) = curvilinear_coordinates(spec);
    GridMapping::curvilinear(lon, lat, AxisOrder::YX)
}

/// A 1-d field along a Cartesian axis named `name`.
pub fn line_field(name: &str, centers: Vec<f64>, values: Vec<f64>) -> Field {
    let data = MaskedArray::from_shape_vec(&[values.len()], values)
        .expect("one value per cell");
    let mut f = Field::new(data);
    let coord = Coordinate::from_vec(centers).with_standard_name(name);
    f.set_construct(Construct::DimensionCoordinate(coord), vec!["domainaxis0".into()])
        .expect("coordinate matches its axis");
    if let Some(axis) = f.domain_axis_mut("domainaxis0") {
        axis.nc_dimension = Some(name.to_string());
    }
    f
}

/// A temporary directory for persistence tests, removed on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("temporary directory can be created")
}
