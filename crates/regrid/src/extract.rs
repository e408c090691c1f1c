//! Coordinate extraction from grid descriptors.
//!
//! Reads the longitude/latitude (or named Cartesian) coordinates of a field
//! or mapping, resolves which domain axes they span, and fetches cell bounds
//! when the method or cyclicity detection needs them. Everything is checked
//! here so that later stages can assume consistent inputs.

use cf_model::{AxisOrder, CfError, Coordinate, Field, GridMapping};
use ndarray::ArrayD;

use crate::config::{AxisSelector, XyAxes};
use crate::error::{RegridError, Result};
use crate::method::RegridMethod;
use crate::types::{GridRole, GridSource};

/// Axis identifiers used for mapping descriptors, which have no domain axes.
pub const MAPPING_AXES: [&str; 2] = ["X", "Y"];

/// Longitude/latitude coordinates of a spherical grid.
#[derive(Debug, Clone)]
pub struct SphericalCoords {
    /// Domain axes spanned by the grid, X then Y.
    pub axis_keys: [String; 2],
    /// Axis sizes, X then Y.
    pub sizes: [usize; 2],
    pub lon: Coordinate,
    pub lat: Coordinate,
    /// Fetched only when needed; see [`extract_spherical`].
    pub lon_bounds: Option<ArrayD<f64>>,
    pub lat_bounds: Option<ArrayD<f64>>,
    /// Dimension order of 2-d coordinates, `None` when they are 1-d.
    pub coord_order: Option<AxisOrder>,
}

impl SphericalCoords {
    pub fn is_curvilinear(&self) -> bool {
        self.coord_order.is_some()
    }
}

/// Coordinates of a Cartesian grid, one per axis in solver order.
#[derive(Debug, Clone)]
pub struct CartesianCoords {
    pub axis_keys: Vec<String>,
    pub coords: Vec<Coordinate>,
    pub bounds: Vec<Option<ArrayD<f64>>>,
}

impl CartesianCoords {
    pub fn sizes(&self) -> Vec<usize> {
        self.coords.iter().map(Coordinate::size).collect()
    }
}

/// Extract the longitude and latitude coordinates of a spherical grid.
///
/// # Arguments
/// * `source` - Field or mapping to read from
/// * `role` - Whether this is the source or destination grid
/// * `method` - Regridding method; conservative methods require bounds
/// * `axes` - Optional X/Y axis selection (fields only)
/// * `cyclic` - Explicit cyclicity; when `None` and the coordinates are 1-d
///   the longitude bounds are fetched so cyclicity can be detected
///
/// # Returns
/// The resolved coordinates, or a configuration error naming `role`
pub fn extract_spherical(
    source: GridSource<'_>,
    role: GridRole,
    method: RegridMethod,
    axes: Option<&XyAxes>,
    cyclic: Option<bool>,
) -> Result<SphericalCoords> {
    let (axis_keys, sizes, lon, lat, coord_order) = match source {
        GridSource::Field(f) => field_lonlat(f, role, axes)?,
        GridSource::Mapping(m) => mapping_lonlat(m, role)?,
    };

    check_size_one(role, method, &sizes)?;

    let (lon_bounds, lat_bounds) = if method.is_conservative() {
        (
            Some(require_bounds(&lon, role, "longitude")?),
            Some(require_bounds(&lat, role, "latitude")?),
        )
    } else if cyclic.is_none() && coord_order.is_none() {
        (lon.bounds().cloned(), None)
    } else {
        (None, None)
    };

    Ok(SphericalCoords {
        axis_keys,
        sizes,
        lon,
        lat,
        lon_bounds,
        lat_bounds,
        coord_order,
    })
}

/// Extract the coordinates of 1 to 3 named Cartesian axes.
///
/// Field axes are resolved by domain axis key, netCDF dimension name or
/// dimension coordinate identity; mapping axes by entry name.
pub fn extract_cartesian(
    source: GridSource<'_>,
    role: GridRole,
    axes: &[String],
    method: RegridMethod,
) -> Result<CartesianCoords> {
    if axes.is_empty() || axes.len() > 3 {
        return Err(RegridError::invalid_option(format!(
            "Cartesian regridding needs 1 to 3 axes, got {}",
            axes.len()
        )));
    }

    let mut axis_keys: Vec<String> = Vec::with_capacity(axes.len());
    let mut coords = Vec::with_capacity(axes.len());
    for name in axes {
        let (key, coord) = match source {
            GridSource::Field(f) => {
                let key = f
                    .domain_axis_key(name)
                    .map_err(|e| model_error(role, e))?;
                let coord = f
                    .dimension_coordinate_for_axis(&key)
                    .map(|(_, c)| c.clone())
                    .ok_or_else(|| {
                        RegridError::coordinates(
                            role,
                            format!("has no dimension coordinate for axis '{name}'"),
                        )
                    })?;
                (key, coord)
            }
            GridSource::Mapping(m) => {
                let coord = m.get(name).ok_or_else(|| {
                    RegridError::coordinates(role, format!("mapping has no '{name}' entry"))
                })?;
                if coord.ndim() != 1 {
                    return Err(RegridError::coordinates(
                        role,
                        format!("coordinates '{name}' must be 1-d"),
                    ));
                }
                (name.clone(), coord.clone())
            }
        };
        if axis_keys.contains(&key) {
            return Err(RegridError::coordinates(
                role,
                format!("axis '{name}' is selected more than once"),
            ));
        }
        axis_keys.push(key);
        coords.push(coord);
    }

    let sizes: Vec<usize> = coords.iter().map(Coordinate::size).collect();
    check_size_one(role, method, &sizes)?;

    let bounds = if method.is_conservative() {
        coords
            .iter()
            .zip(axes)
            .map(|(c, name)| require_bounds(c, role, name).map(Some))
            .collect::<Result<Vec<_>>>()?
    } else {
        vec![None; coords.len()]
    };

    Ok(CartesianCoords {
        axis_keys,
        coords,
        bounds,
    })
}

type LonLat = ([String; 2], [usize; 2], Coordinate, Coordinate, Option<AxisOrder>);

fn field_lonlat(f: &Field, role: GridRole, axes: Option<&XyAxes>) -> Result<LonLat> {
    let (x_axis, y_axis) = match axes {
        None => {
            let x = f.dimension_coordinate("X").map_err(|e| model_error(role, e))?;
            let y = f.dimension_coordinate("Y").map_err(|e| model_error(role, e))?;
            let (Some((xk, xc)), Some((yk, yc))) = (x, y) else {
                return Err(RegridError::coordinates(
                    role,
                    "has no unique X and Y dimension coordinates",
                ));
            };
            let x_axis = spanned_axis(f, &xk, role)?;
            let y_axis = spanned_axis(f, &yk, role)?;
            if xc.is_longitude() && yc.is_latitude() {
                return one_d(f, x_axis, y_axis, xc.clone(), yc.clone());
            }
            (x_axis, y_axis)
        }
        Some(axes) => {
            let x_axis = resolve_selector(f, role, &axes.x)?;
            let y_axis = resolve_selector(f, role, &axes.y)?;
            if x_axis == y_axis {
                return Err(RegridError::coordinates(
                    role,
                    format!("X and Y axes are the same ('{x_axis}')"),
                ));
            }
            if let (Some((_, xc)), Some((_, yc))) = (
                f.dimension_coordinate_for_axis(&x_axis),
                f.dimension_coordinate_for_axis(&y_axis),
            ) {
                if xc.is_longitude() && yc.is_latitude() {
                    let (xc, yc) = (xc.clone(), yc.clone());
                    return one_d(f, x_axis, y_axis, xc, yc);
                }
            }
            (x_axis, y_axis)
        }
    };

    let (lon_key, lon) = unique_2d(f, role, "longitude", Coordinate::is_longitude)?;
    let (lat_key, lat) = unique_2d(f, role, "latitude", Coordinate::is_latitude)?;
    if lon.shape() != lat.shape() {
        return Err(RegridError::coordinates(
            role,
            format!(
                "2-d longitude and latitude have different shapes {:?} and {:?}",
                lon.shape(),
                lat.shape()
            ),
        ));
    }
    let lon_axes = f.construct_axes(&lon_key).unwrap_or_default();
    let lat_axes = f.construct_axes(&lat_key).unwrap_or_default();
    if lon_axes != lat_axes {
        return Err(RegridError::coordinates(
            role,
            "2-d longitude and latitude span different axes",
        ));
    }
    let order = if lon_axes == [x_axis.as_str(), y_axis.as_str()] {
        AxisOrder::XY
    } else if lon_axes == [y_axis.as_str(), x_axis.as_str()] {
        AxisOrder::YX
    } else {
        return Err(RegridError::coordinates(
            role,
            format!("2-d coordinates span {lon_axes:?}, not the X and Y axes"),
        ));
    };

    let sizes = [axis_size(f, &x_axis), axis_size(f, &y_axis)];
    let (lon, lat) = (lon.clone(), lat.clone());
    Ok(([x_axis, y_axis], sizes, lon, lat, Some(order)))
}

fn one_d(
    f: &Field,
    x_axis: String,
    y_axis: String,
    lon: Coordinate,
    lat: Coordinate,
) -> Result<LonLat> {
    let sizes = [axis_size(f, &x_axis), axis_size(f, &y_axis)];
    Ok(([x_axis, y_axis], sizes, lon, lat, None))
}

fn mapping_lonlat(m: &GridMapping, role: GridRole) -> Result<LonLat> {
    let get = |name: &str| {
        m.get(name).cloned().ok_or_else(|| {
            RegridError::coordinates(role, format!("mapping has no '{name}' entry"))
        })
    };
    let lon = get("longitude")?;
    let lat = get("latitude")?;
    let keys = MAPPING_AXES.map(String::from);

    match (lon.ndim(), lat.ndim()) {
        (1, 1) => {
            let sizes = [lon.size(), lat.size()];
            Ok((keys, sizes, lon, lat, None))
        }
        (2, 2) => {
            let order = m.axes().ok_or_else(|| {
                RegridError::coordinates(role, "2-d mapping coordinates need an axes order")
            })?;
            if lon.shape() != lat.shape() {
                return Err(RegridError::coordinates(
                    role,
                    "2-d longitude and latitude have different shapes",
                ));
            }
            let s = lon.shape();
            let sizes = match order {
                AxisOrder::XY => [s[0], s[1]],
                AxisOrder::YX => [s[1], s[0]],
            };
            Ok((keys, sizes, lon, lat, Some(order)))
        }
        (a, b) => Err(RegridError::coordinates(
            role,
            format!("longitude and latitude must both be 1-d or both 2-d, got {a}-d and {b}-d"),
        )),
    }
}

fn resolve_selector(f: &Field, role: GridRole, selector: &AxisSelector) -> Result<String> {
    match selector {
        AxisSelector::Key(identity) => f.domain_axis_key(identity).map_err(|e| model_error(role, e)),
        AxisSelector::Position(p) => {
            let (key, _) = unique_2d(f, role, "longitude", Coordinate::is_longitude)?;
            f.construct_axes(&key)
                .and_then(|axes| axes.get(*p))
                .cloned()
                .ok_or_else(|| {
                    RegridError::coordinates(
                        role,
                        format!("axis position {p} is out of range for 2-d coordinates"),
                    )
                })
        }
    }
}

fn unique_2d<'f>(
    f: &'f Field,
    role: GridRole,
    name: &str,
    predicate: fn(&Coordinate) -> bool,
) -> Result<(String, &'f Coordinate)> {
    let found: Vec<(&str, &Coordinate)> = f
        .auxiliary_coordinates(Some(2))
        .into_iter()
        .filter(|(_, c)| predicate(*c))
        .collect();
    match found.as_slice() {
        [(k, c)] => Ok((k.to_string(), *c)),
        [] => Err(RegridError::coordinates(
            role,
            format!("has no 2-d {name} coordinate"),
        )),
        _ => Err(RegridError::coordinates(
            role,
            format!("has {} 2-d {name} coordinates", found.len()),
        )),
    }
}

fn spanned_axis(f: &Field, key: &str, role: GridRole) -> Result<String> {
    f.construct_axes(key)
        .and_then(|axes| axes.first())
        .cloned()
        .ok_or_else(|| RegridError::coordinates(role, format!("construct '{key}' spans no axis")))
}

fn axis_size(f: &Field, key: &str) -> usize {
    f.domain_axis(key).map_or(0, |a| a.size)
}

fn check_size_one(role: GridRole, method: RegridMethod, sizes: &[usize]) -> Result<()> {
    if role == GridRole::Source && method.needs_neighbours() && sizes.contains(&1) {
        return Err(RegridError::coordinates(
            role,
            format!("has a size-1 dimension, which the {method} method cannot regrid"),
        ));
    }
    Ok(())
}

fn require_bounds(coord: &Coordinate, role: GridRole, name: &str) -> Result<ArrayD<f64>> {
    coord.bounds().cloned().ok_or_else(|| {
        RegridError::bounds(
            role,
            format!("are missing for '{name}' coordinates; conservative regridding needs them"),
        )
    })
}

fn model_error(role: GridRole, err: CfError) -> RegridError {
    RegridError::coordinates(role, err.to_string())
}
