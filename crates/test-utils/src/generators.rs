//! Coordinate, bounds and data generators for synthetic grids.
//!
//! These generators create predictable, verifiable patterns that can be
//! used across the test suite.

/// Centres of `n` equal cells starting at `start`, each `step` wide.
///
/// # Example
///
/// ```
/// use test_utils::cell_centers;
///
/// assert_eq!(cell_centers(0.0, 90.0, 4), vec![45.0, 135.0, 225.0, 315.0]);
/// ```
pub fn cell_centers(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * (i as f64 + 0.5)).collect()
}

/// Bounds of `n` equal contiguous cells, flattened as `[lo0, hi0, lo1, ...]`
/// for use with `Coordinate::with_bounds_vec(2, ..)`.
///
/// # Example
///
/// ```
/// use test_utils::cell_bounds;
///
/// assert_eq!(cell_bounds(-90.0, 90.0, 2), vec![-90.0, 0.0, 0.0, 90.0]);
/// ```
pub fn cell_bounds(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n)
        .flat_map(|i| {
            let lo = start + step * i as f64;
            [lo, lo + step]
        })
        .collect()
}

/// Bounds of cells around arbitrary 1-d centres, with edges halfway
/// between neighbours and the outer edges mirrored.
pub fn midpoint_bounds(centers: &[f64]) -> Vec<f64> {
    let n = centers.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![centers[0] - 0.5, centers[0] + 0.5];
    }
    let mut edges = Vec::with_capacity(n + 1);
    edges.push(centers[0] - (centers[1] - centers[0]) / 2.0);
    for w in centers.windows(2) {
        edges.push((w[0] + w[1]) / 2.0);
    }
    edges.push(centers[n - 1] + (centers[n - 1] - centers[n - 2]) / 2.0);
    edges.windows(2).flat_map(|e| [e[0], e[1]]).collect()
}

/// Expand 1-d longitudes and latitudes into 2-d `(nlat, nlon)` arrays,
/// row-major.
pub fn meshgrid(lon: &[f64], lat: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut lon2 = Vec::with_capacity(lon.len() * lat.len());
    let mut lat2 = Vec::with_capacity(lon.len() * lat.len());
    for &y in lat {
        for &x in lon {
            lon2.push(x);
            lat2.push(y);
        }
    }
    (lon2, lat2)
}

/// Expand flattened 1-d bounds into `(nlat, nlon, 4)` quadrilateral bounds
/// in CF vertex order (anticlockwise from the lower left).
pub fn quad_bounds(lon_bounds: &[f64], lat_bounds: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut lon_q = Vec::with_capacity(lon_bounds.len() * lat_bounds.len());
    let mut lat_q = Vec::with_capacity(lon_bounds.len() * lat_bounds.len());
    for y in lat_bounds.chunks_exact(2) {
        for x in lon_bounds.chunks_exact(2) {
            lon_q.extend_from_slice(&[x[0], x[1], x[1], x[0]]);
            lat_q.extend_from_slice(&[y[0], y[0], y[1], y[1]]);
        }
    }
    (lon_q, lat_q)
}

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`, in row-major
/// `(row, col)` order, so a regridded value can be traced to its source.
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);
/// assert_eq!(grid[10], 1.0);
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f64);
        }
    }
    data
}

/// Creates a temperature-like field in Kelvin varying smoothly with
/// latitude, from about 250K at the poles to 300K at the equator.
pub fn create_temperature_grid(lat: &[f64], nlon: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(lat.len() * nlon);
    for &y in lat {
        let t = 250.0 + 50.0 * y.to_radians().cos();
        data.extend(std::iter::repeat(t).take(nlon));
    }
    data
}

/// Creates a grid where every cell has the same value.
pub fn create_uniform_grid(width: usize, height: usize, value: f64) -> Vec<f64> {
    vec![value; width * height]
}
