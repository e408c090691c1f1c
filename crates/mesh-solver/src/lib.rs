//! Weight/mesh solver for regridding.
//!
//! Builds sparse interpolation weights between two [`Grid`]s for the
//! bilinear, patch, first- and second-order conservative, and nearest
//! neighbour methods. Grids are spherical (longitude/latitude in degrees,
//! optionally periodic in longitude) or Cartesian, with 1 to 3 axes.
//!
//! Access goes through a [`SolverManager`]: acquire a session, register
//! grids as handles, compute weights, and let the handles drop.

mod conservative;
mod linear;
mod nearest;
mod patch;
mod solve;

pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod manager;
pub mod method;
pub mod weights;

pub use config::SolverConfig;
pub use error::{SolverError, SolverResult};
pub use grid::{CoordSys, Grid, Layout};
pub use manager::{GridHandle, SolverManager, SolverSession};
pub use method::{SolverMethod, SolverParams, UnmappedAction};
pub use solve::compute_weights;
pub use weights::{RegridWeights, WeightMatrix};
