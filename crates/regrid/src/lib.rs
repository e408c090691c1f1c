//! Regridding of CF-style fields between geophysical grids.
//!
//! Field data on a source grid (rectilinear, curvilinear or Cartesian with
//! 1 to 3 axes) is resampled onto a destination grid given as another
//! field, a coordinate mapping, or a previously built [`RegridOperator`].
//!
//! # Architecture
//!
//! ```text
//! Field / GridMapping
//!      │
//!      ▼
//! extract ──► grid ──► weights (WeightSolver) ──► RegridOperator
//!                                                      │
//!                    section ◄── apply ◄───────────────┘
//!                                  │
//!                                  ▼
//!                              metadata ──► regridded Field
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mesh_solver::SolverManager;
//! use regrid::{RegridConfig, RegridOptions, Regridder};
//!
//! let manager = SolverManager::default();
//! let regridder = Regridder::new(&manager, RegridConfig::from_env());
//! let options = RegridOptions::new("conservative_1st");
//! let regridded = regridder.regrids(&src, &dst, &options)?;
//! ```

pub mod apply;
pub mod config;
pub mod error;
pub mod extract;
pub mod grid;
pub mod metadata;
pub mod method;
pub mod operator;
pub mod section;
pub mod types;
pub mod weights;

// Re-export commonly used types at crate root
pub use apply::{MassRecord, RegridOutput, Regridded, Regridder};
pub use config::{AxisSelector, RegridConfig, RegridOptions, XyAxes};
pub use error::{RegridError, Result};
pub use extract::{extract_cartesian, extract_spherical, CartesianCoords, SphericalCoords};
pub use grid::{contiguous_bounds, detect_cyclic, GridBuilder};
pub use metadata::MetadataPropagator;
pub use method::{check_method, check_use_src_mask, RegridMethod, METHODS};
pub use operator::{DestinationMetadata, RegridOperator};
pub use section::{MaskGroup, SectionPlan};
pub use types::{Destination, GridRole, GridSource};
pub use weights::{WeightComputer, WeightSolver};
