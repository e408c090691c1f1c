//! In-memory climate-data construct model shared by the regridding crates.
//!
//! Provides masked N-d arrays, coordinates with bounds, and fields carrying
//! keyed metadata constructs over named domain axes.

pub mod array;
pub mod coordinate;
pub mod error;
pub mod field;
pub mod mapping;

pub use array::MaskedArray;
pub use coordinate::{Coordinate, Variable, LATITUDE_UNITS, LONGITUDE_UNITS};
pub use error::{CfError, CfResult};
pub use field::{Construct, ConstructKind, CoordinateReference, DomainAxis, Field};
pub use mapping::{AxisOrder, GridMapping};
