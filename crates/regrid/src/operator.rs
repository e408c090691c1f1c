//! Reusable regrid operators.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use cf_model::{Field, GridMapping};
use mesh_solver::{Grid, RegridWeights};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{RegridError, Result};
use crate::method::{check_method, RegridMethod};

/// Destination metadata kept with an operator so the operator alone can be
/// used as a regridding destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DestinationMetadata {
    /// The destination field's domain restricted to its regrid axes.
    Field {
        field: Field,
        /// Regrid axes in solver order.
        axis_keys: Vec<String>,
    },
    /// The destination mapping itself.
    Mapping {
        mapping: GridMapping,
        /// Mapping entry names in solver order.
        axis_keys: Vec<String>,
    },
}

impl DestinationMetadata {
    pub fn axis_keys(&self) -> &[String] {
        match self {
            DestinationMetadata::Field { axis_keys, .. }
            | DestinationMetadata::Mapping { axis_keys, .. } => axis_keys,
        }
    }
}

/// Weights between two grids together with everything needed to apply them
/// again: method, grids, creation flags and destination metadata.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegridOperator {
    method: RegridMethod,
    weights: RegridWeights,
    src_grid: Grid,
    dst_grid: Grid,
    /// Destination sizes in solver order, without padding.
    dst_sizes: Vec<usize>,
    ignore_degenerate: bool,
    use_src_mask: bool,
    use_dst_mask: bool,
    destination: DestinationMetadata,
}

impl RegridOperator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        method: RegridMethod,
        weights: RegridWeights,
        src_grid: Grid,
        dst_grid: Grid,
        dst_sizes: Vec<usize>,
        ignore_degenerate: bool,
        use_src_mask: bool,
        use_dst_mask: bool,
        destination: DestinationMetadata,
    ) -> Self {
        info!(
            %method,
            src_cells = src_grid.size(),
            dst_cells = dst_grid.size(),
            nnz = weights.matrix.nnz(),
            "Created regrid operator"
        );
        Self {
            method,
            weights,
            src_grid,
            dst_grid,
            dst_sizes,
            ignore_degenerate,
            use_src_mask,
            use_dst_mask,
            destination,
        }
    }

    pub fn method(&self) -> RegridMethod {
        self.method
    }

    pub fn weights(&self) -> &RegridWeights {
        &self.weights
    }

    /// The source grid the weights were computed for, mask included.
    pub fn src_grid(&self) -> &Grid {
        &self.src_grid
    }

    pub fn dst_grid(&self) -> &Grid {
        &self.dst_grid
    }

    pub fn dst_sizes(&self) -> &[usize] {
        &self.dst_sizes
    }

    pub fn ignore_degenerate(&self) -> bool {
        self.ignore_degenerate
    }

    pub fn use_src_mask(&self) -> bool {
        self.use_src_mask
    }

    pub fn use_dst_mask(&self) -> bool {
        self.use_dst_mask
    }

    pub fn destination(&self) -> &DestinationMetadata {
        &self.destination
    }

    /// Whether the operator can be applied to data on `grid`.
    ///
    /// The cheap check compares coordinate system, cyclicity and shape; the
    /// full check also compares every coordinate value exactly.
    pub fn is_compatible(&self, grid: &Grid, cheap: bool) -> bool {
        self.mismatch(grid, cheap).is_none()
    }

    /// Like [`RegridOperator::is_compatible`], naming the first mismatching
    /// attribute in the error.
    pub fn check_compatible(&self, grid: &Grid, cheap: bool) -> Result<()> {
        match self.mismatch(grid, cheap) {
            Some(attribute) => Err(RegridError::incompatible(attribute)),
            None => Ok(()),
        }
    }

    fn mismatch(&self, grid: &Grid, cheap: bool) -> Option<&'static str> {
        let own = &self.src_grid;
        if own.coord_sys() != grid.coord_sys() {
            return Some("coordinate system");
        }
        if own.is_cyclic() != grid.is_cyclic() {
            return Some("cyclicity");
        }
        if own.shape() != grid.shape() || own.layout() != grid.layout() {
            return Some("shape");
        }
        if !cheap && own.centers() != grid.centers() {
            return Some("coordinates");
        }
        None
    }

    /// Check a method supplied alongside the operator.
    ///
    /// `None` always passes; otherwise the method must be valid and
    /// equivalent to the operator's.
    pub fn check_method(&self, method: Option<&str>) -> Result<()> {
        let Some(name) = method else {
            return Ok(());
        };
        let method = check_method(Some(name))?;
        if !method.is_equivalent(self.method) {
            return Err(RegridError::invalid_option(format!(
                "method '{method}' does not match the operator's method '{}'",
                self.method
            )));
        }
        Ok(())
    }

    /// Write the operator to `path` as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Read an operator written by [`RegridOperator::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
