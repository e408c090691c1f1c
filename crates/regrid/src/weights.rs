//! Weight computation through a pluggable solver.

use mesh_solver::{Grid, RegridWeights, SolverManager, SolverParams, UnmappedAction};
use tracing::debug;

use crate::error::Result;
use crate::method::RegridMethod;

/// Computes sparse regridding weights between two grids.
///
/// Implementations must release any solver-side grid resources before
/// returning, on success and on error.
pub trait WeightSolver: Send + Sync {
    /// Compute weights from `src` to `dst`.
    ///
    /// # Arguments
    /// * `src` - Source grid, with the source mask applied
    /// * `dst` - Destination grid, with the destination mask applied
    /// * `params` - Method, degenerate-cell and unmapped-cell policy
    ///
    /// # Returns
    /// The weight matrix with source/destination fractions
    fn compute(&self, src: Grid, dst: Grid, params: &SolverParams) -> Result<RegridWeights>;
}

impl WeightSolver for SolverManager {
    fn compute(&self, src: Grid, dst: Grid, params: &SolverParams) -> Result<RegridWeights> {
        let session = self.acquire()?;
        let src = session.create_grid(src);
        let dst = session.create_grid(dst);
        Ok(session.compute(&src, &dst, params)?)
    }
}

/// Maps a regridding method and policy onto solver calls.
pub struct WeightComputer<'s> {
    solver: &'s dyn WeightSolver,
    unmapped_action: UnmappedAction,
}

impl<'s> WeightComputer<'s> {
    pub fn new(solver: &'s dyn WeightSolver, unmapped_action: UnmappedAction) -> Self {
        Self {
            solver,
            unmapped_action,
        }
    }

    /// Compute weights, source fraction and destination fraction.
    pub fn compute(
        &self,
        src: Grid,
        dst: Grid,
        method: RegridMethod,
        ignore_degenerate: bool,
    ) -> Result<RegridWeights> {
        let params = SolverParams::new(method.solver_method())
            .with_unmapped_action(self.unmapped_action)
            .with_ignore_degenerate(ignore_degenerate);
        debug!(
            %method,
            src_cells = src.size(),
            dst_cells = dst.size(),
            src_masked = src.mask().map_or(0, |m| m.iter().filter(|&&v| v).count()),
            "Computing regrid weights"
        );
        self.solver.compute(src, dst, &params)
    }
}
