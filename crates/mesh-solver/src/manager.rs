//! Process-wide solver manager.
//!
//! The manager owns the worker pool used for weight computation. It starts
//! lazily on the first [`SolverManager::acquire`], serialises calls through
//! a [`SolverSession`] guard, and stays up until [`SolverManager::finalize`]
//! is called explicitly. Grids registered through a session are wrapped in
//! [`GridHandle`]s that release themselves on drop; the manager counts live
//! handles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::config::SolverConfig;
use crate::error::{SolverError, SolverResult};
use crate::grid::Grid;
use crate::method::SolverParams;
use crate::solve::compute_weights;
use crate::weights::RegridWeights;

enum State {
    Uninitialized,
    Ready(Arc<ThreadPool>),
    Finalized,
}

/// Lazily initialised, explicitly finalised solver service.
pub struct SolverManager {
    config: SolverConfig,
    state: Mutex<State>,
    session: Mutex<()>,
    live_handles: Arc<AtomicUsize>,
}

impl SolverManager {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Uninitialized),
            session: Mutex::new(()),
            live_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Start a session, initialising the manager on first use.
    ///
    /// Blocks while another session is active.
    pub fn acquire(&self) -> SolverResult<SolverSession<'_>> {
        let pool = {
            let mut state = self.lock_state()?;
            let existing = match &*state {
                State::Ready(pool) => Some(Arc::clone(pool)),
                State::Finalized => {
                    return Err(SolverError::unavailable("solver manager has been finalized"))
                }
                State::Uninitialized => None,
            };
            match existing {
                Some(pool) => pool,
                None => {
                    let pool = Arc::new(self.build_pool()?);
                    info!(threads = pool.current_num_threads(), "Solver manager initialized");
                    *state = State::Ready(Arc::clone(&pool));
                    pool
                }
            }
        };

        let guard = self
            .session
            .lock()
            .map_err(|_| SolverError::unavailable("solver session lock poisoned"))?;

        Ok(SolverSession {
            manager: self,
            pool,
            _guard: guard,
        })
    }

    /// Shut the manager down. Fails while grid handles are alive.
    pub fn finalize(&self) -> SolverResult<()> {
        let live = self.live_handles();
        if live > 0 {
            return Err(SolverError::HandlesAlive(live));
        }
        let mut state = self.lock_state()?;
        if !matches!(*state, State::Finalized) {
            info!("Solver manager finalized");
        }
        *state = State::Finalized;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state
            .lock()
            .map(|s| matches!(*s, State::Ready(_)))
            .unwrap_or(false)
    }

    pub fn is_finalized(&self) -> bool {
        self.state
            .lock()
            .map(|s| matches!(*s, State::Finalized))
            .unwrap_or(false)
    }

    /// Number of grid handles not yet released.
    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }

    fn lock_state(&self) -> SolverResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| SolverError::unavailable("solver state lock poisoned"))
    }

    fn build_pool(&self) -> SolverResult<ThreadPool> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("mesh-solver-{i}"));
        if self.config.threads > 0 {
            builder = builder.num_threads(self.config.threads);
        }
        builder
            .build()
            .map_err(|e| SolverError::unavailable(format!("worker pool failed to start: {e}")))
    }
}

impl Default for SolverManager {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

/// Exclusive access to the solver for one grid-construction-and-weights call.
pub struct SolverSession<'a> {
    manager: &'a SolverManager,
    pool: Arc<ThreadPool>,
    _guard: MutexGuard<'a, ()>,
}

impl<'a> SolverSession<'a> {
    /// Register a grid with the solver.
    pub fn create_grid(&self, grid: Grid) -> GridHandle {
        self.manager.live_handles.fetch_add(1, Ordering::SeqCst);
        GridHandle {
            grid,
            live: Arc::clone(&self.manager.live_handles),
        }
    }

    /// Compute weights between two registered grids on the worker pool.
    pub fn compute(
        &self,
        src: &GridHandle,
        dst: &GridHandle,
        params: &SolverParams,
    ) -> SolverResult<RegridWeights> {
        let start = Instant::now();
        let result = self
            .pool
            .install(|| compute_weights(src.grid(), dst.grid(), params));

        if self.manager.config.logging {
            match &result {
                Ok(w) => debug!(
                    method = %params.method,
                    src_cells = src.grid().size(),
                    dst_cells = dst.grid().size(),
                    nnz = w.matrix.nnz(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Computed regridding weights"
                ),
                Err(e) => debug!(method = %params.method, error = %e, "Weight computation failed"),
            }
        }
        result
    }
}

/// A grid registered with the solver; released exactly once on drop.
pub struct GridHandle {
    grid: Grid,
    live: Arc<AtomicUsize>,
}

impl GridHandle {
    pub fn grid(&self) -> &Grid {
        &self.grid
    }
}

impl Drop for GridHandle {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CoordSys;
    use crate::method::SolverMethod;

    fn grid() -> Grid {
        Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.0, 1.0, 2.0]]).unwrap()
    }

    #[test]
    fn test_lazy_initialization() {
        let manager = SolverManager::default();
        assert!(!manager.is_initialized());
        let _session = manager.acquire().unwrap();
        assert!(manager.is_initialized());
    }

    #[test]
    fn test_handles_released_on_drop() {
        let manager = SolverManager::default();
        {
            let session = manager.acquire().unwrap();
            let a = session.create_grid(grid());
            let _b = session.create_grid(grid());
            assert_eq!(manager.live_handles(), 2);
            drop(a);
            assert_eq!(manager.live_handles(), 1);
        }
        assert_eq!(manager.live_handles(), 0);
    }

    #[test]
    fn test_finalize_refuses_live_handles() {
        let manager = SolverManager::default();
        let session = manager.acquire().unwrap();
        let handle = session.create_grid(grid());
        assert_eq!(manager.finalize(), Err(SolverError::HandlesAlive(1)));
        drop(handle);
        drop(session);
        manager.finalize().unwrap();
        assert!(manager.is_finalized());
        assert!(matches!(manager.acquire(), Err(SolverError::Unavailable(_))));
    }

    #[test]
    fn test_compute_through_session() {
        let manager = SolverManager::new(SolverConfig {
            threads: 2,
            logging: true,
        });
        let session = manager.acquire().unwrap();
        let src = session.create_grid(grid());
        let dst = session.create_grid(
            Grid::rectilinear(CoordSys::Cartesian, vec![vec![0.5, 1.5]]).unwrap(),
        );
        let w = session
            .compute(&src, &dst, &SolverParams::new(SolverMethod::Bilinear))
            .unwrap();
        assert_eq!(w.matrix.nnz(), 4);
    }
}
