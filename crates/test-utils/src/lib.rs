//! Shared test utilities for the cf-regrid workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Field and mapping fixtures on regular global and Cartesian grids
//! - Coordinate and cell-bounds generators
//! - Approximate-equality assertion macros
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, fixtures};
//! ```

use std::sync::Once;

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

static TRACING: Once = Once::new();

/// Install a `tracing` subscriber for tests, once per process.
///
/// Honours `RUST_LOG`; output goes through the test harness writer so it is
/// only shown for failing tests.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for approximate equality of masked values (`Option<f64>` slices).
///
/// Missing values must line up exactly; present values are compared with
/// [`assert_approx_eq!`].
///
/// ```ignore
/// use test_utils::assert_values_approx_eq;
///
/// assert_values_approx_eq!(&[Some(1.0001), None], &[Some(1.0), None], 0.001);
/// ```
#[macro_export]
macro_rules! assert_values_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: &[Option<f64>] = $left;
        let right: &[Option<f64>] = $right;
        assert_eq!(left.len(), right.len(), "length mismatch: {:?} vs {:?}", left, right);
        for (i, (l, r)) in left.iter().zip(right).enumerate() {
            match (l, r) {
                (Some(l), Some(r)) => $crate::assert_approx_eq!(*l, *r, $epsilon),
                (None, None) => {}
                _ => panic!(
                    "assertion failed: mask mismatch at {}\n  left: `{:?}`,\n right: `{:?}`",
                    i, left, right
                ),
            }
        }
    }};
}
