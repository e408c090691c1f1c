//! Configuration for the solver manager.

use serde::{Deserialize, Serialize};

/// Configuration for the solver manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Worker threads for per-destination weight rows. 0 uses rayon's default.
    pub threads: usize,

    /// Log each weight computation at debug level.
    pub logging: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            logging: false,
        }
    }
}

impl SolverConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("REGRID_SOLVER_THREADS") {
            if let Ok(threads) = val.parse() {
                config.threads = threads;
            }
        }

        if let Ok(val) = std::env::var("REGRID_SOLVER_LOGGING") {
            config.logging = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.threads > 1024 {
            return Err("threads must be <= 1024".to_string());
        }
        Ok(())
    }
}
