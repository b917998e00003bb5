//! Analysis configuration
//!
//! Settings can be read from a TOML file and then overridden from the
//! command line.
//!
//! # Example coruscant.toml
//!
//! ```toml
//! # Dirichlet pseudo-count pulling estimates toward steady state
//! mu = 2.0
//!
//! # Prior probability that a subspan is influential
//! prior_influential = 0.5
//!
//! # "fundamental_matrix" or "matrix_power"
//! solver = "fundamental_matrix"
//! squarings = 12
//!
//! workers = 4
//! ```

use crate::error::{AttributionError, Result};
use crate::influence::{InfluenceScorer, DEFAULT_MU, DEFAULT_PRIOR_INFLUENTIAL};
use crate::steady_state::{SolverMethod, SteadyStateSolver, DEFAULT_SQUARINGS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Upper bound on power-method squarings (P^(2^64) is far past convergence)
const MAX_SQUARINGS: u32 = 64;

/// Parameters of one analysis pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Dirichlet pseudo-count (must be >= 0)
    ///
    /// - 0: the influential-hypothesis rate is the raw conditional failure rate
    /// - large: the rate stays close to the steady-state failure absorption
    pub mu: f64,

    /// Prior probability of the "influential" hypothesis, in (0, 1)
    ///
    /// Default: 0.5 (both hypotheses equally likely a priori)
    pub prior_influential: f64,

    /// Method used to compute absorption probabilities
    pub solver: SolverMethod,

    /// Squarings for the power method (the matrix is raised to 2^squarings)
    pub squarings: u32,

    /// Worker threads analyzing spans in parallel (1 = current thread)
    pub workers: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mu: DEFAULT_MU,
            prior_influential: DEFAULT_PRIOR_INFLUENTIAL,
            solver: SolverMethod::FundamentalMatrix,
            squarings: DEFAULT_SQUARINGS,
            workers: 1,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| AttributionError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content).map_err(|e| {
            AttributionError::InvalidConfig(format!("{}: {}", path.display(), e))
        })
    }

    /// Parse and validate configuration from TOML content
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| AttributionError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        InfluenceScorer::new(self.mu, self.prior_influential)?;

        if self.squarings == 0 || self.squarings > MAX_SQUARINGS {
            return Err(AttributionError::InvalidConfig(format!(
                "squarings must be in 1..={}, got {}",
                MAX_SQUARINGS, self.squarings
            )));
        }

        if self.workers == 0 {
            return Err(AttributionError::InvalidConfig(
                "workers must be >= 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Scorer configured with this `mu` and prior
    pub fn scorer(&self) -> Result<InfluenceScorer> {
        InfluenceScorer::new(self.mu, self.prior_influential)
    }

    /// Solver configured with this method
    pub fn solver(&self) -> SteadyStateSolver {
        SteadyStateSolver::new(self.solver, self.squarings)
    }
}
