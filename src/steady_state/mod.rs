// Steady-state absorption solver for span transition graphs
//
// Every span's subspans form a Markov chain that ends in one of two absorbing
// sinks, __SUCCESS_STATE__ or __FAILURE_STATE__. For each subspan this module
// computes the probability that a walk starting there ends in each sink.
//
// Two methods are available:
// - FundamentalMatrix (default): solves (I - Q) B = R exactly
// - MatrixPower: raises the transition matrix to 2^squarings
//
// Both agree within numerical tolerance on well-formed graphs; the power
// method is kept to cross-check summaries against older analyses.

mod fundamental;
mod matrix;
mod power;

pub use matrix::TransitionMatrix;

use crate::error::Result;
use crate::summary::{TransitionGraph, FAILURE_STATE, SUCCESS_STATE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Absorption probabilities at or below this are not stored
pub const ABSORPTION_EPSILON: f64 = 1e-12;

/// Squarings used by the power method unless configured otherwise (P^4096)
pub const DEFAULT_SQUARINGS: u32 = 12;

/// How the limiting distribution is computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    /// Linear solve of the fundamental-matrix system
    #[default]
    FundamentalMatrix,
    /// Repeated squaring of the transition matrix
    MatrixPower,
}

/// Subspan -> absorbing sink -> probability of ending there
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbsorptionMap {
    rows: BTreeMap<String, BTreeMap<String, f64>>,
}

impl AbsorptionMap {
    /// Probability of a walk from `from` ending in sink `sink` (0 if absent)
    pub fn probability(&self, from: &str, sink: &str) -> f64 {
        self.rows
            .get(from)
            .and_then(|row| row.get(sink))
            .copied()
            .unwrap_or(0.0)
    }

    /// Probability of ending in the success state
    pub fn success(&self, from: &str) -> f64 {
        self.probability(from, SUCCESS_STATE)
    }

    /// Probability of ending in the failure state
    pub fn failure(&self, from: &str) -> f64 {
        self.probability(from, FAILURE_STATE)
    }

    /// Non-zero absorption probabilities of one vertex
    pub fn row(&self, from: &str) -> Option<&BTreeMap<String, f64>> {
        self.rows.get(from)
    }

    /// Total absorbed mass from a vertex across all sinks
    pub fn total(&self, from: &str) -> f64 {
        self.rows
            .get(from)
            .map(|row| row.values().sum())
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, f64>)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Absorption solver with a fixed method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteadyStateSolver {
    method: SolverMethod,
    squarings: u32,
}

impl Default for SteadyStateSolver {
    fn default() -> Self {
        Self::new(SolverMethod::FundamentalMatrix, DEFAULT_SQUARINGS)
    }
}

impl SteadyStateSolver {
    /// `squarings` only matters for [`SolverMethod::MatrixPower`]
    pub fn new(method: SolverMethod, squarings: u32) -> Self {
        Self { method, squarings }
    }

    pub fn matrix_power(squarings: u32) -> Self {
        Self::new(SolverMethod::MatrixPower, squarings)
    }

    pub fn method(&self) -> SolverMethod {
        self.method
    }

    /// Compute absorption probabilities for every vertex of `graph`
    ///
    /// `span` only labels errors.
    ///
    /// # Example
    ///
    /// ```
    /// use coruscant::steady_state::SteadyStateSolver;
    /// use coruscant::summary::{TransitionGraph, FAILURE_STATE, SUCCESS_STATE};
    ///
    /// let graph: TransitionGraph = serde_json::from_str(&format!(
    ///     r#"{{"A": {{"B": 0.5, "{f}": 0.5}}, "B": {{"{s}": 1.0}}}}"#,
    ///     f = FAILURE_STATE,
    ///     s = SUCCESS_STATE,
    /// ))
    /// .unwrap();
    ///
    /// let absorption = SteadyStateSolver::default().solve("span", &graph).unwrap();
    /// assert!((absorption.failure("A") - 0.5).abs() < 1e-12);
    /// assert!((absorption.success("B") - 1.0).abs() < 1e-12);
    /// ```
    pub fn solve(&self, span: &str, graph: &TransitionGraph) -> Result<AbsorptionMap> {
        let tm = TransitionMatrix::from_graph(span, graph)?;
        let limit = match self.method {
            SolverMethod::FundamentalMatrix => fundamental::absorption_matrix(span, &tm)?,
            SolverMethod::MatrixPower => power::absorption_matrix(&tm, self.squarings),
        };

        let sinks = tm.sink_indices();
        let mut rows = BTreeMap::new();
        for (i, from) in tm.vertices().iter().enumerate() {
            let row: BTreeMap<String, f64> = sinks
                .iter()
                .filter(|&&j| limit[[i, j]] > ABSORPTION_EPSILON)
                .map(|&j| (tm.vertices()[j].clone(), limit[[i, j]]))
                .collect();
            if !row.is_empty() {
                rows.insert(from.clone(), row);
            }
        }

        tracing::trace!(
            "Solved span {} with {:?}: {} vertices, {} sinks",
            span,
            self.method,
            tm.len(),
            sinks.len()
        );
        Ok(AbsorptionMap { rows })
    }
}

/// Solve with the default method
pub fn solve(span: &str, graph: &TransitionGraph) -> Result<AbsorptionMap> {
    SteadyStateSolver::default().solve(span, graph)
}
