// Bayesian influence scoring of subspans
//
// For every subspan of a span, weighs two explanations of the failures seen
// while that subspan was failing:
// - the subspan is influential: failures follow a rate smoothed toward the
//   subspan's steady-state failure absorption
// - the subspan is not influential: failures follow the span's baseline rate
//
// The score is the posterior probability of the first explanation.

mod counts;
mod posterior;

pub use counts::{ConditionalCounts, FailureIndex, KeyIssue, KeyWarning};
pub use posterior::{baseline_rate, bernoulli_log_likelihood, dirichlet_estimate, posterior};

use crate::error::{AttributionError, Result};
use crate::steady_state::AbsorptionMap;
use crate::summary::{graph_vertices, FailureCounts, FailureTable, TransitionGraph};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default Dirichlet pseudo-count
pub const DEFAULT_MU: f64 = 1.0;

/// Default prior probability of the "influential" hypothesis
pub const DEFAULT_PRIOR_INFLUENTIAL: f64 = 0.5;

/// Everything that went into one subspan's score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InfluenceDetail {
    /// Posterior probability that the subspan is influential
    pub score: f64,
    /// Counts observed while the subspan was failing
    pub counts: ConditionalCounts,
    /// Span-wide failures
    pub total_f: u64,
    /// Span-wide successes
    pub total_s: u64,
    /// Steady-state absorption into the success state
    pub steady_s: f64,
    /// Steady-state absorption into the failure state
    pub steady_f: f64,
    /// Smoothed failure rate under the influential hypothesis
    pub pi_f: f64,
    /// Baseline failure rate under the null hypothesis
    pub pi_f_not: f64,
    /// Log-likelihood under the influential hypothesis
    pub ln_likelihood: f64,
    /// Log-likelihood under the null hypothesis
    pub ln_likelihood_null: f64,
}

/// Scores of every subspan of one span
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpanInfluence {
    /// Subspan -> influence score
    pub scores: BTreeMap<String, f64>,
    /// Subspan -> scoring inputs and intermediates
    pub details: BTreeMap<String, InfluenceDetail>,
    /// Failure table rows excluded from counting
    pub warnings: Vec<KeyWarning>,
}

/// Scorer with fixed smoothing and prior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfluenceScorer {
    mu: f64,
    prior_influential: f64,
}

impl Default for InfluenceScorer {
    fn default() -> Self {
        Self {
            mu: DEFAULT_MU,
            prior_influential: DEFAULT_PRIOR_INFLUENTIAL,
        }
    }
}

impl InfluenceScorer {
    /// Create a scorer, validating `mu >= 0` and `0 < prior_influential < 1`
    pub fn new(mu: f64, prior_influential: f64) -> Result<Self> {
        if !mu.is_finite() || mu < 0.0 {
            return Err(AttributionError::InvalidConfig(format!(
                "mu must be finite and non-negative, got {}",
                mu
            )));
        }
        if !(prior_influential > 0.0 && prior_influential < 1.0) {
            return Err(AttributionError::InvalidConfig(format!(
                "prior_influential must be in (0, 1), got {}",
                prior_influential
            )));
        }
        Ok(Self {
            mu,
            prior_influential,
        })
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn prior_influential(&self) -> f64 {
        self.prior_influential
    }

    /// Score one subspan from its counts and steady-state priors
    pub fn score_subspan(
        &self,
        counts: ConditionalCounts,
        baseline: FailureCounts,
        steady_s: f64,
        steady_f: f64,
    ) -> InfluenceDetail {
        let pi_f = dirichlet_estimate(counts, steady_f, self.mu);
        let pi_f_not = baseline_rate(baseline);

        let ln_likelihood = bernoulli_log_likelihood(pi_f, counts);
        let ln_likelihood_null = bernoulli_log_likelihood(pi_f_not, counts);
        let score = posterior(ln_likelihood, ln_likelihood_null, self.prior_influential);

        InfluenceDetail {
            score,
            counts,
            total_f: baseline.failures,
            total_s: baseline.successes(),
            steady_s,
            steady_f,
            pi_f,
            pi_f_not,
            ln_likelihood,
            ln_likelihood_null,
        }
    }

    /// Score every vertex of a span's graph
    ///
    /// Returns `None` when the failure table has no `__TOTAL__` row.
    pub fn score(
        &self,
        span: &str,
        graph: &TransitionGraph,
        table: &FailureTable,
        absorption: &AbsorptionMap,
    ) -> Option<SpanInfluence> {
        let vertices = graph_vertices(graph);
        let index = FailureIndex::build(span, table, &vertices)?;
        let baseline = index.baseline();

        let mut scores = BTreeMap::new();
        let mut details = BTreeMap::new();
        for subspan in vertices {
            let detail = self.score_subspan(
                index.conditional_counts(subspan),
                baseline,
                absorption.success(subspan),
                absorption.failure(subspan),
            );
            tracing::trace!(
                "Span {} subspan {}: score={:.3e} counts=({}, {}) pi_f={:.3e} pi_f_not={:.3e}",
                span,
                subspan,
                detail.score,
                detail.counts.successes,
                detail.counts.failures,
                detail.pi_f,
                detail.pi_f_not
            );
            scores.insert(subspan.to_string(), detail.score);
            details.insert(subspan.to_string(), detail);
        }

        Some(SpanInfluence {
            scores,
            details,
            warnings: index.into_warnings(),
        })
    }
}
