// Dirichlet-smoothed estimates and the influence posterior
//
// Two hypotheses explain the failures observed while a subspan was failing:
//
//   influential: failure rate pi_f = (count_f + mu * steady_f) / (count + mu)
//   null:        failure rate is the span's baseline total_f / total
//
// Likelihoods are Bernoulli and are evaluated in log space, where large
// counts would otherwise underflow to 0 and make the ratio 0/0.

use super::counts::ConditionalCounts;
use crate::summary::FailureCounts;

/// Smoothed failure rate under the "influential" hypothesis
///
/// With no counts and no smoothing mass the estimate falls back to the prior
/// `steady_f`. The result is kept in [0, 1] so solver rounding cannot push
/// `1 - pi_f` below zero.
pub fn dirichlet_estimate(counts: ConditionalCounts, steady_f: f64, mu: f64) -> f64 {
    let steady_f = steady_f.clamp(0.0, 1.0);
    let denominator = counts.total() as f64 + mu;
    if denominator == 0.0 {
        return steady_f;
    }
    ((counts.failures as f64 + mu * steady_f) / denominator).clamp(0.0, 1.0)
}

/// Failure rate under the null hypothesis: the span's unconditional rate
pub fn baseline_rate(baseline: FailureCounts) -> f64 {
    baseline.failure_rate()
}

/// `failures * ln(p) + successes * ln(1 - p)` with `0 * ln(0) = 0`
///
/// Returns `-inf` when an outcome with positive count has probability 0.
pub fn bernoulli_log_likelihood(p: f64, counts: ConditionalCounts) -> f64 {
    weighted_ln(counts.failures, p) + weighted_ln(counts.successes, 1.0 - p)
}

fn weighted_ln(count: u64, p: f64) -> f64 {
    if count == 0 {
        0.0
    } else {
        count as f64 * p.ln()
    }
}

/// Posterior probability of the influential hypothesis
///
/// `prior` is the prior probability of "influential", in (0, 1). When one
/// likelihood is exactly zero the other hypothesis wins outright; when both
/// are zero the data cannot discriminate and the prior is returned.
pub fn posterior(ln_influential: f64, ln_null: f64, prior: f64) -> f64 {
    match (ln_influential == f64::NEG_INFINITY, ln_null == f64::NEG_INFINITY) {
        (true, true) => prior,
        (true, false) => 0.0,
        (false, true) => 1.0,
        (false, false) => {
            let log_odds = prior.ln() - (1.0 - prior).ln() + ln_influential - ln_null;
            1.0 / (1.0 + (-log_odds).exp())
        }
    }
}
