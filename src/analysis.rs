//! Per-span failure attribution over a dependency summary
//!
//! For every span with a transition graph and a failure baseline:
//!
//! ```text
//! span_markov[span] ──► SteadyStateSolver ──► AbsorptionMap
//!                                                  │ steady_s / steady_f
//! fail_bernoulli[span] ──────────────────► InfluenceScorer ──► scores
//! ```
//!
//! Spans share nothing, so they are split into chunks and analyzed on scoped
//! worker threads. Results are gathered into ordered maps, which keeps the
//! report identical for any worker count.

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::influence::{InfluenceScorer, SpanInfluence};
use crate::steady_state::{AbsorptionMap, SteadyStateSolver};
use crate::summary::{
    DependencySummary, FailureCounts, FailureTable, TransitionGraph, TOTAL_KEY,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Attribution results for one span
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanReport {
    /// Aggregate `(failures, total)` of the span
    pub baseline: FailureCounts,
    /// Absorption probabilities of every subspan
    pub absorption: AbsorptionMap,
    /// Influence scores and their inputs
    pub influence: SpanInfluence,
}

/// Attribution results for a whole summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Configuration the report was produced with
    pub config: AnalysisConfig,
    /// Span -> results
    pub spans: BTreeMap<String, SpanReport>,
    /// Spans with a graph but no recorded outcomes
    pub skipped: Vec<String>,
}

impl AnalysisReport {
    /// Span -> subspan -> influence score
    pub fn scores(&self) -> BTreeMap<&str, &BTreeMap<String, f64>> {
        self.spans
            .iter()
            .map(|(span, report)| (span.as_str(), &report.influence.scores))
            .collect()
    }

    /// Score of one subspan, if the span was analyzed
    pub fn score(&self, span: &str, subspan: &str) -> Option<f64> {
        self.spans
            .get(span)
            .and_then(|report| report.influence.scores.get(subspan))
            .copied()
    }

    /// Number of failure table rows excluded across all spans
    pub fn warning_count(&self) -> usize {
        self.spans
            .values()
            .map(|report| report.influence.warnings.len())
            .sum()
    }
}

/// Solve and score a single span
///
/// Returns `Ok(None)` when the span has no failure table or no `__TOTAL__`
/// row.
pub fn analyze_span(
    span: &str,
    graph: &TransitionGraph,
    table: Option<&FailureTable>,
    solver: &SteadyStateSolver,
    scorer: &InfluenceScorer,
) -> Result<Option<SpanReport>> {
    let Some(table) = table else {
        tracing::debug!("Skipping span {}: no failure statistics", span);
        return Ok(None);
    };
    let Some(&baseline) = table.get(TOTAL_KEY) else {
        tracing::debug!("Skipping span {}: no failure baseline", span);
        return Ok(None);
    };

    let absorption = solver.solve(span, graph)?;
    let Some(influence) = scorer.score(span, graph, table, &absorption) else {
        return Ok(None);
    };

    tracing::debug!(
        "Analyzed span {}: {} subspans, {} excluded rows",
        span,
        influence.scores.len(),
        influence.warnings.len()
    );
    Ok(Some(SpanReport {
        baseline,
        absorption,
        influence,
    }))
}

type SpanOutcome = (String, Option<SpanReport>);

fn analyze_chunk(
    chunk: &[(&String, &TransitionGraph)],
    summary: &DependencySummary,
    solver: SteadyStateSolver,
    scorer: InfluenceScorer,
) -> Result<Vec<SpanOutcome>> {
    chunk
        .iter()
        .map(|&(span, graph)| {
            let table = summary.fail_bernoulli.get(span);
            analyze_span(span, graph, table, &solver, &scorer)
                .map(|report| (span.clone(), report))
        })
        .collect()
}

/// Analyze every span of a summary
///
/// # Example
///
/// ```
/// use coruscant::analysis::analyze;
/// use coruscant::config::AnalysisConfig;
/// use coruscant::summary::DependencySummary;
///
/// let summary = DependencySummary::from_json_str(r#"{
///     "span_markov": {"handler": {
///         "__INITIAL_STATE__": {"db": 1.0},
///         "db": {"__SUCCESS_STATE__": 0.8, "__FAILURE_STATE__": 0.2}
///     }},
///     "fail_bernoulli": {"handler": {"__TOTAL__": [2, 10], "db": [2, 2], "": [0, 8]}}
/// }"#).unwrap();
///
/// let report = analyze(&summary, &AnalysisConfig::default()).unwrap();
/// assert!(report.score("handler", "db").unwrap() > 0.5);
/// ```
pub fn analyze(summary: &DependencySummary, config: &AnalysisConfig) -> Result<AnalysisReport> {
    config.validate()?;
    let solver = config.solver();
    let scorer = config.scorer()?;

    let jobs: Vec<(&String, &TransitionGraph)> = summary.span_markov.iter().collect();
    let outcomes: Vec<SpanOutcome> = if config.workers <= 1 || jobs.len() <= 1 {
        analyze_chunk(&jobs, summary, solver, scorer)?
    } else {
        let chunk_size = jobs.len().div_ceil(config.workers);
        let results = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move |_| analyze_chunk(chunk, summary, solver, scorer))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic));

        let mut outcomes = Vec::with_capacity(jobs.len());
        for result in results {
            outcomes.extend(result?);
        }
        outcomes
    };

    let mut spans = BTreeMap::new();
    let mut skipped = Vec::new();
    for (span, report) in outcomes {
        match report {
            Some(report) => {
                spans.insert(span, report);
            }
            None => skipped.push(span),
        }
    }
    skipped.sort();

    tracing::info!(
        "Analyzed {} spans ({} skipped) with {} worker(s)",
        spans.len(),
        skipped.len(),
        config.workers
    );
    Ok(AnalysisReport {
        config: config.clone(),
        spans,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steady_state::SolverMethod;
    use crate::summary::{FAILURE_STATE, SUCCESS_STATE};

    fn summary() -> DependencySummary {
        DependencySummary::from_json_str(
            r#"{
                "span_markov": {
                    "checkout": {
                        "__INITIAL_STATE__": {"auth": 1.0},
                        "auth": {"payment": 0.9, "__FAILURE_STATE__": 0.1},
                        "payment": {"__SUCCESS_STATE__": 0.7, "__FAILURE_STATE__": 0.3}
                    },
                    "payment": {
                        "__INITIAL_STATE__": {"gateway": 1.0},
                        "gateway": {"__SUCCESS_STATE__": 1.0}
                    },
                    "search": {
                        "__INITIAL_STATE__": {"__SUCCESS_STATE__": 1.0}
                    }
                },
                "fail_bernoulli": {
                    "checkout": {
                        "__TOTAL__": [37, 100],
                        "payment": [27, 30],
                        "auth": [10, 12],
                        "": [0, 58]
                    },
                    "payment": {"": [0, 30]}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_analyze_scores_failing_subspans() {
        let report = analyze(&summary(), &AnalysisConfig::default()).unwrap();

        assert_eq!(report.spans.len(), 1);
        assert!(report.score("checkout", "payment").unwrap() > 0.99);
        assert!(report.score("checkout", "auth").unwrap() > 0.99);
        assert_eq!(report.warning_count(), 0);
    }

    #[test]
    fn test_analyze_lists_skipped_spans() {
        let report = analyze(&summary(), &AnalysisConfig::default()).unwrap();
        // payment has a table without __TOTAL__, search has no table at all
        assert_eq!(report.skipped, vec!["payment".to_string(), "search".to_string()]);
    }

    #[test]
    fn test_absorption_is_reported() {
        let report = analyze(&summary(), &AnalysisConfig::default()).unwrap();
        let absorption = &report.spans["checkout"].absorption;

        assert!((absorption.failure("payment") - 0.3).abs() < 1e-9);
        assert!((absorption.failure("auth") - (0.1 + 0.9 * 0.3)).abs() < 1e-9);
        assert!((absorption.success(SUCCESS_STATE) - 1.0).abs() < 1e-12);
        assert!((absorption.failure(FAILURE_STATE) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = analyze(&summary(), &AnalysisConfig::default()).unwrap();
        let parallel_config = AnalysisConfig {
            workers: 3,
            ..AnalysisConfig::default()
        };
        let parallel = analyze(&summary(), &parallel_config).unwrap();

        assert_eq!(sequential.spans, parallel.spans);
        assert_eq!(sequential.skipped, parallel.skipped);
    }

    #[test]
    fn test_power_method_report_is_close() {
        let exact = analyze(&summary(), &AnalysisConfig::default()).unwrap();
        let power_config = AnalysisConfig {
            solver: SolverMethod::MatrixPower,
            ..AnalysisConfig::default()
        };
        let power = analyze(&summary(), &power_config).unwrap();

        for (subspan, score) in &exact.spans["checkout"].influence.scores {
            let other = power.score("checkout", subspan).unwrap();
            assert!((score - other).abs() < 1e-9, "{}: {} vs {}", subspan, score, other);
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = AnalysisConfig {
            mu: -2.0,
            ..AnalysisConfig::default()
        };
        assert!(analyze(&summary(), &config).is_err());
    }

    #[test]
    fn test_solver_error_fails_analysis() {
        let broken = DependencySummary::from_json_str(
            r#"{
                "span_markov": {"s": {"a": {"__SUCCESS_STATE__": -0.5}}},
                "fail_bernoulli": {"s": {"__TOTAL__": [1, 2]}}
            }"#,
        )
        .unwrap();
        assert!(analyze(&broken, &AnalysisConfig::default()).is_err());
    }

    #[test]
    fn test_overweight_graph_fails_instead_of_scoring_nan() {
        let broken = DependencySummary::from_json_str(
            r#"{
                "span_markov": {"s": {"A": {"__FAILURE_STATE__": 1.5}}},
                "fail_bernoulli": {"s": {"__TOTAL__": [10, 100], "A": [5, 6]}}
            }"#,
        )
        .unwrap();
        let config = AnalysisConfig {
            mu: 10.0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            analyze(&broken, &config),
            Err(crate::error::AttributionError::RowMassExceedsOne { .. })
        ));
    }

    #[test]
    fn test_empty_summary() {
        let report = analyze(&DependencySummary::default(), &AnalysisConfig::default()).unwrap();
        assert!(report.spans.is_empty());
        assert!(report.skipped.is_empty());
        assert!(report.scores().is_empty());
    }
}
