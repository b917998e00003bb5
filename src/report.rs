//! Console and JSON rendering of attribution results

use crate::analysis::AnalysisReport;
use crate::error::{AttributionError, Result};
use crate::summary::{graph_vertices, is_reserved_state, DependencySummary};

/// One line per analyzed span naming its most influential subspan
pub fn render_summary(report: &AnalysisReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Analyzed {} spans (mu={}, prior={})\n",
        report.spans.len(),
        report.config.mu,
        report.config.prior_influential
    ));

    for (span, span_report) in &report.spans {
        let top = span_report
            .influence
            .scores
            .iter()
            .filter(|(subspan, _)| !is_reserved_state(subspan))
            .max_by(|a, b| a.1.total_cmp(b.1));
        match top {
            Some((subspan, score)) => out.push_str(&format!(
                "  {:<40} {} ({:.4})\n",
                span, subspan, score
            )),
            None => out.push_str(&format!("  {:<40} (no subspans)\n", span)),
        }
    }

    if !report.skipped.is_empty() {
        out.push_str(&format!(
            "Skipped {} spans without failure observations\n",
            report.skipped.len()
        ));
    }
    let warnings = report.warning_count();
    if warnings > 0 {
        out.push_str(&format!(
            "Excluded {} malformed failure rows (run with -vv for details)\n",
            warnings
        ));
    }
    out
}

/// Full score table, subspans in name order
pub fn render_scores(report: &AnalysisReport) -> String {
    let mut out = String::new();
    for (span, span_report) in &report.spans {
        out.push_str(&format!("{}\n", span));
        for (subspan, score) in &span_report.influence.scores {
            out.push_str(&format!("  {:<40} {:.4}\n", subspan, score));
        }
    }
    out
}

/// Per-subspan scoring inputs and intermediates
pub fn render_details(report: &AnalysisReport) -> String {
    let mut out = String::new();
    for (span, span_report) in &report.spans {
        out.push_str(&format!("\n{}\n", span));
        for (subspan, d) in &span_report.influence.details {
            out.push_str(&format!("\t{:<40}: {:.2e}\n", subspan, d.score));
            out.push_str(&format!(
                "\t{:45} count(s/f)= ({:5}, {:5}), steady_f= {:.1e}\n",
                "", d.counts.successes, d.counts.failures, d.steady_f
            ));
            out.push_str(&format!(
                "\t{:45} total(s/f)= ({:5}, {:5})\n",
                "", d.total_s, d.total_f
            ));
            out.push_str(&format!(
                "\t{:45} pi_f= {:.2e} (ln L= {:.3}), pi_f_not= {:.2e} (ln L= {:.3})\n",
                "", d.pi_f, d.ln_likelihood, d.pi_f_not, d.ln_likelihood_null
            ));
        }
        for warning in &span_report.influence.warnings {
            out.push_str(&format!("\twarning: {}\n", warning));
        }
    }
    out
}

/// Scores, absorption probabilities, subspan failure probabilities and raw
/// failure table of one span
pub fn render_span(
    summary: &DependencySummary,
    report: &AnalysisReport,
    span: &str,
) -> Result<String> {
    let Some(graph) = summary.span_markov.get(span) else {
        return Err(AttributionError::UnknownSpan(span.to_string()));
    };

    let mut out = String::new();
    out.push_str("================================\n");
    out.push_str(&format!("span= {}\n\n", span));

    match report.spans.get(span) {
        Some(span_report) => {
            out.push_str("Influence scores:\n");
            for (subspan, score) in &span_report.influence.scores {
                out.push_str(&format!("  {:<40} {:.4}\n", subspan, score));
            }
            out.push_str("\nAbsorption probabilities:\n");
            for (subspan, row) in span_report.absorption.iter() {
                let sinks: Vec<String> = row
                    .iter()
                    .map(|(sink, p)| format!("{}={:.4}", sink, p))
                    .collect();
                out.push_str(&format!("  {:<40} {}\n", subspan, sinks.join(", ")));
            }
        }
        None => out.push_str("No failure observations recorded for this span\n"),
    }

    // subspans that are spans in their own right
    let failing: Vec<(&str, f64)> = graph_vertices(graph)
        .into_iter()
        .map(|subspan| (subspan, summary.failure_probability(subspan)))
        .filter(|&(_, probability)| probability > 0.0)
        .collect();
    if !failing.is_empty() {
        out.push_str("\nSubspan failure probabilities:\n");
        for (subspan, probability) in failing {
            out.push_str(&format!("\t{}: {}\n", subspan, probability));
        }
    }

    out.push_str("\nFailure events:\n");
    match summary.fail_bernoulli.get(span) {
        Some(table) => {
            for (key, counts) in table {
                let label = if key.is_empty() { "(none)" } else { key.as_str() };
                out.push_str(&format!(
                    "  {:<40} {}/{}\n",
                    label, counts.failures, counts.total
                ));
            }
        }
        None => out.push_str("  (none)\n"),
    }
    Ok(out)
}

/// Unconditional failure probability per span
///
/// Without a focus list only spans that failed at least once are listed; with
/// one, every focused span is listed, 0 when it has no statistics.
pub fn render_fault_probabilities(summary: &DependencySummary, focus: &[String]) -> String {
    let mut out = String::new();
    out.push_str("================================\n");
    out.push_str("Non-zero Fault Bernoulli\n");

    if focus.is_empty() {
        for span in summary.fail_bernoulli.keys() {
            let probability = summary.failure_probability(span);
            if probability > 0.0 {
                out.push_str(&format!("\t{}: {}\n", span, probability));
            }
        }
    } else {
        for span in focus {
            let probability = summary.failure_probability(span);
            out.push_str(&format!("\t{}: {}\n", span, probability));
        }
    }
    out
}

/// Whole report as pretty-printed JSON
pub fn render_json(report: &AnalysisReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}
