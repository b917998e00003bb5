//! Dependency summary snapshot consumed by the analysis
//!
//! The collector appends one JSON object per line to its summary file every
//! write period. Each object carries two tables keyed by span name:
//!
//! ```text
//! {
//!   "span_markov":    { span: { subspan: { next_subspan: probability } } },
//!   "fail_bernoulli": { span: { "a, b": [failures, total], "__TOTAL__": [failures, total] } }
//! }
//! ```
//!
//! Only the most recent line is analyzed; older lines are earlier snapshots of
//! the same counters.

use crate::error::{AttributionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Absorbing sink reached when a span completes successfully
pub const SUCCESS_STATE: &str = "__SUCCESS_STATE__";

/// Absorbing sink reached when a span completes with an error
pub const FAILURE_STATE: &str = "__FAILURE_STATE__";

/// Entry vertex of every span's transition graph
pub const INITIAL_STATE: &str = "__INITIAL_STATE__";

/// Failure table key holding the span's aggregate counts
pub const TOTAL_KEY: &str = "__TOTAL__";

/// Subspan name -> next subspan name -> transition probability
pub type TransitionGraph = BTreeMap<String, BTreeMap<String, f64>>;

/// Failing-subspan-set key -> counts observed for that combination
pub type FailureTable = BTreeMap<String, FailureCounts>;

/// Bernoulli counts for one failing-subspan combination
///
/// Serialized as a `[failures, total]` pair to stay compatible with existing
/// summary files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u64, u64)", into = "(u64, u64)")]
pub struct FailureCounts {
    /// Observations that ended in the failure state
    pub failures: u64,
    /// All observations
    pub total: u64,
}

impl FailureCounts {
    pub fn new(failures: u64, total: u64) -> Self {
        Self { failures, total }
    }

    /// Observations that ended in the success state
    pub fn successes(&self) -> u64 {
        self.total.saturating_sub(self.failures)
    }

    /// A pair with more failures than observations cannot come from a collector
    pub fn is_consistent(&self) -> bool {
        self.failures <= self.total
    }

    /// Empirical failure rate, 0 when nothing was observed
    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.failures as f64 / self.total as f64
    }
}

impl From<(u64, u64)> for FailureCounts {
    fn from((failures, total): (u64, u64)) -> Self {
        Self { failures, total }
    }
}

impl From<FailureCounts> for (u64, u64) {
    fn from(counts: FailureCounts) -> Self {
        (counts.failures, counts.total)
    }
}

/// One snapshot of the collector's per-span models
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencySummary {
    /// Span name -> subspan transition graph
    #[serde(default)]
    pub span_markov: BTreeMap<String, TransitionGraph>,

    /// Span name -> failure statistics table
    #[serde(default)]
    pub fail_bernoulli: BTreeMap<String, FailureTable>,
}

impl DependencySummary {
    /// Parse a single JSON snapshot
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| AttributionError::Parse { line: 1, source })
    }

    /// Parse JSON Lines content and keep the most recent snapshot
    ///
    /// Returns `Ok(None)` when the content holds no non-empty line.
    pub fn from_jsonl_str(content: &str) -> Result<Option<Self>> {
        let last = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .last();

        match last {
            Some((index, line)) => serde_json::from_str(line)
                .map(Some)
                .map_err(|source| AttributionError::Parse {
                    line: index + 1,
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Load the most recent snapshot from a summary file
    ///
    /// # Example
    ///
    /// ```no_run
    /// use coruscant::summary::DependencySummary;
    ///
    /// # fn main() -> coruscant::error::Result<()> {
    /// let summary = DependencySummary::from_jsonl_file("dependency_summary.jsons")?;
    /// println!("{} spans", summary.span_markov.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_jsonl_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| AttributionError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let summary = Self::from_jsonl_str(&content)?
            .ok_or_else(|| AttributionError::EmptySummary(path.to_path_buf()))?;

        tracing::debug!(
            "Loaded summary from {}: {} graphs, {} failure tables",
            path.display(),
            summary.span_markov.len(),
            summary.fail_bernoulli.len()
        );
        Ok(summary)
    }

    /// Aggregate counts of a span, if it recorded any outcome
    pub fn baseline(&self, span: &str) -> Option<FailureCounts> {
        self.fail_bernoulli
            .get(span)
            .and_then(|table| table.get(TOTAL_KEY))
            .copied()
    }

    /// Unconditional failure probability of a span (0 if unobserved)
    pub fn failure_probability(&self, span: &str) -> f64 {
        self.baseline(span)
            .map(|counts| counts.failure_rate())
            .unwrap_or(0.0)
    }
}

/// All vertices of a transition graph: sources and destinations, sorted
pub fn graph_vertices(graph: &TransitionGraph) -> BTreeSet<&str> {
    graph
        .iter()
        .flat_map(|(from, edges)| {
            std::iter::once(from.as_str()).chain(edges.keys().map(String::as_str))
        })
        .collect()
}

/// Entry and outcome vertices the collector adds to every graph
pub fn is_reserved_state(name: &str) -> bool {
    matches!(name, SUCCESS_STATE | FAILURE_STATE | INITIAL_STATE)
}

/// Split a failing-subspan-set key into subspan names
///
/// The collector joins names with `", "`; bare commas are accepted as well.
/// The empty key denotes a failure in which no subspan failed.
pub fn parse_failing_set(key: &str) -> BTreeSet<&str> {
    key.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}
