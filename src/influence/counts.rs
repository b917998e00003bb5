// Conditional failure counts per subspan
//
// The failure table records, for each set of subspans observed failing
// together, how many parent runs ended in failure and how many ran at all.
// A subspan's conditional counts aggregate every row whose set contains it.
//
// Rows that cannot come from a well-behaved collector (a subspan name missing
// from the span's graph, or more failures than observations) are dropped as a
// whole and reported, instead of being partially counted.

use crate::summary::{parse_failing_set, FailureCounts, FailureTable, TOTAL_KEY};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Success/failure counts observed while a subspan was failing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConditionalCounts {
    pub failures: u64,
    pub successes: u64,
}

impl ConditionalCounts {
    pub fn new(failures: u64, successes: u64) -> Self {
        Self {
            failures,
            successes,
        }
    }

    pub fn total(&self) -> u64 {
        self.failures.saturating_add(self.successes)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Why a failure table row was excluded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyIssue {
    /// The key names a subspan that never appears in the transition graph
    UnknownSubspan { subspan: String },
    /// The row claims more failures than observations
    CountsExceedTotal { failures: u64, total: u64 },
}

/// Data-integrity warning for one failure table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyWarning {
    pub key: String,
    pub issue: KeyIssue,
}

impl fmt::Display for KeyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.issue {
            KeyIssue::UnknownSubspan { subspan } => write!(
                f,
                "key {:?} names subspan {:?} absent from the transition graph",
                self.key, subspan
            ),
            KeyIssue::CountsExceedTotal { failures, total } => write!(
                f,
                "key {:?} records {} failures out of {} observations",
                self.key, failures, total
            ),
        }
    }
}

/// Validated failure table of one span
#[derive(Debug, Clone)]
pub struct FailureIndex<'a> {
    baseline: FailureCounts,
    rows: Vec<(BTreeSet<&'a str>, FailureCounts)>,
    warnings: Vec<KeyWarning>,
}

impl<'a> FailureIndex<'a> {
    /// Index a span's table against its graph vertices
    ///
    /// Returns `None` when the table has no `__TOTAL__` row: the span has not
    /// recorded any outcome yet.
    pub fn build(
        span: &str,
        table: &'a FailureTable,
        vertices: &BTreeSet<&str>,
    ) -> Option<Self> {
        let mut baseline = *table.get(TOTAL_KEY)?;
        let mut warnings = Vec::new();

        if !baseline.is_consistent() {
            tracing::warn!(
                "Span {}: {} reports {} failures out of {} observations, capping failures",
                span,
                TOTAL_KEY,
                baseline.failures,
                baseline.total
            );
            warnings.push(KeyWarning {
                key: TOTAL_KEY.to_string(),
                issue: KeyIssue::CountsExceedTotal {
                    failures: baseline.failures,
                    total: baseline.total,
                },
            });
            baseline.failures = baseline.total;
        }

        let mut rows = Vec::new();
        for (key, &counts) in table {
            if key == TOTAL_KEY {
                continue;
            }

            let subspans = parse_failing_set(key);
            let unknown = subspans.iter().find(|name| !vertices.contains(**name));
            let issue = if let Some(unknown) = unknown {
                Some(KeyIssue::UnknownSubspan {
                    subspan: unknown.to_string(),
                })
            } else if !counts.is_consistent() {
                Some(KeyIssue::CountsExceedTotal {
                    failures: counts.failures,
                    total: counts.total,
                })
            } else {
                None
            };

            match issue {
                Some(issue) => {
                    let warning = KeyWarning {
                        key: key.clone(),
                        issue,
                    };
                    tracing::warn!("Span {}: excluding failure row, {}", span, warning);
                    warnings.push(warning);
                }
                None => rows.push((subspans, counts)),
            }
        }

        Some(Self {
            baseline,
            rows,
            warnings,
        })
    }

    /// Aggregate `(failures, total)` of the span across all observations
    pub fn baseline(&self) -> FailureCounts {
        self.baseline
    }

    /// Counts accumulated over every row whose failing set contains `subspan`
    pub fn conditional_counts(&self, subspan: &str) -> ConditionalCounts {
        self.rows
            .iter()
            .filter(|(subspans, _)| subspans.contains(subspan))
            .fold(ConditionalCounts::default(), |acc, (_, counts)| {
                ConditionalCounts::new(
                    acc.failures.saturating_add(counts.failures),
                    acc.successes.saturating_add(counts.successes()),
                )
            })
    }

    pub fn warnings(&self) -> &[KeyWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<KeyWarning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, u64, u64)]) -> FailureTable {
        rows.iter()
            .map(|&(key, failures, total)| {
                (key.to_string(), FailureCounts::new(failures, total))
            })
            .collect()
    }

    fn vertices<'a>(names: &[&'a str]) -> BTreeSet<&'a str> {
        names.iter().copied().collect()
    }

    #[test]
    fn test_missing_total_skips_span() {
        let t = table(&[("db", 1, 2)]);
        assert!(FailureIndex::build("s", &t, &vertices(&["db"])).is_none());
    }

    #[test]
    fn test_counts_aggregate_over_combinations() {
        let t = table(&[
            (TOTAL_KEY, 12, 40),
            ("db", 5, 6),
            ("cache, db", 4, 4),
            ("cache", 1, 10),
            ("", 2, 20),
        ]);
        let index = FailureIndex::build("s", &t, &vertices(&["cache", "db"])).unwrap();

        assert_eq!(index.conditional_counts("db"), ConditionalCounts::new(9, 1));
        assert_eq!(index.conditional_counts("cache"), ConditionalCounts::new(5, 9));
        assert_eq!(index.baseline(), FailureCounts::new(12, 40));
        assert!(index.warnings().is_empty());
    }

    #[test]
    fn test_huge_counts_saturate() {
        let t = table(&[
            (TOTAL_KEY, u64::MAX, u64::MAX),
            ("db", u64::MAX, u64::MAX),
            ("cache, db", u64::MAX - 1, u64::MAX),
        ]);
        let index = FailureIndex::build("s", &t, &vertices(&["cache", "db"])).unwrap();

        let db = index.conditional_counts("db");
        assert_eq!(db.failures, u64::MAX);
        assert_eq!(db.successes, 1);
        assert_eq!(db.total(), u64::MAX);
    }

    #[test]
    fn test_subspan_never_failing_has_empty_counts() {
        let t = table(&[(TOTAL_KEY, 1, 10), ("db", 1, 1)]);
        let index = FailureIndex::build("s", &t, &vertices(&["db", "auth"])).unwrap();
        assert!(index.conditional_counts("auth").is_empty());
    }

    #[test]
    fn test_unknown_subspan_excludes_whole_row() {
        let t = table(&[(TOTAL_KEY, 5, 10), ("db, ghost", 3, 3), ("db", 1, 2)]);
        let index = FailureIndex::build("s", &t, &vertices(&["db"])).unwrap();

        assert_eq!(index.conditional_counts("db"), ConditionalCounts::new(1, 1));
        assert_eq!(
            index.warnings(),
            &[KeyWarning {
                key: "db, ghost".to_string(),
                issue: KeyIssue::UnknownSubspan {
                    subspan: "ghost".to_string()
                },
            }]
        );
    }

    #[test]
    fn test_inconsistent_row_excluded() {
        let t = table(&[(TOTAL_KEY, 5, 10), ("db", 4, 2)]);
        let index = FailureIndex::build("s", &t, &vertices(&["db"])).unwrap();

        assert!(index.conditional_counts("db").is_empty());
        assert_eq!(index.warnings().len(), 1);
    }

    #[test]
    fn test_inconsistent_total_is_capped() {
        let t = table(&[(TOTAL_KEY, 7, 5)]);
        let index = FailureIndex::build("s", &t, &vertices(&[])).unwrap();

        assert_eq!(index.baseline(), FailureCounts::new(5, 5));
        assert_eq!(index.warnings().len(), 1);
    }

    #[test]
    fn test_warning_display() {
        let warning = KeyWarning {
            key: "a, b".to_string(),
            issue: KeyIssue::UnknownSubspan {
                subspan: "b".to_string(),
            },
        };
        assert!(warning.to_string().contains("absent from the transition graph"));
    }
}
