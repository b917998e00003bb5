//! Error types for summary loading and attribution analysis

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a summary or running the analysis
#[derive(Error, Debug)]
pub enum AttributionError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed dependency summary at line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Dependency summary {0} contains no snapshot")]
    EmptySummary(PathBuf),

    #[error("Invalid transition probability {value} on edge {from} -> {to} in span {span}")]
    InvalidProbability {
        span: String,
        from: String,
        to: String,
        value: f64,
    },

    #[error("Outgoing probabilities of {vertex} in span {span} sum to {mass}, above 1")]
    RowMassExceedsOne {
        span: String,
        vertex: String,
        mass: f64,
    },

    #[error("Absorption system for span {span} is singular at vertex {vertex}")]
    SingularSystem { span: String, vertex: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Span not found in summary: {0}")]
    UnknownSpan(String),
}

/// Result type for attribution operations
pub type Result<T> = std::result::Result<T, AttributionError>;
