//! CLI argument parsing for Coruscant

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::steady_state::SolverMethod;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for analysis results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "coruscant")]
#[command(version)]
#[command(about = "Failure attribution over span transition graphs", long_about = None)]
pub struct Cli {
    /// Dependency summary file (JSON Lines, last line is analyzed)
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Increase output detail (-v: score table, -vv: per-subspan details)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print scores, absorption probabilities and failure events of one span
    #[arg(long = "mc", value_name = "SPAN")]
    pub mc: Option<String>,

    /// Print per-span failure probability
    #[arg(long = "print-fault")]
    pub print_fault: bool,

    /// Spans to focus on with --print-fault
    #[arg(long = "spans", value_name = "SPAN", num_args = 1.., action = ArgAction::Append)]
    pub spans: Vec<String>,

    /// Dirichlet pseudo-count (default: 1.0)
    #[arg(long = "mu", value_name = "MU")]
    pub mu: Option<f64>,

    /// Prior probability that a subspan is influential (default: 0.5)
    #[arg(long = "prior", value_name = "P")]
    pub prior: Option<f64>,

    /// Absorption solver
    #[arg(long = "solver", value_enum)]
    pub solver: Option<SolverMethod>,

    /// Squarings for the matrix-power solver (default: 12)
    #[arg(long = "squarings", value_name = "N")]
    pub squarings: Option<u32>,

    /// Worker threads analyzing spans in parallel (default: 1)
    #[arg(short = 'j', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Load analysis settings from a TOML file
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Build the analysis configuration: defaults, then `--config`, then flags
    pub fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_file(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(mu) = self.mu {
            config.mu = mu;
        }
        if let Some(prior) = self.prior {
            config.prior_influential = prior;
        }
        if let Some(solver) = self.solver {
            config.solver = solver;
        }
        if let Some(squarings) = self.squarings {
            config.squarings = squarings;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }

        config.validate()?;
        Ok(config)
    }
}
