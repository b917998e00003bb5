//! Coruscant - failure attribution over span transition graphs
//!
//! A tracing collector models every span as a Markov chain over its subspans
//! that ends in `__SUCCESS_STATE__` or `__FAILURE_STATE__`, alongside counts
//! of how often the span failed while a given set of subspans failed. This
//! library turns one snapshot of those models into per-subspan influence
//! scores: the posterior probability that a subspan drives its parent span's
//! failures.
//!
//! - [`steady_state`]: absorption probabilities of each subspan
//! - [`influence`]: Dirichlet-smoothed Bayesian scoring
//! - [`analysis`]: both steps over every span of a summary

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod influence;
pub mod report;
pub mod steady_state;
pub mod summary;
