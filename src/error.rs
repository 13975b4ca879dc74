//! # Errors
//!
//! $$
//! \text{run} : \text{config} \to \text{FrontierReport} \;\|\; \text{FrontierError}
//! $$
//!
//! Every failure of the pipeline is a local condition the caller can act on
//! (more data, a different seed, a larger iteration budget). Nothing is retried
//! internally.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontierError {
  #[error("empty asset universe")]
  EmptyUniverse,

  #[error("insufficient data for {ticker}: {observations} price observation(s), at least 2 required")]
  InsufficientData { ticker: String, observations: usize },

  #[error("misaligned series for {ticker}: {reason}")]
  MisalignedSeries { ticker: String, reason: String },

  #[error("non-positive or non-finite price for {ticker} on {date}")]
  NonPositivePrice { ticker: String, date: NaiveDate },

  #[error("invalid return statistics: {0}")]
  InvalidStatistics(String),

  #[error("invalid weight vector: {0}")]
  InvalidWeight(String),

  #[error("{objective} optimization did not converge after {iterations} iterations: {reason}")]
  OptimizationDidNotConverge {
    objective: &'static str,
    iterations: u64,
    reason: String,
  },

  #[error("degenerate portfolio volatility {volatility:e}")]
  DegenerateVolatility { volatility: f64 },

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error(transparent)]
  Source(#[from] anyhow::Error),
}

pub type FrontierResult<T> = Result<T, FrontierError>;
