//! # Frontier Report
//!
//! $$
//! \text{report} = (\text{tickers}, \{\mathbf{w}_k\}_{k=1}^N, \mathbf{w}_{S^\*}, \mathbf{w}_{\sigma^2_{\min}}, \text{frontier})
//! $$
//!
//! Packaging of a run for presentation collaborators (plots, tables). No
//! computation happens here.

use serde::Deserialize;
use serde::Serialize;

use super::types::FrontierSample;
use super::types::OptimalPortfolios;
use super::types::PortfolioResult;
use crate::error::FrontierResult;

/// Immutable output of one pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrontierReport {
  tickers: Vec<String>,
  sample: FrontierSample,
  optimal: OptimalPortfolios,
  frontier: Vec<PortfolioResult>,
}

/// Combine the products of a run into a [`FrontierReport`].
pub fn assemble(
  tickers: Vec<String>,
  sample: FrontierSample,
  optimal: OptimalPortfolios,
  frontier: Vec<PortfolioResult>,
) -> FrontierReport {
  FrontierReport {
    tickers,
    sample,
    optimal,
    frontier,
  }
}

impl FrontierReport {
  /// Asset identifiers, in weight order.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Monte Carlo portfolios for scatter rendering.
  pub fn sample(&self) -> &FrontierSample {
    &self.sample
  }

  /// Optimized portfolios for annotation.
  pub fn optimal(&self) -> &OptimalPortfolios {
    &self.optimal
  }

  /// Traced efficient frontier, empty unless requested.
  pub fn frontier(&self) -> &[PortfolioResult] {
    &self.frontier
  }

  pub fn to_json(&self) -> FrontierResult<String> {
    Ok(serde_json::to_string(self)?)
  }

  pub fn to_json_pretty(&self) -> FrontierResult<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }
}
