//! # Portfolio Types
//!
//! $$
//! \mathbf{w}\in\Delta^{n-1}=\{\mathbf{w}\ge 0,\ \mathbf{1}^\top\mathbf{w}=1\}
//! $$
//!
//! Weight vectors, per-portfolio results and the collections produced by a run.

use ordered_float::OrderedFloat;
use serde::Deserialize;
use serde::Serialize;

use crate::error::FrontierError;
use crate::error::FrontierResult;

/// Allowed deviation of `sum(w)` from one.
pub const SUM_TOLERANCE: f64 = 1e-6;
/// Allowed excursion of a single weight outside `[0, 1]`.
pub const BOUND_TOLERANCE: f64 = 1e-9;

/// Long-only portfolio weights summing to one.
///
/// Deserialization goes through [`WeightVector::new`], so a parsed vector is as
/// valid as a constructed one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct WeightVector(Vec<f64>);

impl WeightVector {
  /// Validate raw weights against the long-only simplex.
  pub fn new(weights: Vec<f64>) -> FrontierResult<Self> {
    if weights.is_empty() {
      return Err(FrontierError::InvalidWeight("no weights".into()));
    }

    if let Some(i) = weights.iter().position(|w| !w.is_finite()) {
      return Err(FrontierError::InvalidWeight(format!(
        "weight {i} is not finite ({})",
        weights[i]
      )));
    }

    if let Some(i) = weights
      .iter()
      .position(|&w| !(-BOUND_TOLERANCE..=1.0 + BOUND_TOLERANCE).contains(&w))
    {
      return Err(FrontierError::InvalidWeight(format!(
        "weight {i} = {} outside [0, 1]",
        weights[i]
      )));
    }

    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() >= SUM_TOLERANCE {
      return Err(FrontierError::InvalidWeight(format!(
        "weights sum to {sum}, expected 1"
      )));
    }

    Ok(Self(weights))
  }

  /// Equal allocation `1/n` across `n` assets.
  pub fn equal(n: usize) -> FrontierResult<Self> {
    if n == 0 {
      return Err(FrontierError::EmptyUniverse);
    }
    Self::new(vec![1.0 / n as f64; n])
  }

  /// Scale non-negative raw draws so that they sum to one.
  pub fn normalized(raw: &[f64]) -> FrontierResult<Self> {
    let total: f64 = raw.iter().sum();
    if !(total > 0.0 && total.is_finite()) {
      return Err(FrontierError::InvalidWeight(format!(
        "cannot normalize draws summing to {total}"
      )));
    }
    Self::new(raw.iter().map(|&x| x / total).collect())
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn as_slice(&self) -> &[f64] {
    &self.0
  }

  pub fn iter(&self) -> std::slice::Iter<'_, f64> {
    self.0.iter()
  }

  pub fn into_inner(self) -> Vec<f64> {
    self.0
  }
}

impl TryFrom<Vec<f64>> for WeightVector {
  type Error = FrontierError;

  fn try_from(weights: Vec<f64>) -> FrontierResult<Self> {
    Self::new(weights)
  }
}

impl From<WeightVector> for Vec<f64> {
  fn from(weights: WeightVector) -> Self {
    weights.0
  }
}

impl AsRef<[f64]> for WeightVector {
  fn as_ref(&self) -> &[f64] {
    &self.0
  }
}

/// Metrics of a single portfolio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioResult {
  /// Portfolio weights.
  pub weights: WeightVector,
  /// Expected portfolio return (annualized if the statistics are annualized).
  pub expected_return: f64,
  /// Portfolio volatility, never negative.
  pub volatility: f64,
  /// `(expected_return - risk_free) / volatility`, `0.0` when volatility is degenerate.
  pub sharpe_ratio: f64,
}

/// Monte Carlo draws in draw order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrontierSample(Vec<PortfolioResult>);

impl FrontierSample {
  pub(crate) fn from_results(results: Vec<PortfolioResult>) -> Self {
    Self(results)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, PortfolioResult> {
    self.0.iter()
  }

  pub fn as_slice(&self) -> &[PortfolioResult] {
    &self.0
  }

  /// Draw with the highest Sharpe ratio.
  pub fn max_sharpe(&self) -> Option<&PortfolioResult> {
    self.0.iter().max_by_key(|p| OrderedFloat(p.sharpe_ratio))
  }

  /// Draw with the lowest volatility.
  pub fn min_volatility(&self) -> Option<&PortfolioResult> {
    self.0.iter().min_by_key(|p| OrderedFloat(p.volatility))
  }
}

impl<'a> IntoIterator for &'a FrontierSample {
  type Item = &'a PortfolioResult;
  type IntoIter = std::slice::Iter<'a, PortfolioResult>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.iter()
  }
}

/// The two optimized portfolios of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimalPortfolios {
  /// Tangency portfolio.
  pub max_sharpe: PortfolioResult,
  /// Global minimum-variance portfolio.
  pub min_variance: PortfolioResult,
}
