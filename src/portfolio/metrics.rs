//! # Portfolio Metrics
//!
//! $$
//! \mu_p=\mathbf{w}^\top\mu,\qquad
//! \sigma_p=\sqrt{\max(\mathbf{w}^\top\Sigma\mathbf{w},0)},\qquad
//! S=\frac{\mu_p-r_f}{\sigma_p}
//! $$
//!
//! Expected return, volatility and Sharpe ratio of a weight vector. This is the
//! hot path of both the sampler and the optimizer.

use ndarray::Array1;
use ndarray::ArrayView1;
use serde::Deserialize;
use serde::Serialize;

use super::data::ReturnStatistics;
use super::types::PortfolioResult;
use super::types::WeightVector;
use crate::error::FrontierError;
use crate::error::FrontierResult;

/// Volatility at or below which the Sharpe ratio is replaced by [`SHARPE_SENTINEL`].
pub const VOLATILITY_EPSILON: f64 = 1e-12;
/// Sharpe ratio reported for portfolios with degenerate volatility.
pub const SHARPE_SENTINEL: f64 = 0.0;

/// What to do when an optimal portfolio has degenerate volatility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZeroVolatilityPolicy {
  /// Report [`SHARPE_SENTINEL`] as the Sharpe ratio.
  #[default]
  Sentinel,
  /// Fail with [`FrontierError::DegenerateVolatility`].
  Reject,
}

/// Raw portfolio moments for an unvalidated weight slice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Moments {
  pub expected_return: f64,
  pub variance: f64,
  pub volatility: f64,
  pub sharpe_ratio: f64,
}

/// Metrics bound to one set of return statistics and a risk-free rate.
#[derive(Clone, Debug)]
pub struct PortfolioMetrics {
  stats: ReturnStatistics,
  risk_free_rate: f64,
}

impl PortfolioMetrics {
  pub fn new(stats: ReturnStatistics, risk_free_rate: f64) -> Self {
    Self {
      stats,
      risk_free_rate,
    }
  }

  pub fn statistics(&self) -> &ReturnStatistics {
    &self.stats
  }

  pub fn risk_free_rate(&self) -> f64 {
    self.risk_free_rate
  }

  pub fn n_assets(&self) -> usize {
    self.stats.n_assets()
  }

  pub fn expected_return(&self, w: &[f64]) -> f64 {
    ArrayView1::from(w).dot(self.stats.mean())
  }

  /// `Σw`, shared by the variance and both gradients.
  pub fn covariance_times(&self, w: &[f64]) -> Array1<f64> {
    self.stats.covariance().dot(&ArrayView1::from(w))
  }

  pub fn variance(&self, w: &[f64]) -> f64 {
    ArrayView1::from(w).dot(&self.covariance_times(w))
  }

  pub fn volatility(&self, w: &[f64]) -> f64 {
    self.variance(w).max(0.0).sqrt()
  }

  /// Sharpe ratio with the sentinel policy applied.
  pub fn sharpe_ratio(&self, expected_return: f64, volatility: f64) -> f64 {
    if volatility > VOLATILITY_EPSILON {
      (expected_return - self.risk_free_rate) / volatility
    } else {
      SHARPE_SENTINEL
    }
  }

  pub fn moments(&self, w: &[f64]) -> Moments {
    let expected_return = self.expected_return(w);
    let variance = self.variance(w);
    let volatility = variance.max(0.0).sqrt();

    Moments {
      expected_return,
      variance,
      volatility,
      sharpe_ratio: self.sharpe_ratio(expected_return, volatility),
    }
  }

  pub fn evaluate(&self, weights: WeightVector) -> PortfolioResult {
    let m = self.moments(weights.as_slice());
    PortfolioResult {
      weights,
      expected_return: m.expected_return,
      volatility: m.volatility,
      sharpe_ratio: m.sharpe_ratio,
    }
  }

  /// Like [`evaluate`](Self::evaluate) but fails instead of reporting the sentinel.
  pub fn evaluate_strict(&self, weights: WeightVector) -> FrontierResult<PortfolioResult> {
    let result = self.evaluate(weights);
    if result.volatility <= VOLATILITY_EPSILON {
      return Err(FrontierError::DegenerateVolatility {
        volatility: result.volatility,
      });
    }
    Ok(result)
  }

  /// `∇(wᵀΣw) = 2Σw`
  pub fn variance_gradient(&self, w: &[f64]) -> Vec<f64> {
    self.covariance_times(w).mapv(|x| 2.0 * x).to_vec()
  }

  /// `∇(-S) = -μ/σ + (μ_p - r_f) Σw / σ³`, zero where volatility is degenerate.
  pub fn negative_sharpe_gradient(&self, w: &[f64]) -> Vec<f64> {
    let sigma_w = self.covariance_times(w);
    let variance = ArrayView1::from(w).dot(&sigma_w);
    let volatility = variance.max(0.0).sqrt();
    if volatility <= VOLATILITY_EPSILON {
      return vec![0.0; w.len()];
    }

    let excess = self.expected_return(w) - self.risk_free_rate;
    let vol_cubed = volatility * variance;
    self
      .stats
      .mean()
      .iter()
      .zip(sigma_w.iter())
      .map(|(&mu, &sw)| -mu / volatility + excess * sw / vol_cubed)
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use ndarray::array;

  use super::*;

  fn metrics(rf: f64) -> PortfolioMetrics {
    let stats = ReturnStatistics::new(
      array![0.10, 0.08, 0.12],
      array![[0.04, 0.01, 0.0], [0.01, 0.02, 0.0], [0.0, 0.0, 0.05]],
    )
    .unwrap();
    PortfolioMetrics::new(stats, rf)
  }

  #[test]
  fn moments_match_closed_form() {
    let m = metrics(0.02);
    let w = WeightVector::new(vec![0.5, 0.3, 0.2]).unwrap();
    let r = m.evaluate(w);

    let ret: f64 = 0.5 * 0.10 + 0.3 * 0.08 + 0.2 * 0.12;
    let var: f64 = 0.25 * 0.04 + 0.09 * 0.02 + 0.04 * 0.05 + 2.0 * 0.5 * 0.3 * 0.01;
    assert_relative_eq!(r.expected_return, ret, epsilon = 1e-12);
    assert_relative_eq!(r.volatility, var.sqrt(), epsilon = 1e-12);
    assert_relative_eq!(r.sharpe_ratio, (ret - 0.02) / var.sqrt(), epsilon = 1e-12);
  }

  #[test]
  fn evaluation_is_deterministic() {
    let m = metrics(0.0);
    let w = WeightVector::new(vec![0.2, 0.3, 0.5]).unwrap();
    let a = m.evaluate(w.clone());
    let b = m.evaluate(w);
    assert_eq!(a.expected_return.to_bits(), b.expected_return.to_bits());
    assert_eq!(a.volatility.to_bits(), b.volatility.to_bits());
    assert_eq!(a.sharpe_ratio.to_bits(), b.sharpe_ratio.to_bits());
  }

  #[test]
  fn single_asset_boundary() {
    let stats = ReturnStatistics::new(array![0.09], array![[0.0225]]).unwrap();
    let m = PortfolioMetrics::new(stats, 0.0);
    let r = m.evaluate(WeightVector::new(vec![1.0]).unwrap());
    assert_eq!(r.weights.as_slice(), &[1.0]);
    assert_relative_eq!(r.volatility, 0.15, epsilon = 1e-12);
    assert_relative_eq!(r.sharpe_ratio, 0.6, epsilon = 1e-12);
  }

  #[test]
  fn zero_volatility_uses_sentinel_or_fails_strictly() {
    let stats = ReturnStatistics::new(array![0.05, 0.05], array![[0.0, 0.0], [0.0, 0.0]]).unwrap();
    let m = PortfolioMetrics::new(stats, 0.01);
    let w = WeightVector::equal(2).unwrap();

    let r = m.evaluate(w.clone());
    assert_eq!(r.volatility, 0.0);
    assert_eq!(r.sharpe_ratio, SHARPE_SENTINEL);
    assert!(matches!(
      m.evaluate_strict(w),
      Err(FrontierError::DegenerateVolatility { .. })
    ));
    assert!(m.negative_sharpe_gradient(&[0.5, 0.5]).iter().all(|g| *g == 0.0));
  }

  #[test]
  fn negative_round_off_variance_is_clamped() {
    let stats =
      ReturnStatistics::new(array![0.1, 0.1], array![[1.0, -1.0], [-1.0, 1.0 + 1e-17]]).unwrap();
    let m = PortfolioMetrics::new(stats, 0.0);
    let v = m.volatility(&[0.5, 0.5]);
    assert!(v >= 0.0 && v.is_finite());
  }

  #[test]
  fn gradients_match_finite_differences() {
    let m = metrics(0.01);
    let w = [0.3, 0.4, 0.3];
    let h = 1e-6;

    let gv = m.variance_gradient(&w);
    let gs = m.negative_sharpe_gradient(&w);
    for i in 0..w.len() {
      let mut up = w;
      let mut down = w;
      up[i] += h;
      down[i] -= h;

      let fd_var = (m.variance(&up) - m.variance(&down)) / (2.0 * h);
      assert_relative_eq!(gv[i], fd_var, epsilon = 1e-6);

      let neg_sharpe = |x: &[f64]| {
        let mo = m.moments(x);
        -mo.sharpe_ratio
      };
      let fd_sharpe = (neg_sharpe(&up) - neg_sharpe(&down)) / (2.0 * h);
      assert_relative_eq!(gs[i], fd_sharpe, epsilon = 1e-5);
    }
  }
}
