//! # Monte Carlo Sampler
//!
//! $$
//! u_{k,i}\sim\mathcal U(0,1],\qquad w_{k,i}=\frac{u_{k,i}}{\sum_j u_{k,j}}
//! $$
//!
//! Random long-only portfolios for an empirical picture of the frontier.
//!
//! Normalizing uniform draws is not uniform on the simplex (it concentrates mass
//! towards the centre); it is the usual approximation for frontier scatter plots.

use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;
use rayon::prelude::*;
use tracing::debug;

use super::metrics::PortfolioMetrics;
use super::types::FrontierSample;
use super::types::PortfolioResult;
use super::types::WeightVector;
use crate::error::FrontierError;
use crate::error::FrontierResult;

/// Default number of Monte Carlo draws.
pub const DEFAULT_SAMPLES: usize = 50_000;

#[derive(Clone, Copy, Debug)]
pub struct MonteCarloSampler {
  samples: usize,
}

impl Default for MonteCarloSampler {
  fn default() -> Self {
    Self {
      samples: DEFAULT_SAMPLES,
    }
  }
}

impl MonteCarloSampler {
  pub fn new(samples: usize) -> Self {
    Self { samples }
  }

  pub fn samples(&self) -> usize {
    self.samples
  }

  /// Draw `samples` random weight vectors from `rng` and evaluate each one.
  ///
  /// All randomness is consumed up front from the caller's stream, evaluation then
  /// runs in parallel, so a fixed seed always yields the same sample in the same order.
  pub fn sample<R: Rng + ?Sized>(
    &self,
    metrics: &PortfolioMetrics,
    rng: &mut R,
  ) -> FrontierResult<FrontierSample> {
    if self.samples == 0 {
      return Err(FrontierError::InvalidConfig(
        "sample count must be at least 1".into(),
      ));
    }

    let n = metrics.n_assets();
    let draws = Array2::random_using(
      (self.samples, n),
      Uniform::new_inclusive(f64::EPSILON, 1.0),
      rng,
    );

    let results = draws
      .outer_iter()
      .into_par_iter()
      .map(|row| {
        let raw = row.to_vec();
        WeightVector::normalized(&raw).map(|w| metrics.evaluate(w))
      })
      .collect::<FrontierResult<Vec<PortfolioResult>>>()?;

    debug!(samples = results.len(), assets = n, "drew frontier sample");
    Ok(FrontierSample::from_results(results))
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use ndarray::array;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  use super::*;
  use crate::portfolio::data::ReturnStatistics;

  fn metrics() -> PortfolioMetrics {
    let stats = ReturnStatistics::new(
      array![0.10, 0.08, 0.12],
      array![[0.04, 0.0, 0.0], [0.0, 0.02, 0.0], [0.0, 0.0, 0.05]],
    )
    .unwrap();
    PortfolioMetrics::new(stats, 0.0)
  }

  #[test]
  fn sampled_weights_are_valid() {
    let mut rng = StdRng::seed_from_u64(7);
    let sample = MonteCarloSampler::new(2_000)
      .sample(&metrics(), &mut rng)
      .unwrap();

    assert_eq!(sample.len(), 2_000);
    for p in &sample {
      let sum: f64 = p.weights.iter().sum();
      assert!((sum - 1.0).abs() < 1e-6);
      assert!(p.weights.iter().all(|&w| w >= -1e-9 && w <= 1.0 + 1e-9));
      assert!(p.volatility >= 0.0);
    }
  }

  #[test]
  fn fixed_seed_reproduces_sample() {
    let m = metrics();
    let a = MonteCarloSampler::new(500)
      .sample(&m, &mut StdRng::seed_from_u64(11))
      .unwrap();
    let b = MonteCarloSampler::new(500)
      .sample(&m, &mut StdRng::seed_from_u64(11))
      .unwrap();
    let c = MonteCarloSampler::new(500)
      .sample(&m, &mut StdRng::seed_from_u64(12))
      .unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
  }

  #[test]
  fn single_asset_draws_are_fully_invested() {
    let stats = ReturnStatistics::new(array![0.07], array![[0.04]]).unwrap();
    let m = PortfolioMetrics::new(stats, 0.0);
    let sample = MonteCarloSampler::new(10)
      .sample(&m, &mut StdRng::seed_from_u64(1))
      .unwrap();

    for p in &sample {
      assert_eq!(p.weights.as_slice(), &[1.0]);
      assert_relative_eq!(p.volatility, 0.2, epsilon = 1e-12);
      assert_relative_eq!(p.sharpe_ratio, 0.35, epsilon = 1e-12);
    }
  }

  #[test]
  fn zero_samples_is_rejected() {
    let res = MonteCarloSampler::new(0).sample(&metrics(), &mut StdRng::seed_from_u64(1));
    assert!(matches!(res, Err(FrontierError::InvalidConfig(_))));
  }
}
