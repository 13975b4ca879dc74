//! # Portfolio Engine
//!
//! $$
//! \text{prices}\to(\mu,\Sigma)\to\big(\{\mathbf{w}_k\}_{k=1}^N,\ \mathbf{w}_{S^\*},\ \mathbf{w}_{\sigma^2_{\min}}\big)\to\text{report}
//! $$
//!
//! High-level orchestration: one configuration in, one report out.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use super::data::DateRange;
use super::data::PriceHistory;
use super::data::ReturnKind;
use super::data::ReturnStatistics;
use super::data::ReturnsEngine;
use super::data::TRADING_DAYS;
use super::metrics::PortfolioMetrics;
use super::metrics::ZeroVolatilityPolicy;
use super::metrics::VOLATILITY_EPSILON;
use super::optimizers::Optimizer;
use super::optimizers::SolverConfig;
use super::report::assemble;
use super::report::FrontierReport;
use super::sampler::MonteCarloSampler;
use super::sampler::DEFAULT_SAMPLES;
use super::types::PortfolioResult;
use crate::error::FrontierError;
use crate::error::FrontierResult;
use crate::source::PriceSource;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEngineConfig {
  /// Assets to fetch, in weight order.
  pub tickers: Vec<String>,
  /// Inclusive price history window.
  pub range: DateRange,
  /// Periods per year used to annualize mean and covariance.
  pub annualization: u32,
  /// Simple or log periodic returns.
  pub return_kind: ReturnKind,
  /// Risk-free rate used in every Sharpe computation.
  pub risk_free_rate: f64,
  /// Number of Monte Carlo portfolios.
  pub samples: usize,
  /// Solver iteration cap and stopping tolerance.
  pub solver: SolverConfig,
  /// Seed of the Monte Carlo stream.
  pub seed: u64,
  /// Points on the traced efficient frontier, `0` to skip.
  pub frontier_points: usize,
  /// Treatment of optimal portfolios with degenerate volatility.
  pub zero_volatility: ZeroVolatilityPolicy,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      tickers: Vec::new(),
      range: DateRange::new(
        NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
        NaiveDate::from_ymd_opt(2020, 12, 31).unwrap_or_default(),
      ),
      annualization: TRADING_DAYS,
      return_kind: ReturnKind::Simple,
      risk_free_rate: 0.0,
      samples: DEFAULT_SAMPLES,
      solver: SolverConfig::default(),
      seed: 42,
      frontier_points: 0,
      zero_volatility: ZeroVolatilityPolicy::Sentinel,
    }
  }
}

/// Single entry point for a mean-variance run.
#[derive(Clone, Debug)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  /// Reject configurations that cannot produce a meaningful run.
  pub fn validate(&self) -> FrontierResult<()> {
    let c = &self.config;
    if c.samples == 0 {
      return Err(FrontierError::InvalidConfig(
        "sample count must be at least 1".into(),
      ));
    }
    if c.annualization == 0 {
      return Err(FrontierError::InvalidConfig(
        "annualization factor must be positive".into(),
      ));
    }
    if c.solver.max_iters == 0 {
      return Err(FrontierError::InvalidConfig(
        "solver iteration cap must be at least 1".into(),
      ));
    }
    if !(c.solver.tolerance > 0.0 && c.solver.tolerance.is_finite()) {
      return Err(FrontierError::InvalidConfig(format!(
        "solver tolerance must be positive, got {}",
        c.solver.tolerance
      )));
    }
    if !c.risk_free_rate.is_finite() {
      return Err(FrontierError::InvalidConfig(
        "risk-free rate must be finite".into(),
      ));
    }
    if c.range.start > c.range.end {
      return Err(FrontierError::InvalidConfig(format!(
        "date range starts after it ends ({} > {})",
        c.range.start, c.range.end
      )));
    }
    Ok(())
  }

  /// Fetch the configured tickers from `source` and run the pipeline.
  pub fn run<S: PriceSource + ?Sized>(&self, source: &S) -> FrontierResult<FrontierReport> {
    self.validate()?;
    let history = source.fetch(&self.config.tickers, &self.config.range)?;
    self.run_history(&history)
  }

  /// Run the pipeline on an already fetched price history.
  pub fn run_history(&self, history: &PriceHistory) -> FrontierResult<FrontierReport> {
    self.validate()?;
    let stats = ReturnsEngine::new(self.config.annualization, self.config.return_kind)
      .statistics(history)?;
    info!(
      assets = history.n_assets(),
      observations = history.len(),
      "derived return statistics"
    );
    self.run_statistics(history.tickers().to_vec(), stats)
  }

  /// Run sampling and optimization on precomputed statistics.
  pub fn run_statistics(
    &self,
    tickers: Vec<String>,
    stats: ReturnStatistics,
  ) -> FrontierResult<FrontierReport> {
    self.validate()?;
    if tickers.len() != stats.n_assets() {
      return Err(FrontierError::InvalidConfig(format!(
        "{} tickers for statistics over {} assets",
        tickers.len(),
        stats.n_assets()
      )));
    }

    let metrics = PortfolioMetrics::new(stats, self.config.risk_free_rate);
    let sampler = MonteCarloSampler::new(self.config.samples);
    let optimizer = Optimizer::new(self.config.solver);
    let mut rng = StdRng::seed_from_u64(self.config.seed);

    let (sample, optimal) = rayon::join(
      || sampler.sample(&metrics, &mut rng),
      || optimizer.optimal_portfolios(&metrics),
    );
    let sample = sample?;
    let optimal = optimal?;
    info!(
      samples = sample.len(),
      max_sharpe = optimal.max_sharpe.sharpe_ratio,
      min_volatility = optimal.min_variance.volatility,
      "optimal portfolios found"
    );

    self.check_volatility("max-sharpe", &optimal.max_sharpe)?;
    self.check_volatility("min-variance", &optimal.min_variance)?;

    let frontier = optimizer.efficient_frontier(&metrics, self.config.frontier_points)?;
    Ok(assemble(tickers, sample, optimal, frontier))
  }

  fn check_volatility(&self, label: &str, result: &PortfolioResult) -> FrontierResult<()> {
    if result.volatility > VOLATILITY_EPSILON {
      return Ok(());
    }
    match self.config.zero_volatility {
      ZeroVolatilityPolicy::Sentinel => {
        warn!(portfolio = label, "degenerate volatility, Sharpe ratio reported as sentinel");
        Ok(())
      }
      ZeroVolatilityPolicy::Reject => Err(FrontierError::DegenerateVolatility {
        volatility: result.volatility,
      }),
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use ndarray::array;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;
  use tracing_test::traced_test;

  use super::*;
  use crate::portfolio::data::AssetPrices;
  use crate::source::InMemoryPriceSource;

  fn synthetic_source(tickers: &[&str], days: usize) -> InMemoryPriceSource {
    let mut rng = StdRng::seed_from_u64(2024);
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let series = tickers.iter().enumerate().map(|(k, ticker)| {
      let shock = Normal::new(0.002 * (k + 1) as f64, 0.01 * (1.0 + 0.5 * k as f64)).unwrap();
      let mut price = 100.0;
      let observations = (0..days)
        .map(|d| {
          if d > 0 {
            price *= 1.0 + shock.sample(&mut rng);
          }
          (start + chrono::Days::new(d as u64), price)
        })
        .collect();
      AssetPrices::new(ticker.to_string(), observations)
    });
    InMemoryPriceSource::new(series.collect::<Vec<_>>())
  }

  fn config(tickers: &[&str]) -> PortfolioEngineConfig {
    PortfolioEngineConfig {
      tickers: tickers.iter().map(|t| t.to_string()).collect(),
      range: DateRange::new(
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
      ),
      samples: 3_000,
      ..PortfolioEngineConfig::default()
    }
  }

  #[test]
  #[traced_test]
  fn end_to_end_from_price_source() {
    let tickers = ["AAA", "BBB", "CCC"];
    let source = synthetic_source(&tickers, 300);
    let engine = PortfolioEngine::new(PortfolioEngineConfig {
      frontier_points: 5,
      ..config(&tickers)
    });

    let report = engine.run(&source).unwrap();
    assert_eq!(report.tickers().len(), 3);
    assert_eq!(report.sample().len(), 3_000);
    assert_eq!(report.frontier().len(), 5);

    let opt = report.optimal();
    for p in report.sample() {
      assert!(opt.min_variance.volatility <= p.volatility + 1e-8);
      assert!(opt.max_sharpe.sharpe_ratio >= p.sharpe_ratio - 1e-8);
    }
    assert!(logs_contain("derived return statistics"));
    assert!(logs_contain("optimal portfolios found"));
  }

  /// One-factor daily returns: `r_k = β_k·m + e_k`.
  fn factor_source(tickers: &[&str], days: usize) -> InMemoryPriceSource {
    let mut rng = StdRng::seed_from_u64(77);
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let market = Normal::new(0.0006, 0.011).unwrap();
    let factor: Vec<f64> = (0..days).map(|_| market.sample(&mut rng)).collect();

    let series = tickers.iter().enumerate().map(|(k, ticker)| {
      let beta = 0.6 + 0.15 * k as f64;
      let idio = Normal::new(0.0002 * k as f64, 0.006 + 0.002 * k as f64).unwrap();
      let mut price = 50.0 + 10.0 * k as f64;
      let observations = factor
        .iter()
        .enumerate()
        .map(|(d, m)| {
          if d > 0 {
            price *= 1.0 + beta * m + idio.sample(&mut rng);
          }
          (start + chrono::Days::new(d as u64), price)
        })
        .collect();
      AssetPrices::new(ticker.to_string(), observations)
    });
    InMemoryPriceSource::new(series.collect::<Vec<_>>())
  }

  #[test]
  fn default_solver_handles_correlated_daily_history() {
    let tickers = ["AAA", "BBB", "CCC", "DDD", "EEE", "FFF"];
    let source = factor_source(&tickers, 750);
    let engine = PortfolioEngine::new(PortfolioEngineConfig {
      frontier_points: 4,
      ..config(&tickers)
    });
    assert_eq!(engine.config().solver, SolverConfig::default());

    let report = engine.run(&source).unwrap();
    let opt = report.optimal();
    for p in [&opt.max_sharpe, &opt.min_variance] {
      let sum: f64 = p.weights.iter().sum();
      assert!((sum - 1.0).abs() < 1e-6);
      assert!(p.weights.iter().all(|&w| w >= -1e-9));
    }
    for p in report.sample() {
      assert!(opt.min_variance.volatility <= p.volatility + 1e-8);
      assert!(opt.max_sharpe.sharpe_ratio >= p.sharpe_ratio - 1e-8);
    }
    assert_eq!(report.frontier().len(), 4);
  }

  #[test]
  fn fixed_seed_runs_are_byte_identical() {
    let tickers = ["AAA", "BBB"];
    let source = synthetic_source(&tickers, 120);
    let engine = PortfolioEngine::new(config(&tickers));

    let a = engine.run(&source).unwrap().to_json().unwrap();
    let b = engine.run(&source).unwrap().to_json().unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn diagonal_scenario_orders_weights() {
    let stats = ReturnStatistics::new(
      array![0.10, 0.08, 0.12],
      array![[0.04, 0.0, 0.0], [0.0, 0.02, 0.0], [0.0, 0.0, 0.05]],
    )
    .unwrap();
    let engine = PortfolioEngine::new(config(&["A1", "A2", "A3"]));
    let report = engine
      .run_statistics(vec!["A1".into(), "A2".into(), "A3".into()], stats)
      .unwrap();

    let mv = report.optimal().min_variance.weights.as_slice();
    assert!(mv[1] > mv[0] && mv[1] > mv[2]);
    let ms = report.optimal().max_sharpe.weights.as_slice();
    assert!(ms[0] > ms[2]);
    let best_draw = report.sample().max_sharpe().unwrap();
    assert!(report.optimal().max_sharpe.sharpe_ratio >= best_draw.sharpe_ratio - 1e-8);
  }

  #[test]
  fn perfectly_correlated_identical_assets() {
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    let prices = [100.0, 102.0, 101.0, 104.0, 103.5, 106.0];
    let asset = |ticker: &str| {
      AssetPrices::new(
        ticker.to_string(),
        prices
          .iter()
          .enumerate()
          .map(|(d, &p)| (start + chrono::Days::new(d as u64), p))
          .collect(),
      )
    };
    let history = PriceHistory::new(vec![asset("X"), asset("Y")]).unwrap();
    let stats = ReturnsEngine::default().statistics(&history).unwrap();
    let metrics = PortfolioMetrics::new(stats, 0.0);

    let single = metrics.volatility(&[1.0, 0.0]);
    let equal = metrics.volatility(&[0.5, 0.5]);
    assert_relative_eq!(equal, single, epsilon = 1e-12);
  }

  #[test]
  fn zero_volatility_policy() {
    let stats = ReturnStatistics::new(array![0.03, 0.03], array![[0.0, 0.0], [0.0, 0.0]]).unwrap();
    let tickers = vec!["CASH1".to_string(), "CASH2".to_string()];

    let lenient = PortfolioEngine::new(PortfolioEngineConfig {
      samples: 10,
      ..PortfolioEngineConfig::default()
    });
    let report = lenient.run_statistics(tickers.clone(), stats.clone()).unwrap();
    assert_eq!(report.optimal().max_sharpe.sharpe_ratio, 0.0);

    let strict = PortfolioEngine::new(PortfolioEngineConfig {
      samples: 10,
      zero_volatility: ZeroVolatilityPolicy::Reject,
      ..PortfolioEngineConfig::default()
    });
    assert!(matches!(
      strict.run_statistics(tickers, stats),
      Err(FrontierError::DegenerateVolatility { .. })
    ));
  }

  #[test]
  fn invalid_configuration_is_rejected() {
    let bad = [
      PortfolioEngineConfig {
        samples: 0,
        ..PortfolioEngineConfig::default()
      },
      PortfolioEngineConfig {
        annualization: 0,
        ..PortfolioEngineConfig::default()
      },
      PortfolioEngineConfig {
        solver: SolverConfig {
          max_iters: 0,
          tolerance: 1e-9,
        },
        ..PortfolioEngineConfig::default()
      },
      PortfolioEngineConfig {
        risk_free_rate: f64::NAN,
        ..PortfolioEngineConfig::default()
      },
    ];

    for config in bad {
      assert!(matches!(
        PortfolioEngine::new(config).validate(),
        Err(FrontierError::InvalidConfig(_))
      ));
    }
  }

  #[test]
  fn sparse_history_surfaces_insufficient_data() {
    let tickers = ["AAA", "BBB"];
    let source = synthetic_source(&tickers, 1);
    let err = PortfolioEngine::new(config(&tickers)).run(&source).unwrap_err();
    assert!(matches!(err, FrontierError::InsufficientData { observations: 1, .. }));
  }

  #[test]
  fn ticker_count_must_match_statistics() {
    let stats = ReturnStatistics::new(array![0.1], array![[0.04]]).unwrap();
    let engine = PortfolioEngine::new(PortfolioEngineConfig::default());
    assert!(matches!(
      engine.run_statistics(vec!["A".into(), "B".into()], stats),
      Err(FrontierError::InvalidConfig(_))
    ));
  }
}
