//! # Portfolio Optimizers
//!
//! $$
//! \min_{\mathbf{w}\in\Delta^{n-1}} f(\mathbf{w}),\qquad
//! \mathbf{w}_{k+1}=\mathbf{w}_k+\lambda_k\left(P_\Delta\!\left(\mathbf{w}_k-\alpha_k\nabla f(\mathbf{w}_k)\right)-\mathbf{w}_k\right)
//! $$
//!
//! Long-only mean-variance optimizers. Every objective is minimized by the same
//! projected-gradient solver over the same constraint set, so the max-Sharpe,
//! min-variance and frontier solves cannot drift apart in how they treat
//! `sum(w) = 1` and `0 <= w_i <= 1`.

use std::collections::VecDeque;

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::Gradient;
use argmin::core::IterState;
use argmin::core::Problem;
use argmin::core::Solver;
use argmin::core::State;
use argmin::core::TerminationReason;
use argmin::core::TerminationStatus;
use argmin::core::KV;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::trace;

use super::metrics::PortfolioMetrics;
use super::types::OptimalPortfolios;
use super::types::PortfolioResult;
use super::types::WeightVector;
use crate::error::FrontierError;
use crate::error::FrontierResult;

type PgState = IterState<Vec<f64>, Vec<f64>, (), (), (), f64>;

const ARMIJO: f64 = 1e-4;
/// Number of past costs the non-monotone line search compares against.
const COST_MEMORY: usize = 10;
const MIN_SPECTRAL_STEP: f64 = 1e-10;
const MAX_SPECTRAL_STEP: f64 = 1e10;
/// Predicted decreases below this fraction of the cost scale are lost in rounding.
const COST_RESOLUTION: f64 = 64.0 * f64::EPSILON;
/// Moves shorter than this leave a weight vector unchanged.
const MOVE_RESOLUTION: f64 = 4.0 * f64::EPSILON;

/// Feasible region of a constrained minimization.
pub trait ConstraintSet {
  /// Replace `x` by its Euclidean projection onto the set.
  fn project(&self, x: &mut [f64]);
}

/// Fully invested long-only portfolios: `sum(w) = 1`, `0 <= w_i <= 1`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LongOnly;

impl ConstraintSet for LongOnly {
  fn project(&self, x: &mut [f64]) {
    match x.len() {
      0 => {}
      1 => x[0] = 1.0,
      _ => {
        let mut u = x.to_vec();
        u.sort_by(|a, b| b.total_cmp(a));

        let mut cumsum = 0.0;
        let mut theta = 0.0;
        for (j, &uj) in u.iter().enumerate() {
          cumsum += uj;
          let t = (cumsum - 1.0) / (j + 1) as f64;
          if uj > t {
            theta = t;
          }
        }

        for xi in x.iter_mut() {
          *xi = (*xi - theta).max(0.0);
        }
      }
    }
  }
}

/// Iteration budget and stopping rule of [`constrained_minimize`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
  /// Iterations after which the run is reported as not converged.
  pub max_iters: u64,
  /// Bound on `‖w − P(w − ∇f(w))‖∞` that counts as a stationary point.
  pub tolerance: f64,
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      max_iters: 1000,
      tolerance: 1e-9,
    }
  }
}

/// Spectral projected gradient (Barzilai-Borwein step, non-monotone Armijo
/// search along the projected direction).
///
/// A point is accepted as stationary when `‖w − P(w − ∇f)‖∞ <= tolerance`, or
/// when the decrease `∇fᵀ(w − P(w − ∇f))` promised by a full projected step is
/// below the rounding resolution of `f`. The second test bounds the first by
/// `sqrt(64·ε·|f|)` and keeps the stopping rule reachable in `f64`.
#[derive(Clone, Debug)]
pub struct ProjectedGradient<C> {
  constraints: C,
  tolerance: f64,
  spectral_step: f64,
  recent_costs: VecDeque<f64>,
  stationarity: f64,
  predicted_decrease: f64,
  cost_scale: f64,
}

impl<C: ConstraintSet> ProjectedGradient<C> {
  pub fn new(constraints: C, tolerance: f64) -> Self {
    Self {
      constraints,
      tolerance,
      spectral_step: 1.0,
      recent_costs: VecDeque::with_capacity(COST_MEMORY),
      stationarity: f64::INFINITY,
      predicted_decrease: f64::INFINITY,
      cost_scale: f64::MIN_POSITIVE,
    }
  }

  /// Measure how far `w` is from stationarity.
  fn measure(&mut self, w: &[f64], grad: &[f64], cost: f64) {
    let mut probe: Vec<f64> = w.iter().zip(grad).map(|(x, g)| x - g).collect();
    self.constraints.project(&mut probe);

    self.stationarity = w
      .iter()
      .zip(&probe)
      .fold(0.0_f64, |acc, (x, p)| acc.max((x - p).abs()));
    self.predicted_decrease = grad
      .iter()
      .zip(w.iter().zip(&probe))
      .map(|(g, (x, p))| g * (x - p))
      .sum();

    let linear_term: f64 = grad.iter().zip(w).map(|(g, x)| g * x).sum();
    self.cost_scale = cost.abs().max(linear_term.abs()).max(f64::MIN_POSITIVE);
  }

  fn remember(&mut self, cost: f64) {
    if self.recent_costs.len() == COST_MEMORY {
      self.recent_costs.pop_front();
    }
    self.recent_costs.push_back(cost);
  }

  fn converged(&self) -> bool {
    self.stationarity <= self.tolerance
      || self.predicted_decrease <= COST_RESOLUTION * self.cost_scale
  }
}

impl<O, C> Solver<O, PgState> for ProjectedGradient<C>
where
  O: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
  C: ConstraintSet,
{
  const NAME: &'static str = "Spectral projected gradient";

  fn init(
    &mut self,
    problem: &mut Problem<O>,
    mut state: PgState,
  ) -> Result<(PgState, Option<KV>), argmin::core::Error> {
    let mut param = state
      .take_param()
      .ok_or_else(|| anyhow::anyhow!("projected gradient needs an initial point"))?;
    self.constraints.project(&mut param);

    let cost = problem.cost(&param)?;
    let grad = problem.gradient(&param)?;
    self.measure(&param, &grad, cost);
    self.remember(cost);
    if self.stationarity > 0.0 {
      self.spectral_step = (1.0 / self.stationarity).clamp(MIN_SPECTRAL_STEP, MAX_SPECTRAL_STEP);
    }

    Ok((state.param(param).cost(cost).gradient(grad), None))
  }

  fn next_iter(
    &mut self,
    problem: &mut Problem<O>,
    mut state: PgState,
  ) -> Result<(PgState, Option<KV>), argmin::core::Error> {
    let param = state
      .take_param()
      .ok_or_else(|| anyhow::anyhow!("missing current point"))?;
    let grad = state
      .take_gradient()
      .ok_or_else(|| anyhow::anyhow!("missing current gradient"))?;
    let cost = state.get_cost();

    let mut direction: Vec<f64> = param
      .iter()
      .zip(&grad)
      .map(|(x, g)| x - self.spectral_step * g)
      .collect();
    self.constraints.project(&mut direction);
    for (d, x) in direction.iter_mut().zip(&param) {
      *d -= x;
    }

    let slope: f64 = grad.iter().zip(&direction).map(|(g, d)| g * d).sum();
    let length = direction.iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
    let reference = self
      .recent_costs
      .iter()
      .copied()
      .fold(cost, f64::max);

    let mut fraction = 1.0_f64;
    let (next, next_cost) = loop {
      if !(slope < 0.0) || fraction * length <= MOVE_RESOLUTION {
        let reason = format!(
          "line search stalled at cost {cost:e} (stationarity {:e})",
          self.stationarity
        );
        let state = state
          .param(param)
          .gradient(grad)
          .terminate_with(TerminationReason::SolverExit(reason));
        return Ok((state, None));
      }

      let candidate: Vec<f64> = param
        .iter()
        .zip(&direction)
        .map(|(x, d)| x + fraction * d)
        .collect();
      let candidate_cost = problem.cost(&candidate)?;
      if candidate_cost <= reference + ARMIJO * fraction * slope {
        break (candidate, candidate_cost);
      }
      fraction *= 0.5;
    };

    let next_grad = problem.gradient(&next)?;
    let (ss, sy) = next
      .iter()
      .zip(&param)
      .zip(next_grad.iter().zip(&grad))
      .fold((0.0_f64, 0.0_f64), |(ss, sy), ((xn, x), (gn, g))| {
        let s = xn - x;
        (ss + s * s, sy + s * (gn - g))
      });
    self.spectral_step = if sy > 0.0 {
      (ss / sy).clamp(MIN_SPECTRAL_STEP, MAX_SPECTRAL_STEP)
    } else {
      MAX_SPECTRAL_STEP
    };

    self.measure(&next, &next_grad, next_cost);
    self.remember(next_cost);
    trace!(
      iter = state.get_iter(),
      cost = next_cost,
      fraction,
      stationarity = self.stationarity,
      "projected gradient step"
    );

    Ok((state.param(next).cost(next_cost).gradient(next_grad), None))
  }

  fn terminate(&mut self, _state: &PgState) -> TerminationStatus {
    if self.converged() {
      TerminationStatus::Terminated(TerminationReason::SolverConverged)
    } else {
      TerminationStatus::NotTerminated
    }
  }
}

/// Minimizer found by [`constrained_minimize`].
#[derive(Clone, Debug, PartialEq)]
pub struct Minimum {
  pub param: Vec<f64>,
  pub cost: f64,
  pub iterations: u64,
}

/// Minimize `objective` over `constraints` starting at `x0`.
///
/// Anything other than a converged run is an
/// [`OptimizationDidNotConverge`](FrontierError::OptimizationDidNotConverge) error
/// labelled with `label`.
pub fn constrained_minimize<O, C>(
  label: &'static str,
  objective: O,
  constraints: C,
  x0: Vec<f64>,
  config: &SolverConfig,
) -> FrontierResult<Minimum>
where
  O: CostFunction<Param = Vec<f64>, Output = f64> + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
  C: ConstraintSet,
{
  let solver = ProjectedGradient::new(constraints, config.tolerance);
  let res = Executor::new(objective, solver)
    .configure(|state| state.param(x0).max_iters(config.max_iters))
    .run()
    .map_err(|e| FrontierError::OptimizationDidNotConverge {
      objective: label,
      iterations: 0,
      reason: e.to_string(),
    })?;

  let state = &res.state;
  let iterations = state.get_iter();
  match state.get_termination_status() {
    TerminationStatus::Terminated(TerminationReason::SolverConverged) => {}
    TerminationStatus::Terminated(TerminationReason::SolverExit(reason)) => {
      return Err(FrontierError::OptimizationDidNotConverge {
        objective: label,
        iterations,
        reason: reason.clone(),
      });
    }
    status => {
      return Err(FrontierError::OptimizationDidNotConverge {
        objective: label,
        iterations,
        reason: format!("{status:?}"),
      });
    }
  }

  // The last iterate is the certified stationary point; with a non-monotone
  // search it need not be the lowest cost seen.
  let param = state
    .get_param()
    .or_else(|| state.get_best_param())
    .cloned()
    .ok_or_else(|| FrontierError::OptimizationDidNotConverge {
      objective: label,
      iterations,
      reason: "solver returned no parameters".into(),
    })?;

  debug!(
    objective = label,
    iterations,
    cost = state.get_cost(),
    "solver converged"
  );
  Ok(Minimum {
    param,
    cost: state.get_cost(),
    iterations,
  })
}

/// Objectives over portfolio weights, all evaluated through [`PortfolioMetrics`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Objective {
  /// `-S(w)`
  MaxSharpe,
  /// `wᵀΣw`
  MinVariance,
  /// `wᵀΣw − λ·wᵀμ`
  MeanVariance { return_weight: f64 },
}

impl Objective {
  pub fn label(&self) -> &'static str {
    match self {
      Self::MaxSharpe => "max-sharpe",
      Self::MinVariance => "min-variance",
      Self::MeanVariance { .. } => "mean-variance",
    }
  }
}

/// An [`Objective`] bound to the metrics it is evaluated with.
pub struct PortfolioObjective<'a> {
  metrics: &'a PortfolioMetrics,
  objective: Objective,
}

impl<'a> PortfolioObjective<'a> {
  pub fn new(metrics: &'a PortfolioMetrics, objective: Objective) -> Self {
    Self { metrics, objective }
  }
}

impl CostFunction for PortfolioObjective<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    Ok(match self.objective {
      Objective::MaxSharpe => -self.metrics.moments(w).sharpe_ratio,
      Objective::MinVariance => self.metrics.variance(w),
      Objective::MeanVariance { return_weight } => {
        self.metrics.variance(w) - return_weight * self.metrics.expected_return(w)
      }
    })
  }
}

impl Gradient for PortfolioObjective<'_> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, w: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    Ok(match self.objective {
      Objective::MaxSharpe => self.metrics.negative_sharpe_gradient(w),
      Objective::MinVariance => self.metrics.variance_gradient(w),
      Objective::MeanVariance { return_weight } => self
        .metrics
        .variance_gradient(w)
        .into_iter()
        .zip(self.metrics.statistics().mean().iter())
        .map(|(g, mu)| g - return_weight * mu)
        .collect(),
    })
  }
}

/// Long-only optimizer seeded with the equal-weight portfolio.
#[derive(Clone, Copy, Debug, Default)]
pub struct Optimizer {
  config: SolverConfig,
}

impl Optimizer {
  pub fn new(config: SolverConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SolverConfig {
    &self.config
  }

  /// Minimize `objective` from equal weights and evaluate the optimum.
  pub fn solve(&self, metrics: &PortfolioMetrics, objective: Objective) -> FrontierResult<PortfolioResult> {
    let n = metrics.n_assets();
    if n == 0 {
      return Err(FrontierError::EmptyUniverse);
    }

    let x0 = vec![1.0 / n as f64; n];
    let minimum = constrained_minimize(
      objective.label(),
      PortfolioObjective::new(metrics, objective),
      LongOnly,
      x0,
      &self.config,
    )?;

    let weights = WeightVector::new(minimum.param)?;
    Ok(metrics.evaluate(weights))
  }

  /// Tangency portfolio.
  pub fn max_sharpe(&self, metrics: &PortfolioMetrics) -> FrontierResult<PortfolioResult> {
    self.solve(metrics, Objective::MaxSharpe)
  }

  /// Global minimum-variance portfolio.
  pub fn min_variance(&self, metrics: &PortfolioMetrics) -> FrontierResult<PortfolioResult> {
    self.solve(metrics, Objective::MinVariance)
  }

  /// Both optima, solved concurrently.
  pub fn optimal_portfolios(&self, metrics: &PortfolioMetrics) -> FrontierResult<OptimalPortfolios> {
    let (max_sharpe, min_variance) =
      rayon::join(|| self.max_sharpe(metrics), || self.min_variance(metrics));

    Ok(OptimalPortfolios {
      max_sharpe: max_sharpe?,
      min_variance: min_variance?,
    })
  }

  /// `points` portfolios on the long-only efficient frontier, from the
  /// minimum-variance portfolio up to the highest-return asset.
  ///
  /// Traced by sweeping the return weight `λ` of `wᵀΣw − λ·wᵀμ` from `0` to the
  /// smallest value at which holding only the highest-return asset is optimal.
  pub fn efficient_frontier(
    &self,
    metrics: &PortfolioMetrics,
    points: usize,
  ) -> FrontierResult<Vec<PortfolioResult>> {
    if points == 0 {
      return Ok(Vec::new());
    }

    let lambda_max = corner_return_weight(metrics);
    (0..points)
      .map(|k| {
        let return_weight = if points == 1 {
          0.0
        } else {
          lambda_max * k as f64 / (points - 1) as f64
        };
        self.solve(metrics, Objective::MeanVariance { return_weight })
      })
      .collect()
  }
}

/// Smallest `λ` for which the single highest-return asset minimizes `wᵀΣw − λ·wᵀμ`.
fn corner_return_weight(metrics: &PortfolioMetrics) -> f64 {
  let mu = metrics.statistics().mean();
  let cov = metrics.statistics().covariance();
  let Some(top) = (0..mu.len()).max_by(|&a, &b| mu[a].total_cmp(&mu[b])) else {
    return 0.0;
  };

  (0..mu.len())
    .filter(|&i| mu[i] < mu[top])
    .map(|i| 2.0 * (cov[[top, top]] - cov[[i, top]]) / (mu[top] - mu[i]))
    .fold(0.0, f64::max)
}
