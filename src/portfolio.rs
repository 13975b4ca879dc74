//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Markowitz mean-variance analysis: return statistics, Monte Carlo frontier
//! sampling and long-only optimization.

pub mod data;
pub mod engine;
pub mod metrics;
pub mod optimizers;
pub mod report;
pub mod sampler;
pub mod types;

pub use data::AssetPrices;
pub use data::DateRange;
pub use data::PriceHistory;
pub use data::ReturnKind;
pub use data::ReturnSeries;
pub use data::ReturnStatistics;
pub use data::ReturnsEngine;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use metrics::Moments;
pub use metrics::PortfolioMetrics;
pub use metrics::ZeroVolatilityPolicy;
pub use optimizers::constrained_minimize;
pub use optimizers::ConstraintSet;
pub use optimizers::LongOnly;
pub use optimizers::Objective;
pub use optimizers::Optimizer;
pub use optimizers::SolverConfig;
pub use report::assemble;
pub use report::FrontierReport;
pub use sampler::MonteCarloSampler;
pub use types::FrontierSample;
pub use types::OptimalPortfolios;
pub use types::PortfolioResult;
pub use types::WeightVector;
