//! # efficient-frontier
//!
//! $$
//! \max_{\mathbf{w}\ge 0,\ \mathbf{1}^\top\mathbf{w}=1}\ \frac{\mathbf{w}^\top\mu-r_f}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}}
//! $$
//!
//! Mean-variance efficient portfolios from historical prices.
//!
//! | Module        | Description                                                        |
//! |---------------|--------------------------------------------------------------------|
//! | [`portfolio`] | Return statistics, metrics, Monte Carlo sampling, optimizers, report. |
//! | [`source`]    | Price history providers (in-memory fixtures, Yahoo with `yahoo`).   |
//! | [`error`]     | [`FrontierError`], the error type of every fallible operation.      |
//!
//! ## Example
//!
//! ```rust,ignore
//! use efficient_frontier::portfolio::PortfolioEngine;
//! use efficient_frontier::portfolio::PortfolioEngineConfig;
//!
//! let engine = PortfolioEngine::new(PortfolioEngineConfig {
//!   tickers: vec!["AAPL".into(), "MSFT".into(), "XOM".into()],
//!   ..PortfolioEngineConfig::default()
//! });
//! let report = engine.run(&source)?;
//! println!("{:?}", report.optimal().max_sharpe.weights);
//! ```

pub mod error;
pub mod portfolio;
pub mod source;

pub use error::FrontierError;
pub use error::FrontierResult;
