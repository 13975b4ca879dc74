//! # Portfolio Data
//!
//! $$
//! r_{t}=\frac{p_t}{p_{t-1}}-1,\qquad
//! \mu = k\,\bar r,\qquad \Sigma = k\,\widehat{\operatorname{Cov}}(r)
//! $$
//!
//! Price histories, return series and annualized return statistics.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use impl_new_derive::ImplNew;
use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::error::FrontierError;
use crate::error::FrontierResult;

/// Default number of trading periods per year for daily data.
pub const TRADING_DAYS: u32 = 252;

const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// Inclusive calendar range.
#[derive(ImplNew, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

impl DateRange {
  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }
}

/// Raw price observations of one asset as delivered by a price source.
#[derive(ImplNew, Clone, Debug, PartialEq)]
pub struct AssetPrices {
  pub ticker: String,
  pub observations: Vec<(NaiveDate, f64)>,
}

/// Aligned price matrix, one row per date and one column per asset.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceHistory {
  tickers: Vec<String>,
  dates: Vec<NaiveDate>,
  prices: Array2<f64>,
}

impl PriceHistory {
  /// Build from series that already share one date index.
  pub fn new(assets: Vec<AssetPrices>) -> FrontierResult<Self> {
    let first = assets.first().ok_or(FrontierError::EmptyUniverse)?;

    for asset in &assets {
      if asset.observations.len() < 2 {
        return Err(FrontierError::InsufficientData {
          ticker: asset.ticker.clone(),
          observations: asset.observations.len(),
        });
      }
    }

    let dates: Vec<NaiveDate> = first.observations.iter().map(|(d, _)| *d).collect();
    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
      return Err(FrontierError::MisalignedSeries {
        ticker: first.ticker.clone(),
        reason: format!("dates not strictly increasing at {}", w[1]),
      });
    }

    let mut prices = Array2::<f64>::zeros((dates.len(), assets.len()));
    for (j, asset) in assets.iter().enumerate() {
      if asset.observations.len() != dates.len() {
        return Err(FrontierError::MisalignedSeries {
          ticker: asset.ticker.clone(),
          reason: format!(
            "{} observations, expected {}",
            asset.observations.len(),
            dates.len()
          ),
        });
      }

      for (i, &(date, price)) in asset.observations.iter().enumerate() {
        if date != dates[i] {
          return Err(FrontierError::MisalignedSeries {
            ticker: asset.ticker.clone(),
            reason: format!("found {date} where {} was expected", dates[i]),
          });
        }
        if !(price.is_finite() && price > 0.0) {
          return Err(FrontierError::NonPositivePrice {
            ticker: asset.ticker.clone(),
            date,
          });
        }
        prices[[i, j]] = price;
      }
    }

    Ok(Self {
      tickers: assets.into_iter().map(|a| a.ticker).collect(),
      dates,
      prices,
    })
  }

  /// Inner-join the series on their dates, then build the history.
  pub fn aligned(assets: Vec<AssetPrices>) -> FrontierResult<Self> {
    if assets.is_empty() {
      return Err(FrontierError::EmptyUniverse);
    }

    let by_date: Vec<BTreeMap<NaiveDate, f64>> = assets
      .iter()
      .map(|a| a.observations.iter().copied().collect())
      .collect();

    let mut common: BTreeSet<NaiveDate> = by_date[0].keys().copied().collect();
    for series in &by_date[1..] {
      common.retain(|d| series.contains_key(d));
    }

    let aligned: Vec<AssetPrices> = assets
      .into_iter()
      .zip(by_date)
      .map(|(asset, series)| {
        let observations = common.iter().map(|d| (*d, series[d])).collect();
        AssetPrices::new(asset.ticker, observations)
      })
      .collect();

    debug!(
      assets = aligned.len(),
      dates = common.len(),
      "aligned price series"
    );
    Self::new(aligned)
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  /// Prices with dates along rows and assets along columns.
  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }

  pub fn n_assets(&self) -> usize {
    self.tickers.len()
  }

  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }
}

/// How consecutive prices are turned into periodic returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnKind {
  /// `p[t] / p[t-1] - 1`
  #[default]
  Simple,
  /// `ln(p[t] / p[t-1])`
  Log,
}

/// Periodic returns, one row per period and one column per asset.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnSeries {
  tickers: Vec<String>,
  values: Array2<f64>,
}

impl ReturnSeries {
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  /// Returns of one asset, if the ticker is part of the series.
  pub fn asset(&self, ticker: &str) -> Option<ArrayView1<'_, f64>> {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|j| self.values.column(j))
  }

  /// Number of periods.
  pub fn len(&self) -> usize {
    self.values.nrows()
  }

  pub fn is_empty(&self) -> bool {
    self.values.nrows() == 0
  }
}

/// Annualized mean vector and covariance matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStatistics")]
pub struct ReturnStatistics {
  mean: Array1<f64>,
  covariance: Array2<f64>,
}

#[derive(Deserialize)]
struct RawStatistics {
  mean: Array1<f64>,
  covariance: Array2<f64>,
}

impl TryFrom<RawStatistics> for ReturnStatistics {
  type Error = FrontierError;

  fn try_from(raw: RawStatistics) -> FrontierResult<Self> {
    Self::new(raw.mean, raw.covariance)
  }
}

impl ReturnStatistics {
  /// Validate externally supplied statistics.
  pub fn new(mean: Array1<f64>, covariance: Array2<f64>) -> FrontierResult<Self> {
    let n = mean.len();
    if n == 0 {
      return Err(FrontierError::EmptyUniverse);
    }
    if covariance.dim() != (n, n) {
      return Err(FrontierError::InvalidStatistics(format!(
        "covariance has shape {:?}, expected ({n}, {n})",
        covariance.dim()
      )));
    }
    if mean.iter().chain(covariance.iter()).any(|x| !x.is_finite()) {
      return Err(FrontierError::InvalidStatistics(
        "non-finite entry in mean or covariance".into(),
      ));
    }

    let scale = covariance
      .iter()
      .fold(1.0_f64, |acc, x| acc.max(x.abs()));
    for i in 0..n {
      if covariance[[i, i]] < 0.0 {
        return Err(FrontierError::InvalidStatistics(format!(
          "negative variance {} for asset {i}",
          covariance[[i, i]]
        )));
      }
      for j in (i + 1)..n {
        if (covariance[[i, j]] - covariance[[j, i]]).abs() > SYMMETRY_TOLERANCE * scale {
          return Err(FrontierError::InvalidStatistics(format!(
            "covariance is not symmetric at ({i}, {j})"
          )));
        }
      }
    }

    Ok(Self { mean, covariance })
  }

  pub fn mean(&self) -> &Array1<f64> {
    &self.mean
  }

  pub fn covariance(&self) -> &Array2<f64> {
    &self.covariance
  }

  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }

  /// Pearson correlation matrix implied by the covariance.
  pub fn correlation(&self) -> Array2<f64> {
    let n = self.n_assets();
    let sd: Vec<f64> = (0..n)
      .map(|i| self.covariance[[i, i]].max(0.0).sqrt())
      .collect();

    Array2::from_shape_fn((n, n), |(i, j)| {
      let denom = sd[i] * sd[j];
      if i == j {
        1.0
      } else if denom > 1e-15 {
        (self.covariance[[i, j]] / denom).clamp(-1.0, 1.0)
      } else {
        0.0
      }
    })
  }
}

/// Turns a [`PriceHistory`] into annualized [`ReturnStatistics`].
#[derive(Clone, Copy, Debug)]
pub struct ReturnsEngine {
  annualization: u32,
  kind: ReturnKind,
}

impl Default for ReturnsEngine {
  fn default() -> Self {
    Self {
      annualization: TRADING_DAYS,
      kind: ReturnKind::Simple,
    }
  }
}

impl ReturnsEngine {
  pub fn new(annualization: u32, kind: ReturnKind) -> Self {
    Self {
      annualization,
      kind,
    }
  }

  pub fn annualization(&self) -> u32 {
    self.annualization
  }

  pub fn kind(&self) -> ReturnKind {
    self.kind
  }

  /// Periodic returns between consecutive observations.
  pub fn returns(&self, history: &PriceHistory) -> FrontierResult<ReturnSeries> {
    let prices = history.prices();
    if prices.nrows() < 2 {
      return Err(FrontierError::InsufficientData {
        ticker: history.tickers().first().cloned().unwrap_or_default(),
        observations: prices.nrows(),
      });
    }

    let prev = prices.slice(s![..-1, ..]);
    let next = prices.slice(s![1.., ..]);
    let ratio = &next / &prev;
    let values = match self.kind {
      ReturnKind::Simple => ratio.mapv(|x| x - 1.0),
      ReturnKind::Log => ratio.mapv(f64::ln),
    };

    Ok(ReturnSeries {
      tickers: history.tickers().to_vec(),
      values,
    })
  }

  /// Annualized sample mean and covariance of the periodic returns.
  pub fn statistics(&self, history: &PriceHistory) -> FrontierResult<ReturnStatistics> {
    if self.annualization == 0 {
      return Err(FrontierError::InvalidConfig(
        "annualization factor must be positive".into(),
      ));
    }

    let returns = self.returns(history)?;
    let k = self.annualization as f64;
    let values = returns.values();

    let mean = values
      .mean_axis(Axis(0))
      .ok_or_else(|| FrontierError::InvalidStatistics("no returns".into()))?;

    let ddof = if values.nrows() > 1 {
      1.0
    } else {
      warn!("single return per asset, covariance falls back to ddof = 0");
      0.0
    };
    let covariance = values
      .t()
      .cov(ddof)
      .map_err(|e| FrontierError::InvalidStatistics(e.to_string()))?;

    debug!(
      periods = returns.len(),
      assets = returns.tickers().len(),
      annualization = self.annualization,
      "derived return statistics"
    );
    ReturnStatistics::new(mean * k, covariance * k)
  }
}
