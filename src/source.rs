//! # Price Sources
//!
//! $$
//! \text{fetch} : (\text{tickers}, [t_0, t_1]) \to \text{PriceHistory}
//! $$
//!
//! Narrow boundary to whatever delivers historical prices. The pipeline only
//! ever sees an aligned [`PriceHistory`] or an error.

#[cfg(feature = "yahoo")]
pub mod yahoo;

use std::collections::HashMap;

use tracing::debug;

use crate::error::FrontierError;
use crate::error::FrontierResult;
use crate::portfolio::data::AssetPrices;
use crate::portfolio::data::DateRange;
use crate::portfolio::data::PriceHistory;

/// Supplies aligned price histories for a set of tickers.
pub trait PriceSource {
  fn fetch(&self, tickers: &[String], range: &DateRange) -> FrontierResult<PriceHistory>;
}

/// Fixed price series held in memory, e.g. synthetic fixtures.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPriceSource {
  series: HashMap<String, AssetPrices>,
}

impl InMemoryPriceSource {
  pub fn new(series: impl IntoIterator<Item = AssetPrices>) -> Self {
    Self {
      series: series
        .into_iter()
        .map(|s| (s.ticker.clone(), s))
        .collect(),
    }
  }

  pub fn insert(&mut self, series: AssetPrices) {
    self.series.insert(series.ticker.clone(), series);
  }
}

impl PriceSource for InMemoryPriceSource {
  fn fetch(&self, tickers: &[String], range: &DateRange) -> FrontierResult<PriceHistory> {
    if tickers.is_empty() {
      return Err(FrontierError::EmptyUniverse);
    }

    let assets = tickers
      .iter()
      .map(|ticker| {
        let series = self
          .series
          .get(ticker)
          .ok_or_else(|| FrontierError::InsufficientData {
            ticker: ticker.clone(),
            observations: 0,
          })?;
        let observations = series
          .observations
          .iter()
          .copied()
          .filter(|(date, _)| range.contains(*date))
          .collect();
        Ok(AssetPrices::new(ticker.clone(), observations))
      })
      .collect::<FrontierResult<Vec<_>>>()?;

    debug!(tickers = tickers.len(), start = %range.start, end = %range.end, "fetched in-memory prices");
    PriceHistory::aligned(assets)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 3, d).unwrap()
  }

  fn source() -> InMemoryPriceSource {
    InMemoryPriceSource::new([
      AssetPrices::new(
        "AAA".into(),
        (1..=10).map(|d| (day(d), 100.0 + d as f64)).collect(),
      ),
      AssetPrices::new(
        "BBB".into(),
        (1..=10)
          .filter(|d| d % 3 != 0)
          .map(|d| (day(d), 50.0 - d as f64))
          .collect(),
      ),
    ])
  }

  #[test]
  fn fetch_filters_range_and_aligns() {
    let range = DateRange::new(day(2), day(8));
    let history = source()
      .fetch(&["AAA".to_string(), "BBB".to_string()], &range)
      .unwrap();

    assert_eq!(history.tickers(), &["AAA".to_string(), "BBB".to_string()]);
    assert_eq!(history.dates(), &[day(2), day(4), day(5), day(7), day(8)]);
    assert_eq!(history.prices()[[0, 0]], 102.0);
    assert_eq!(history.prices()[[0, 1]], 48.0);
  }

  #[test]
  fn unknown_ticker_is_insufficient_data() {
    let range = DateRange::new(day(1), day(10));
    let err = source().fetch(&["ZZZ".to_string()], &range).unwrap_err();
    assert!(matches!(
      err,
      FrontierError::InsufficientData { ref ticker, observations: 0 } if ticker == "ZZZ"
    ));
  }

  #[test]
  fn narrow_range_is_insufficient_data() {
    let range = DateRange::new(day(5), day(5));
    let err = source().fetch(&["AAA".to_string()], &range).unwrap_err();
    assert!(matches!(err, FrontierError::InsufficientData { observations: 1, .. }));
  }

  #[test]
  fn empty_ticker_list_is_rejected() {
    let range = DateRange::new(day(1), day(10));
    assert!(matches!(
      source().fetch(&[], &range),
      Err(FrontierError::EmptyUniverse)
    ));
  }
}
