//! # Yahoo Finance Source
//!
//! $$
//! p_t = \text{adjclose}_t
//! $$
//!
//! Daily adjusted closes from Yahoo Finance. Requires the `yahoo` feature.

use anyhow::anyhow;
use anyhow::Context;
use chrono::DateTime;
use chrono::NaiveDate;
use time::OffsetDateTime;
use tracing::info;
use yahoo_finance_api::YahooConnector;

use super::PriceSource;
use crate::error::FrontierResult;
use crate::portfolio::data::AssetPrices;
use crate::portfolio::data::DateRange;
use crate::portfolio::data::PriceHistory;

/// Blocking Yahoo Finance price source.
#[derive(Clone, Copy, Debug, Default)]
pub struct YahooPriceSource;

fn to_offset(date: NaiveDate) -> anyhow::Result<OffsetDateTime> {
  let ts = date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| anyhow!("invalid date {date}"))?
    .and_utc()
    .timestamp();
  OffsetDateTime::from_unix_timestamp(ts).with_context(|| format!("timestamp out of range for {date}"))
}

impl YahooPriceSource {
  fn fetch_one(
    &self,
    connector: &YahooConnector,
    ticker: &str,
    range: &DateRange,
  ) -> anyhow::Result<AssetPrices> {
    let start = to_offset(range.start)?;
    // `end` is inclusive for callers, exclusive for the quote API.
    let end = to_offset(range.end.succ_opt().unwrap_or(range.end))?;

    let response = tokio_test::block_on(connector.get_quote_history(ticker, start, end))
      .with_context(|| format!("quote history request failed for {ticker}"))?;
    let quotes = response
      .quotes()
      .with_context(|| format!("no quotes for {ticker}"))?;

    let observations = quotes
      .iter()
      .filter_map(|q| {
        DateTime::from_timestamp(q.timestamp as i64, 0).map(|dt| (dt.date_naive(), q.adjclose))
      })
      .collect();

    Ok(AssetPrices::new(ticker.to_string(), observations))
  }
}

impl PriceSource for YahooPriceSource {
  fn fetch(&self, tickers: &[String], range: &DateRange) -> FrontierResult<PriceHistory> {
    let connector = YahooConnector::new().context("cannot create Yahoo connector")?;

    let mut assets = Vec::with_capacity(tickers.len());
    for ticker in tickers {
      assets.push(self.fetch_one(&connector, ticker, range)?);
    }

    info!(tickers = tickers.len(), start = %range.start, end = %range.end, "fetched Yahoo prices");
    PriceHistory::aligned(assets)
  }
}
