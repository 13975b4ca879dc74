use anyhow::Result;
use chrono::Days;
use chrono::NaiveDate;
use efficient_frontier::portfolio::AssetPrices;
use efficient_frontier::portfolio::DateRange;
use efficient_frontier::portfolio::FrontierReport;
use efficient_frontier::portfolio::PortfolioEngine;
use efficient_frontier::portfolio::PortfolioEngineConfig;
use efficient_frontier::portfolio::PortfolioResult;
use efficient_frontier::source::InMemoryPriceSource;
use prettytable::Cell;
use prettytable::Row;
use prettytable::Table;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Normal;

// (ticker, annual drift, annual volatility)
const UNIVERSE: [(&str, f64, f64); 4] = [
  ("AAA", 0.10, 0.20),
  ("BBB", 0.08, 0.14),
  ("CCC", 0.12, 0.22),
  ("DDD", 0.05, 0.08),
];

/// Geometric Brownian motion closes on consecutive calendar days.
fn synthetic_prices(start: NaiveDate, days: u64, seed: u64) -> Result<Vec<AssetPrices>> {
  let mut rng = StdRng::seed_from_u64(seed);
  let dt: f64 = 1.0 / 252.0;

  UNIVERSE
    .iter()
    .map(|&(ticker, mu, sigma)| -> Result<AssetPrices> {
      let shock = Normal::new((mu - 0.5 * sigma * sigma) * dt, sigma * dt.sqrt())?;
      let mut price = 100.0;
      let observations = (0..days)
        .map(|d| {
          if d > 0 {
            price *= f64::exp(shock.sample(&mut rng));
          }
          (start + Days::new(d), price)
        })
        .collect();
      Ok(AssetPrices::new(ticker.to_string(), observations))
    })
    .collect()
}

fn portfolio_row(label: &str, p: &PortfolioResult) -> Row {
  let mut cells = vec![
    Cell::new(label),
    Cell::new(&format!("{:.4}", p.expected_return)),
    Cell::new(&format!("{:.4}", p.volatility)),
    Cell::new(&format!("{:.4}", p.sharpe_ratio)),
  ];
  cells.extend(p.weights.iter().map(|w| Cell::new(&format!("{:.4}", w))));
  Row::new(cells)
}

fn print_report(report: &FrontierReport) {
  let mut table = Table::new();
  let mut titles = vec![
    Cell::new("portfolio"),
    Cell::new("return"),
    Cell::new("volatility"),
    Cell::new("sharpe"),
  ];
  titles.extend(report.tickers().iter().map(|t| Cell::new(t)));
  table.set_titles(Row::new(titles));

  let optimal = report.optimal();
  table.add_row(portfolio_row("max sharpe", &optimal.max_sharpe));
  table.add_row(portfolio_row("min variance", &optimal.min_variance));
  if let Some(p) = report.sample().max_sharpe() {
    table.add_row(portfolio_row("best draw (sharpe)", p));
  }
  if let Some(p) = report.sample().min_volatility() {
    table.add_row(portfolio_row("best draw (volatility)", p));
  }
  for (i, p) in report.frontier().iter().enumerate() {
    table.add_row(portfolio_row(&format!("frontier #{i}"), p));
  }
  table.printstd();
}

fn main() -> Result<()> {
  let start = NaiveDate::from_ymd_opt(2019, 1, 1).ok_or_else(|| anyhow::anyhow!("bad start date"))?;
  let days = 3 * 365;
  let source = InMemoryPriceSource::new(synthetic_prices(start, days, 7)?);

  let config = PortfolioEngineConfig {
    tickers: UNIVERSE.iter().map(|(t, ..)| t.to_string()).collect(),
    range: DateRange::new(start, start + Days::new(days - 1)),
    risk_free_rate: 0.02,
    frontier_points: 6,
    ..PortfolioEngineConfig::default()
  };

  let report = PortfolioEngine::new(config).run(&source)?;
  println!("{} Monte Carlo portfolios", report.sample().len());
  print_report(&report);
  Ok(())
}
