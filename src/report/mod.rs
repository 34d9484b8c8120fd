//! CSV report rendering: the per-holding stocks analysis and the
//! market-wide indicators table, one dated file each per run.

use crate::config::ReportConfig;
use crate::models::{IndicatorsTable, Snapshot, Stock};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

// ── Analytics ─────────────────────────────────────────────────────────────────

/// Sum of dividend amounts due in `year`. `None` when the stock has no
/// dividend data or no announcement fell in that year, so the report cell
/// stays blank instead of showing a misleading zero.
pub fn dividends_total_for_year(stock: &Stock, year: i32) -> Option<f64> {
    use chrono::Datelike;
    let amounts: Vec<f64> = stock
        .dividends
        .as_ref()?
        .iter()
        .filter(|d| d.due_date.year() == year)
        .map(|d| d.amount)
        .collect();
    if amounts.is_empty() {
        None
    } else {
        Some(amounts.iter().sum())
    }
}

/// Market value of every priced, owned position.
pub fn portfolio_total_value(stocks: &[Stock]) -> f64 {
    stocks
        .iter()
        .filter_map(|s| Some(s.price? * f64::from(s.quantity_owned?)))
        .sum()
}

/// Percentage distance of `price` from `reference`.
pub fn pct_from(price: f64, reference: f64) -> Option<f64> {
    if reference == 0.0 {
        return None;
    }
    Some((price - reference) / reference * 100.0)
}

// ── Writer ────────────────────────────────────────────────────────────────────

pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(config: &ReportConfig) -> Result<Self> {
        Self::at(&config.dir)
    }

    pub fn at(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("could not create report dir {dir:?}"))?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    /// One row per tracked stock: identity, price position against cost and
    /// the 52-week band, valuation figures, and dividend totals for the
    /// snapshot year and the two before it.
    pub fn write_stocks_analysis(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        use chrono::Datelike;

        let path = self.dir.join(format!("stocks_analysis_{}.csv", snapshot.date));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {path:?}"))?;

        let years: Vec<i32> = (0..3).map(|i| snapshot.date.year() - i).collect();
        let mut headers = vec![
            "Sector".to_string(),
            "Stock Code".to_string(),
            "Stock".to_string(),
            "Price".to_string(),
            "Cost Price".to_string(),
            "% Diff from Cost Price".to_string(),
            "% of Portfolio".to_string(),
            "52 Week High".to_string(),
            "% Diff from 52 Week High".to_string(),
            "52 Week Low".to_string(),
            "% Diff from 52 Week Low".to_string(),
            "P/E Ratio".to_string(),
            "Fair Value".to_string(),
            "% Diff from Fair Value".to_string(),
            "Fair Value Certainty".to_string(),
            "% Div Yield".to_string(),
        ];
        headers.extend(years.iter().map(|y| format!("Dividends {y}")));
        writer.write_record(&headers)?;

        let total_value = portfolio_total_value(&snapshot.stocks);
        for stock in &snapshot.stocks {
            let position_value = stock
                .price
                .zip(stock.quantity_owned)
                .map(|(price, quantity)| price * f64::from(quantity));
            let portfolio_share = position_value.and_then(|v| {
                if total_value == 0.0 { None } else { Some(v / total_value * 100.0) }
            });

            let mut row = vec![
                stock.sector.clone().unwrap_or_default(),
                stock.code.to_string(),
                stock.name.clone().unwrap_or_default(),
                num_cell(stock.price),
                num_cell(stock.cost_price),
                num_cell(stock.price.zip(stock.cost_price).and_then(|(p, c)| pct_from(p, c))),
                num_cell(portfolio_share),
                num_cell(stock.week_52_high),
                num_cell(stock.price.zip(stock.week_52_high).and_then(|(p, h)| pct_from(p, h))),
                num_cell(stock.week_52_low),
                num_cell(stock.price.zip(stock.week_52_low).and_then(|(p, l)| pct_from(p, l))),
                num_cell(stock.benchmark.p_e),
                num_cell(stock.fair_value.as_ref().map(|fv| fv.average)),
                num_cell(
                    stock
                        .price
                        .zip(stock.fair_value.as_ref().map(|fv| fv.average))
                        .and_then(|(p, fv)| pct_from(p, fv)),
                ),
                stock
                    .fair_value
                    .as_ref()
                    .map(|fv| fv.uncertainty.clone())
                    .unwrap_or_default(),
                num_cell(stock.benchmark.div_yield),
            ];
            row.extend(years.iter().map(|&y| num_cell(dividends_total_for_year(stock, y))));
            writer.write_record(&row)?;
        }

        writer.flush()?;
        info!("stocks analysis written to {path:?}");
        Ok(path)
    }

    /// The indicators table as scraped, group column first, in the source's
    /// own column order.
    pub fn write_market_analysis(&self, table: &IndicatorsTable) -> Result<PathBuf> {
        let path = self.dir.join(format!("market_analysis_{}.csv", table.date));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {path:?}"))?;

        writer.write_record(&table.headers)?;
        for stock in &table.stocks {
            writer.write_record(&[
                stock.industry_group.clone().unwrap_or_default(),
                stock.name.clone().unwrap_or_default(),
                num_cell(stock.price),
                num_cell(stock.issued_shares),
                num_cell(stock.net_profit),
                num_cell(stock.shareholders_equity),
                num_cell(stock.market_cap),
                num_cell(stock.market_cap_percentage),
                num_cell(stock.earnings_per_share),
                num_cell(stock.benchmark.p_e),
                num_cell(stock.book_value_per_share),
                num_cell(stock.benchmark.p_b),
            ])?;
        }

        writer.flush()?;
        info!("market analysis written to {path:?}");
        Ok(path)
    }
}

/// Blank cell for an unresolved value.
fn num_cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
