//! The market-wide indicators page: one table listing every listed company
//! with its valuation figures, sectioned by industry-group marker rows.
//!
//! Unlike company pages, this parse is all-or-nothing. The table feeds the
//! enrichment join, and a partially parsed table would silently mis-enrich,
//! so any broken row fails the whole fetch.

use chrono::{Local, Utc};
use scraper::{Html, Selector};

use crate::models::{IndicatorsTable, Stock};

use super::http_client::HttpClient;
use super::{ScrapeError, cleaner};

// Column positions, left to right. Marker rows carry the group name in the
// company column and leave the price column empty.
const COL_COMPANY: usize = 0;
const COL_PRICE: usize = 1;
const COL_ISSUED_SHARES: usize = 2;
const COL_NET_PROFIT: usize = 3;
const COL_EQUITY: usize = 4;
const COL_MARKET_CAP: usize = 5;
const COL_MARKET_CAP_PCT: usize = 6;
const COL_EPS: usize = 7;
const COL_PE: usize = 8;
const COL_BOOK_VALUE: usize = 9;
const COL_PB: usize = 10;
const COL_COUNT: usize = 11;

pub async fn fetch(client: &HttpClient, url: &str) -> Result<IndicatorsTable, ScrapeError> {
    let html = client.get_text(url).await?;
    parse(&html)
}

pub fn parse(html: &str) -> Result<IndicatorsTable, ScrapeError> {
    let doc = Html::parse_document(html);

    let table_sel = selector("table.Table3")?;
    let tr_sel = selector("tr")?;
    let th_sel = selector("th")?;
    let td_sel = selector("td")?;

    let table = doc
        .select(&table_sel)
        .next()
        .ok_or_else(|| ScrapeError::Malformed("indicators table not found".into()))?;

    let mut rows = table.select(&tr_sel);
    let header_row = rows
        .next()
        .ok_or_else(|| ScrapeError::Malformed("indicators table has no rows".into()))?;
    let mut headers: Vec<String> = header_row
        .select(&th_sel)
        .map(|th| th.text().collect::<String>().trim().to_string())
        .collect();
    if headers.len() < COL_COUNT {
        return Err(ScrapeError::Malformed(format!(
            "indicators header has {} columns, expected {}",
            headers.len(),
            COL_COUNT
        )));
    }

    let scraped_at = Utc::now().naive_utc();
    let mut stocks: Vec<Stock> = Vec::new();
    let mut industry_groups: Vec<String> = Vec::new();

    for row in rows {
        let cells: Vec<String> = row
            .select(&td_sel)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();

        if cells.len() <= COL_PRICE || cells[COL_COMPANY].is_empty() {
            return Err(ScrapeError::Malformed(format!(
                "unreadable indicators row: {cells:?}"
            )));
        }

        if cells[COL_PRICE].is_empty() {
            // Group marker. Companies are listed above their marker, so the
            // name walks backwards until it meets an already-tagged row.
            let group = cells[COL_COMPANY].clone();
            for stock in stocks.iter_mut().rev() {
                if stock.industry_group.is_some() {
                    break;
                }
                stock.industry_group = Some(group.clone());
            }
            industry_groups.push(group);
            continue;
        }

        if cells.len() < COL_COUNT {
            return Err(ScrapeError::Malformed(format!(
                "indicators row has {} columns, expected {}",
                cells.len(),
                COL_COUNT
            )));
        }

        let mut stock = Stock::empty(0, scraped_at);
        stock.name = Some(cells[COL_COMPANY].clone());
        stock.price = cleaner::parse_num(&cells[COL_PRICE]);
        stock.issued_shares = cleaner::parse_num(&cells[COL_ISSUED_SHARES]);
        stock.net_profit = cleaner::parse_num(&cells[COL_NET_PROFIT]);
        stock.shareholders_equity = cleaner::parse_num(&cells[COL_EQUITY]);
        stock.market_cap = cleaner::parse_num(&cells[COL_MARKET_CAP]);
        stock.market_cap_percentage = cleaner::parse_num(&cells[COL_MARKET_CAP_PCT]);
        stock.earnings_per_share = cleaner::parse_num(&cells[COL_EPS]);
        stock.benchmark.p_e = cleaner::parse_num(&cells[COL_PE]);
        stock.book_value_per_share = cleaner::parse_num(&cells[COL_BOOK_VALUE]);
        stock.benchmark.p_b = cleaner::parse_num(&cells[COL_PB]);
        stocks.push(stock);
    }

    headers.insert(0, "Industry Group".to_string());

    Ok(IndicatorsTable {
        date: Local::now().date_naive(),
        stocks,
        industry_groups,
        headers,
    })
}

fn selector(s: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(s).map_err(|e| ScrapeError::Malformed(format!("selector {s}: {e}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "<tr>\
        <th>Company</th><th>Price</th><th>Issued Shares</th><th>Net Income</th>\
        <th>Shareholders Equity</th><th>Market Cap</th><th>Market Cap %</th>\
        <th>EPS</th><th>P/E</th><th>Book Value</th><th>P/B</th></tr>";

    fn row(name: &str, price: &str) -> String {
        format!(
            "<tr><td>{name}</td><td>{price}</td><td>1,000</td><td>500</td>\
             <td>2,000</td><td>30,000</td><td>1.2</td><td>0.50</td>\
             <td>15.0</td><td>2.00</td><td>3.1</td></tr>"
        )
    }

    fn marker(name: &str) -> String {
        format!(
            "<tr><td>{name}</td><td></td><td></td><td></td><td></td><td></td>\
             <td></td><td></td><td></td><td></td><td></td></tr>"
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            "<html><body><table class=\"Table3\">{HEADER}{}</table></body></html>",
            rows.concat()
        )
    }

    #[test]
    fn group_marker_back_propagates_to_untagged_rows() {
        let html = page(&[
            row("Riyad Bank", "28.5"),
            row("Alinma Bank", "31.2"),
            marker("Banks"),
            row("Tawuniya", "120.0"),
            marker("Insurance"),
        ]);
        let table = parse(&html).unwrap();

        assert_eq!(table.industry_groups, vec!["Banks", "Insurance"]);
        assert_eq!(table.stocks.len(), 3);
        assert_eq!(table.stocks[0].industry_group.as_deref(), Some("Banks"));
        assert_eq!(table.stocks[1].industry_group.as_deref(), Some("Banks"));
        assert_eq!(table.stocks[2].industry_group.as_deref(), Some("Insurance"));
    }

    #[test]
    fn back_propagation_stops_at_tagged_rows() {
        let html = page(&[
            row("Riyad Bank", "28.5"),
            marker("Banks"),
            row("Tawuniya", "120.0"),
            row("Bupa Arabia", "180.0"),
            marker("Insurance"),
        ]);
        let table = parse(&html).unwrap();

        assert_eq!(table.stocks[0].industry_group.as_deref(), Some("Banks"));
        assert_eq!(table.stocks[1].industry_group.as_deref(), Some("Insurance"));
        assert_eq!(table.stocks[2].industry_group.as_deref(), Some("Insurance"));
    }

    #[test]
    fn numbers_with_separators_parse() {
        let html = page(&[row("Riyad Bank", "28.5"), marker("Banks")]);
        let table = parse(&html).unwrap();
        let stock = &table.stocks[0];

        assert_eq!(stock.issued_shares, Some(1000.0));
        assert_eq!(stock.market_cap, Some(30000.0));
        assert_eq!(stock.benchmark.p_e, Some(15.0));
        assert_eq!(stock.benchmark.p_b, Some(3.1));
    }

    #[test]
    fn headers_gain_the_group_column() {
        let html = page(&[row("Riyad Bank", "28.5"), marker("Banks")]);
        let table = parse(&html).unwrap();
        assert_eq!(table.headers[0], "Industry Group");
        assert_eq!(table.headers[1], "Company");
        assert_eq!(table.headers.len(), COL_COUNT + 1);
    }

    #[test]
    fn one_broken_row_fails_the_whole_parse() {
        let short_row = "<tr><td>Riyad Bank</td><td>28.5</td><td>1,000</td></tr>".to_string();
        let html = page(&[row("Alinma Bank", "31.2"), short_row, marker("Banks")]);
        assert!(parse(&html).is_err());
    }

    #[test]
    fn missing_table_is_an_error() {
        assert!(parse("<html><body><p>maintenance</p></body></html>").is_err());
    }
}
