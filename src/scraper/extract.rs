//! Field-level extraction from a company quote page.
//!
//! Every function here swallows its own failures: a missing node or a bad
//! number is logged and becomes `None`, and no field stops any other field
//! from being read. Callers decide what an incomplete stock means.

use crate::models::{Dividend, Stock};
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::cleaner;

/// Run every extractor against the page and fill the stock in place.
pub fn apply(html: &str, stock: &mut Stock) {
    let doc = Html::parse_document(html);
    let code = stock.code;

    stock.name = name(&doc, code);
    stock.sector = sector(&doc, code);
    stock.industry_group = industry_group(&doc, code);
    stock.price = price(&doc, code);
    if let Some((high, low)) = week_52_bounds(&doc, code) {
        stock.week_52_high = Some(high);
        stock.week_52_low = Some(low);
    }
    stock.dividends = dividends(&doc, code);
}

/// Dividends-only parse used by the poll loop while the table renders late.
pub fn dividends_from_page(html: &str, code: u32) -> Option<Vec<Dividend>> {
    dividends(&Html::parse_document(html), code)
}

// ── Individual fields ─────────────────────────────────────────────────────────

pub fn name(doc: &Html, code: u32) -> Option<String> {
    let text = select_text(doc, "p.trade_name strong", 0);
    if text.is_none() {
        warn!("stock {code}: company name not found");
    }
    text
}

/// The second trade_name block holds "<sector> / <industry group>"; the
/// sector sits in the strong tag, the group in the link beside it.
pub fn sector(doc: &Html, code: u32) -> Option<String> {
    let text = nested_text(doc, "p.trade_name", 1, "strong");
    if text.is_none() {
        warn!("stock {code}: sector not found");
    }
    text
}

pub fn industry_group(doc: &Html, code: u32) -> Option<String> {
    let text = nested_text(doc, "p.trade_name", 1, "a");
    if text.is_none() {
        warn!("stock {code}: industry group not found");
    }
    text
}

pub fn price(doc: &Html, code: u32) -> Option<f64> {
    let value = select_text(doc, "div#chart_tab1 div.table_sep div dd", 0)
        .as_deref()
        .and_then(cleaner::parse_num);
    if value.is_none() {
        warn!("stock {code}: price not found");
    }
    value
}

/// Returns (high, low). The page labels the pair with a "52 WEEK" paragraph
/// followed by a two-cell table, high first.
pub fn week_52_bounds(doc: &Html, code: u32) -> Option<(f64, f64)> {
    let bounds = (|| {
        let p_sel = Selector::parse("p").ok()?;
        let label = doc
            .select(&p_sel)
            .find(|p| p.text().collect::<String>().trim() == "52 WEEK")?;
        let table = label
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "table")?;

        let td_sel = Selector::parse("tbody tr td").ok()?;
        let mut cells = table.select(&td_sel);
        let high = cleaner::parse_num(&text_of(cells.next()?))?;
        let low = cleaner::parse_num(&text_of(cells.next()?))?;
        Some((high, low))
    })();

    if bounds.is_none() {
        warn!("stock {code}: 52-week bounds not found");
    }
    bounds
}

/// `None` means the table is absent or unusable; an empty list means the
/// table was there with no announcements. A malformed row is dropped without
/// taking its siblings down.
pub fn dividends(doc: &Html, code: u32) -> Option<Vec<Dividend>> {
    let table_sel = Selector::parse("table#dividendsTable").ok()?;
    let table = doc.select(&table_sel).next()?;

    let row_sel = Selector::parse("tbody tr").ok()?;
    let td_sel = Selector::parse("td").ok()?;

    let mut dividends = Vec::new();
    for row in table.select(&row_sel) {
        let cells: Vec<String> = row.select(&td_sel).map(|td| text_of(td)).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        match dividend_row(&cells) {
            Some(dividend) => dividends.push(dividend),
            None => warn!("stock {code}: dropping malformed dividend row {cells:?}"),
        }
    }
    Some(dividends)
}

fn dividend_row(cells: &[String]) -> Option<Dividend> {
    let way = cells.get(3)?.clone();
    if way.is_empty() {
        return None;
    }
    Some(Dividend {
        announcement_date: cleaner::parse_date(cells.first()?)?,
        due_date: cleaner::parse_date(cells.get(1)?)?,
        distribution_date: cleaner::parse_date(cells.get(2)?)?,
        distribution_way: way,
        amount: cleaner::parse_num(cells.get(4)?)?,
    })
}

// ── Selector helpers ──────────────────────────────────────────────────────────

fn select_text(doc: &Html, selector: &str, nth: usize) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let text = text_of(doc.select(&sel).nth(nth)?);
    if text.is_empty() { None } else { Some(text) }
}

fn nested_text(doc: &Html, outer: &str, nth: usize, inner: &str) -> Option<String> {
    let outer_sel = Selector::parse(outer).ok()?;
    let inner_sel = Selector::parse(inner).ok()?;
    let el = doc.select(&outer_sel).nth(nth)?;
    let text = text_of(el.select(&inner_sel).next()?);
    if text.is_empty() { None } else { Some(text) }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    const PAGE: &str = r##"
    <html><body>
      <p class="trade_name"><strong>Saudi Telecom Co.</strong></p>
      <p class="trade_name"><strong>Communication Services</strong> / <a href="#">Telecommunication Services</a></p>
      <div id="chart_tab1">
        <div class="table_sep"><div><dt>Last Price</dt><dd>41.85</dd></div></div>
      </div>
      <p>52 WEEK</p>
      <table><tbody><tr><td>44.90</td><td>33.50</td></tr></tbody></table>
      <table id="dividendsTable">
        <tbody>
          <tr><td>2024/01/21</td><td>2024/02/01</td><td>2024/02/15</td><td>Cash</td><td>1.00</td></tr>
          <tr><td>bad date</td><td>2024/05/01</td><td>2024/05/15</td><td>Cash</td><td>1.00</td></tr>
          <tr><td>2023/10/19</td><td>2023/11/01</td><td>2023/11/15</td><td>Cash</td><td>0.40</td></tr>
        </tbody>
      </table>
    </body></html>"##;

    fn scraped(html: &str) -> Stock {
        let mut stock = Stock::empty(7010, Utc::now().naive_utc());
        apply(html, &mut stock);
        stock
    }

    #[test]
    fn extracts_every_field_from_a_full_page() {
        let stock = scraped(PAGE);
        assert_eq!(stock.name.as_deref(), Some("Saudi Telecom Co."));
        assert_eq!(stock.sector.as_deref(), Some("Communication Services"));
        assert_eq!(stock.industry_group.as_deref(), Some("Telecommunication Services"));
        assert_eq!(stock.price, Some(41.85));
        assert_eq!(stock.week_52_high, Some(44.90));
        assert_eq!(stock.week_52_low, Some(33.50));
    }

    #[test]
    fn malformed_dividend_row_is_dropped_not_fatal() {
        let stock = scraped(PAGE);
        let dividends = stock.dividends.expect("table was present");
        assert_eq!(dividends.len(), 2);
        assert_eq!(dividends[0].amount, 1.00);
        assert_eq!(
            dividends[1].due_date,
            NaiveDate::from_ymd_opt(2023, 11, 1).unwrap()
        );
    }

    #[test]
    fn fields_are_independent() {
        // Name text gutted; price must still come through.
        let page = PAGE.replace("<strong>Saudi Telecom Co.</strong>", "<strong></strong>");
        let stock = scraped(&page);
        assert_eq!(stock.name, None);
        assert_eq!(stock.sector.as_deref(), Some("Communication Services"));
        assert_eq!(stock.price, Some(41.85));
        assert!(!stock.is_complete());
    }

    #[test]
    fn missing_dividends_table_is_none_not_empty() {
        let page = PAGE.replace("dividendsTable", "somethingElse");
        let stock = scraped(&page);
        assert_eq!(stock.dividends, None);
    }

    #[test]
    fn empty_dividends_table_is_an_empty_list() {
        let page = r#"<table id="dividendsTable"><tbody></tbody></table>"#;
        assert_eq!(dividends_from_page(page, 7010), Some(vec![]));
    }
}
