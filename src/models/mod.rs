use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ── Stock ─────────────────────────────────────────────────────────────────────

/// One tracked security and everything scraped about it on a given day.
///
/// Every field that comes off the wire is an `Option`: a missing value means
/// "not obtained", never a magic number. `success_scraping` records whether
/// the fields the reports depend on all resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stock {
    pub code: u32,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry_group: Option<String>,
    pub price: Option<f64>,
    #[serde(rename = "52_week_high")]
    pub week_52_high: Option<f64>,
    #[serde(rename = "52_week_low")]
    pub week_52_low: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_percentage: Option<f64>,
    pub issued_shares: Option<f64>,
    pub net_profit: Option<f64>,
    pub shareholders_equity: Option<f64>,
    pub earnings_per_share: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub quantity_owned: Option<u32>,
    pub cost_price: Option<f64>,
    pub dividends: Option<Vec<Dividend>>,
    #[serde(default)]
    pub benchmark: Benchmark,
    pub fair_value: Option<FairValue>,
    pub scraped_at: NaiveDateTime,
    pub success_scraping: bool,
}

impl Stock {
    /// A stock with nothing but its identity set. This is what a dead
    /// company page produces.
    pub fn empty(code: u32, scraped_at: NaiveDateTime) -> Self {
        Self {
            code,
            name: None,
            sector: None,
            industry_group: None,
            price: None,
            week_52_high: None,
            week_52_low: None,
            market_cap: None,
            market_cap_percentage: None,
            issued_shares: None,
            net_profit: None,
            shareholders_equity: None,
            earnings_per_share: None,
            book_value_per_share: None,
            quantity_owned: None,
            cost_price: None,
            dividends: None,
            benchmark: Benchmark::default(),
            fair_value: None,
            scraped_at,
            success_scraping: false,
        }
    }

    /// Whether every mandatory field resolved. Enrichment fields (issued
    /// shares, net profit, fair value, benchmark contents) do not count.
    pub fn is_complete(&self) -> bool {
        self.name.is_some()
            && self.sector.is_some()
            && self.industry_group.is_some()
            && self.price.is_some_and(|p| p >= 0.0)
            && self.week_52_high.is_some_and(|p| p >= 0.0)
            && self.week_52_low.is_some_and(|p| p >= 0.0)
            && self.dividends.is_some()
    }
}

// ── Dividend ──────────────────────────────────────────────────────────────────

/// A single dividend announcement. Rows that fail to parse are dropped whole,
/// so a constructed value is always fully populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dividend {
    pub announcement_date: NaiveDate,
    pub due_date: NaiveDate,
    pub distribution_date: NaiveDate,
    pub distribution_way: String,
    pub amount: f64,
}

// ── Benchmark ─────────────────────────────────────────────────────────────────

/// Peer-comparison figures. Dividend yield comes from the benchmark query;
/// P/E and P/B are filled in from the market indicators table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Benchmark {
    pub div_yield: Option<f64>,
    pub p_e: Option<f64>,
    pub p_b: Option<f64>,
}

// ── Fair value ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FairValue {
    pub average: f64,
    pub uncertainty: String,
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// One calendar day's acquisition result, persisted as `<date>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub all_success: bool,
    pub date: NaiveDate,
    pub stocks: Vec<Stock>,
}

impl Snapshot {
    pub fn assemble(date: NaiveDate, stocks: Vec<Stock>) -> Self {
        let all_success = stocks.iter().all(|s| s.success_scraping);
        Self { all_success, date, stocks }
    }

    pub fn find(&self, code: u32) -> Option<&Stock> {
        self.stocks.iter().find(|s| s.code == code)
    }
}

// ── Market indicators ─────────────────────────────────────────────────────────

/// The full-market indicators table, scraped once per run. Each stock row is
/// tagged with its industry group; `headers` keeps the column order for
/// rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorsTable {
    pub date: NaiveDate,
    pub stocks: Vec<Stock>,
    pub industry_groups: Vec<String>,
    pub headers: Vec<String>,
}

impl IndicatorsTable {
    /// Case-insensitive lookup by (company name, industry group).
    pub fn find(&self, name: &str, industry_group: &str) -> Option<&Stock> {
        self.stocks.iter().find(|s| {
            s.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(name))
                && s.industry_group
                    .as_deref()
                    .is_some_and(|g| g.eq_ignore_ascii_case(industry_group))
        })
    }
}
