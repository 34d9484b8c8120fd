pub mod cleaner;
pub mod extract;
pub mod http_client;
pub mod indicators;

use crate::config::AppConfig;
use crate::models::{Benchmark, FairValue, IndicatorsTable, Stock};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};
use url::Url;

use self::http_client::HttpClient;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failures inside the scraping layer. None of these ever escape a
/// `scrape_one` call; they are logged and folded into the stock's verdict.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("malformed page: {0}")]
    Malformed(String),
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable data source abstraction.
#[async_trait]
pub trait StockDataSource: Send + Sync {
    async fn scrape_one(&self, code: u32) -> Stock;

    /// Scrapes each code in turn, preserving input order. Fetches are
    /// sequential: the sources rate-limit aggressively and one page at a
    /// time is the polite ceiling.
    async fn scrape_list(&self, codes: &[u32]) -> Vec<Stock> {
        let mut stocks = Vec::with_capacity(codes.len());
        for &code in codes {
            stocks.push(self.scrape_one(code).await);
        }
        stocks
    }

    /// The full-market indicators table, if this source could obtain one.
    async fn market_indicators(&self) -> Option<IndicatorsTable>;
}

// ── Tadawul scraper ───────────────────────────────────────────────────────────

pub struct TadawulScraper {
    client: HttpClient,
    company_base: String,
    indicators_url: String,
    finbox_url: String,
    benchmark_query: String,
    fair_value_query: String,
    cookie_header: Option<String>,
    dividends_poll: Duration,
    dividends_timeout: Duration,
    /// First fetch outcome sticks for this scraper's lifetime, failure
    /// included; there is no mid-run retry of the indicators page.
    indicators: OnceCell<Option<IndicatorsTable>>,
}

impl TadawulScraper {
    pub fn new(config: &AppConfig) -> Result<Self, ScrapeError> {
        let base = config.source.base_url.trim_end_matches('/');
        let company_base = if config.source.session_key.is_empty() {
            format!("{base}/")
        } else {
            format!("{base}/{}/", config.source.session_key)
        };

        let cookie_header = if config.finbox.cookies.is_empty() {
            None
        } else {
            let pairs: Vec<String> = config
                .finbox
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            Some(pairs.join("; "))
        };

        Ok(Self {
            client: HttpClient::new(&config.scraper)?,
            company_base,
            indicators_url: config.source.indicators_url.clone(),
            finbox_url: config.finbox.url.clone(),
            benchmark_query: config.finbox.benchmark_query.clone(),
            fair_value_query: config.finbox.fair_value_query.clone(),
            cookie_header,
            dividends_poll: Duration::from_millis(config.scraper.dividends_poll_ms),
            dividends_timeout: Duration::from_secs(config.scraper.dividends_timeout_secs),
            indicators: OnceCell::new(),
        })
    }

    fn company_url(&self, code: u32) -> Result<String, url::ParseError> {
        let url = Url::parse_with_params(&self.company_base, &[("companySymbol", code.to_string())])?;
        Ok(url.to_string())
    }

    /// Fetch-once accessor for the indicators table.
    async fn indicators_table(&self) -> Option<&IndicatorsTable> {
        self.indicators
            .get_or_init(|| async {
                match indicators::fetch(&self.client, &self.indicators_url).await {
                    Ok(table) => {
                        info!(
                            "market indicators: {} stocks across {} industry groups",
                            table.stocks.len(),
                            table.industry_groups.len()
                        );
                        Some(table)
                    }
                    Err(e) => {
                        error!("market indicators fetch failed: {e}");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    /// The dividends table is rendered after the rest of the page on some
    /// company profiles. Re-fetch at a fixed interval until it shows up or
    /// the deadline passes.
    async fn poll_dividends(&self, url: &str, code: u32) -> Option<Vec<crate::models::Dividend>> {
        let deadline = Instant::now() + self.dividends_timeout;
        while Instant::now() < deadline {
            sleep(self.dividends_poll).await;
            match self.client.get_text(url).await {
                Ok(html) => {
                    if let Some(dividends) = extract::dividends_from_page(&html, code) {
                        return Some(dividends);
                    }
                    debug!("stock {code}: dividends table not rendered yet");
                }
                Err(e) => warn!("stock {code}: dividends re-fetch failed: {e}"),
            }
        }
        warn!(
            "stock {code}: dividends table never appeared within {:?}",
            self.dividends_timeout
        );
        None
    }

    async fn fetch_benchmark(&self, code: u32) -> Benchmark {
        let body = json!({
            "query": self.benchmark_query,
            "variables": { "ticker": format!("SASE:{code}") },
        });
        let response = match self
            .client
            .post_json(&self.finbox_url, &body, self.cookie_header.as_deref())
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!("stock {code}: benchmark query failed: {e}");
                return Benchmark::default();
            }
        };

        match json_f64(&response, "/data/asset/stats/quote/div_yield/company") {
            Some(div_yield) => Benchmark {
                div_yield: Some(div_yield),
                ..Benchmark::default()
            },
            None => {
                warn!("stock {code}: benchmark response had no dividend yield");
                Benchmark::default()
            }
        }
    }

    async fn fetch_fair_value(&self, code: u32) -> Option<FairValue> {
        let body = json!({
            "query": self.fair_value_query,
            "variables": { "ticker": format!("SASE:{code}") },
        });
        let response = match self.client.post_json(&self.finbox_url, &body, None).await {
            Ok(v) => v,
            Err(e) => {
                warn!("stock {code}: fair value query failed: {e}");
                return None;
            }
        };

        let average = json_f64(&response, "/data/asset/fair_value/averages/price");
        let uncertainty = response
            .pointer("/data/asset/fair_value/uncertainty")
            .and_then(Value::as_str);
        match (average, uncertainty) {
            (Some(average), Some(uncertainty)) => Some(FairValue {
                average,
                uncertainty: uncertainty.to_string(),
            }),
            _ => {
                warn!("stock {code}: fair value response incomplete");
                None
            }
        }
    }

    /// Best-effort join against the indicators table on case-insensitive
    /// (name, industry group). A miss leaves the enrichment fields empty.
    async fn enrich_from_indicators(&self, stock: &mut Stock) {
        let Some(table) = self.indicators_table().await else {
            return;
        };
        let (Some(name), Some(group)) = (stock.name.clone(), stock.industry_group.clone()) else {
            debug!("stock {}: identity incomplete, skipping indicators join", stock.code);
            return;
        };
        let Some(row) = table.find(&name, &group) else {
            warn!("stock {} [{name}] not present in the indicators table", stock.code);
            return;
        };

        stock.issued_shares = row.issued_shares;
        stock.net_profit = row.net_profit;
        stock.shareholders_equity = row.shareholders_equity;
        stock.market_cap = row.market_cap;
        stock.market_cap_percentage = row.market_cap_percentage;
        stock.earnings_per_share = row.earnings_per_share;
        stock.book_value_per_share = row.book_value_per_share;
        stock.benchmark.p_e = row.benchmark.p_e;
        stock.benchmark.p_b = row.benchmark.p_b;
        debug!("stock {} [{name}] enriched from indicators", stock.code);
    }
}

#[async_trait]
impl StockDataSource for TadawulScraper {
    async fn scrape_one(&self, code: u32) -> Stock {
        let mut stock = Stock::empty(code, Utc::now().naive_utc());

        let url = match self.company_url(code) {
            Ok(url) => url,
            Err(e) => {
                error!("stock {code}: bad company URL: {e}");
                return stock;
            }
        };

        // A dead page means nothing further is worth attempting.
        let html = match self.client.get_text(&url).await {
            Ok(html) => html,
            Err(e) => {
                error!("stock {code}: company page fetch failed: {e}");
                return stock;
            }
        };

        extract::apply(&html, &mut stock);
        if stock.dividends.is_none() {
            stock.dividends = self.poll_dividends(&url, code).await;
        }

        stock.benchmark = self.fetch_benchmark(code).await;
        stock.fair_value = self.fetch_fair_value(code).await;
        self.enrich_from_indicators(&mut stock).await;

        stock.success_scraping = stock.is_complete();
        if stock.success_scraping {
            info!("stock {code} [{}] scraped", stock.name.as_deref().unwrap_or("?"));
        } else {
            warn!("stock {code}: scrape incomplete");
        }
        stock
    }

    async fn scrape_list(&self, codes: &[u32]) -> Vec<Stock> {
        let mut stocks = Vec::with_capacity(codes.len());
        for (i, &code) in codes.iter().enumerate() {
            info!("scraping stock {code} ({}/{})", i + 1, codes.len());
            stocks.push(self.scrape_one(code).await);
        }
        stocks
    }

    async fn market_indicators(&self) -> Option<IndicatorsTable> {
        self.indicators_table().await.cloned()
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Read a number at a JSON pointer, accepting both numeric and string-encoded
/// values (finbox mixes the two).
fn json_f64(value: &Value, pointer: &str) -> Option<f64> {
    let v = value.pointer(pointer)?;
    v.as_f64().or_else(|| v.as_str()?.trim().parse().ok())
}
