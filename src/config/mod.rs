use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub finbox: FinboxConfig,
    pub scraper: ScraperConfig,
    pub storage: StorageConfig,
    pub portfolio: PortfolioConfig,
    pub report: ReportConfig,
}

/// Exchange pages: per-company quote pages plus the market indicators table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_indicators_url")]
    pub indicators_url: String,

    #[serde(default)]
    pub session_key: String,

    /// Tracked company codes, in scrape order.
    #[serde(default)]
    pub stocks: Vec<u32>,
}

/// Finbox GraphQL endpoint used for dividend yield and fair value.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FinboxConfig {
    #[serde(default = "default_finbox_url")]
    pub url: String,

    #[serde(default = "default_benchmark_query")]
    pub benchmark_query: String,

    #[serde(default = "default_fair_value_query")]
    pub fair_value_query: String,

    /// Session cookies sent with benchmark requests.
    #[serde(default)]
    pub cookies: HashMap<String, String>,
}

/// HTTP politeness and resilience knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// The dividends table is rendered late on some pages; poll for it at
    /// this interval until the timeout below.
    #[serde(default = "default_dividends_poll_ms")]
    pub dividends_poll_ms: u64,

    #[serde(default = "default_dividends_timeout_secs")]
    pub dividends_timeout_secs: u64,
}

/// Snapshot directory and retention.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,

    /// How many most-recent calendar days of snapshots to keep.
    #[serde(default = "default_keep_last")]
    pub keep_last: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortfolioConfig {
    #[serde(default = "default_portfolio_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_dir")]
    pub dir: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://www.saudiexchange.sa/wps/portal/saudiexchange".to_string()
}
fn default_indicators_url() -> String {
    "https://www.saudiexchange.sa/wps/portal/saudiexchange/market-participants/issuer-financial-indicators".to_string()
}
fn default_finbox_url() -> String {
    "https://finbox.com/_/api".to_string()
}
fn default_benchmark_query() -> String {
    "query($ticker: String!) { asset(ticker: $ticker) { stats { quote { div_yield { company } } } } }"
        .to_string()
}
fn default_fair_value_query() -> String {
    "query($ticker: String!) { asset(ticker: $ticker) { fair_value { averages { price } uncertainty } } }"
        .to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    1500
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_max_retries() -> u32 {
    3
}
fn default_user_agent() -> String {
    "tadawul-tracker/0.1 (personal portfolio research)".to_string()
}
fn default_dividends_poll_ms() -> u64 {
    2000
}
fn default_dividends_timeout_secs() -> u64 {
    20
}
fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("data/snapshots")
}
fn default_keep_last() -> usize {
    14
}
fn default_portfolio_path() -> PathBuf {
    PathBuf::from("data/portfolio.csv")
}
fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("TDWL").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig {
                base_url: default_base_url(),
                indicators_url: default_indicators_url(),
                session_key: String::new(),
                stocks: Vec::new(),
            },
            finbox: FinboxConfig {
                url: default_finbox_url(),
                benchmark_query: default_benchmark_query(),
                fair_value_query: default_fair_value_query(),
                cookies: HashMap::new(),
            },
            scraper: ScraperConfig::default(),
            storage: StorageConfig {
                dir: default_snapshot_dir(),
                keep_last: default_keep_last(),
            },
            portfolio: PortfolioConfig {
                path: default_portfolio_path(),
            },
            report: ReportConfig {
                dir: default_report_dir(),
            },
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
            dividends_poll_ms: default_dividends_poll_ms(),
            dividends_timeout_secs: default_dividends_timeout_secs(),
        }
    }
}
