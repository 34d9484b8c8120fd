//! Daily acquisition pipeline: decides, per tracked stock, whether today's
//! cached snapshot is still good or the company page must be scraped again,
//! then persists the day's snapshot and renders the reports.
//!
//! ## Reuse rules
//!
//! Given today's cached snapshot:
//!   - no snapshot yet: scrape every tracked code;
//!   - snapshot present: reuse each cached stock whose own scrape succeeded,
//!     re-scrape stocks that failed last time or are not in the snapshot
//!     (codes tracked since it was written included).
//!
//! Re-running on a day whose snapshot is fully successful therefore costs
//! zero network calls; a partially failed day costs one page per repair.

use crate::config::AppConfig;
use crate::models::{Snapshot, Stock};
use crate::portfolio;
use crate::report::ReportWriter;
use crate::scraper::{StockDataSource, TadawulScraper};
use crate::storage::SnapshotStore;
use anyhow::{Context, Result};
use chrono::Local;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct Pipeline {
    config: AppConfig,
    source: Arc<dyn StockDataSource>,
    store: SnapshotStore,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Result<Self> {
        let source =
            Arc::new(TadawulScraper::new(&config).context("Failed to build scraper")?);
        Self::with_source(config, source)
    }

    /// Swap in a synthetic data source; the store and reuse logic are
    /// unchanged. This is how the tests drive the pipeline offline.
    pub fn with_source(config: AppConfig, source: Arc<dyn StockDataSource>) -> Result<Self> {
        let store = SnapshotStore::open(&config.storage)?;
        Ok(Self { config, source, store })
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Assemble today's snapshot, reusing cached stocks wherever possible.
    /// The result is not persisted here; that is the caller's next step.
    pub async fn acquire(&self, tracked: &[u32]) -> Snapshot {
        let (stocks, reused, scraped) = self.gather(tracked).await;
        info!("acquisition done: {reused} reused, {scraped} scraped");
        Snapshot::assemble(Local::now().date_naive(), stocks)
    }

    async fn gather(&self, tracked: &[u32]) -> (Vec<Stock>, usize, usize) {
        let today = Local::now().date_naive();

        let Some(cached) = self.store.load(today) else {
            info!("no snapshot for {today}; scraping all {} stocks", tracked.len());
            let stocks = self.source.scrape_list(tracked).await;
            let scraped = stocks.len();
            return (stocks, 0, scraped);
        };

        info!(
            "snapshot for {today} found (all_success: {}); reconciling {} tracked stocks",
            cached.all_success,
            tracked.len()
        );

        let mut stocks = Vec::with_capacity(tracked.len());
        let mut reused = 0;
        let mut scraped = 0;
        for &code in tracked {
            match cached.find(code).filter(|s| s.success_scraping) {
                Some(stock) => {
                    reused += 1;
                    stocks.push(stock.clone());
                }
                None => {
                    scraped += 1;
                    stocks.push(self.source.scrape_one(code).await);
                }
            }
        }
        (stocks, reused, scraped)
    }

    /// The full daily run: retention sweep, acquisition, portfolio merge,
    /// persistence, reports. Nothing past acquisition is allowed to sink the
    /// run; failures are logged and the in-memory snapshot stays
    /// authoritative.
    pub async fn run(&self) -> Result<RunStats> {
        let tracked = self.config.source.stocks.clone();
        if tracked.is_empty() {
            warn!("no stocks configured; nothing to acquire");
        }

        match self.store.prune(Local::now().date_naive()) {
            Ok(0) => {}
            Ok(n) => info!("retention: removed {n} old snapshots"),
            Err(e) => warn!("retention sweep failed: {e:#}"),
        }

        let (stocks, reused, scraped) = self.gather(&tracked).await;
        let mut snapshot = Snapshot::assemble(Local::now().date_naive(), stocks);

        match portfolio::load_positions(&self.config.portfolio.path) {
            Some(positions) => portfolio::merge(&mut snapshot, &positions),
            None => warn!("portfolio statement unavailable; holdings left empty"),
        }

        let snapshot = match self.store.store(&snapshot) {
            Ok(stored) => stored,
            Err(e) => {
                error!("failed to persist snapshot: {e:#}");
                snapshot
            }
        };

        match ReportWriter::new(&self.config.report) {
            Ok(reports) => {
                if let Err(e) = reports.write_stocks_analysis(&snapshot) {
                    error!("stocks analysis failed: {e:#}");
                }
                match self.source.market_indicators().await {
                    Some(table) => {
                        if let Err(e) = reports.write_market_analysis(&table) {
                            error!("market analysis failed: {e:#}");
                        }
                    }
                    None => warn!("market indicators unavailable; market analysis skipped"),
                }
            }
            Err(e) => error!("report directory unavailable: {e:#}"),
        }

        let failed = snapshot.stocks.iter().filter(|s| !s.success_scraping).count();
        Ok(RunStats {
            tracked: tracked.len(),
            reused,
            scraped,
            failed,
            all_success: snapshot.all_success,
        })
    }
}

#[derive(Debug)]
pub struct RunStats {
    pub tracked: usize,
    pub reused: usize,
    pub scraped: usize,
    pub failed: usize,
    pub all_success: bool,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
