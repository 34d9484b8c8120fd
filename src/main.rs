mod config;
mod models;
mod pipeline;
mod portfolio;
mod report;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::storage::SnapshotStore;

#[derive(Parser)]
#[command(name = "tadawul-tracker", about = "Tadawul portfolio tracker", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Full daily run: acquire, merge portfolio, persist, render reports
    Run,

    /// Acquire and persist today's snapshot, skipping portfolio and reports
    Acquire,

    /// Print a stored snapshot (defaults to the newest one)
    Show {
        /// Snapshot date, YYYY-MM-DD
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Apply snapshot retention without acquiring anything
    Prune,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "tadawul_tracker=info,warn",
        1 => "tadawul_tracker=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Run => {
            let _t = utils::Timer::start("Daily run");
            let stats = Pipeline::new(config)?.run().await?;
            info!(
                "Done: {} tracked | {} reused | {} scraped | {} failed | all_success: {}",
                stats.tracked, stats.reused, stats.scraped, stats.failed, stats.all_success
            );
        }

        Command::Acquire => {
            let _t = utils::Timer::start("Acquisition");
            let tracked = config.source.stocks.clone();
            let pipeline = Pipeline::new(config)?;
            let removed = pipeline.store().prune(Local::now().date_naive())?;
            if removed > 0 {
                info!("retention: removed {removed} old snapshots");
            }
            let snapshot = pipeline.acquire(&tracked).await;
            let snapshot = pipeline.store().store(&snapshot)?;
            info!(
                "Done: {} stocks acquired for {} (all_success: {})",
                snapshot.stocks.len(),
                snapshot.date,
                snapshot.all_success
            );
        }

        Command::Show { date } => {
            let store = SnapshotStore::open(&config.storage)?;
            let date = match date.or(store.list_dates()?.last().copied()) {
                Some(date) => date,
                None => {
                    println!("No snapshots yet — run `tadawul-tracker run` first.");
                    return Ok(());
                }
            };
            let Some(snapshot) = store.load(date) else {
                println!("No snapshot stored for {date}.");
                return Ok(());
            };

            println!("─────────────────────────────────────────────────────");
            println!("  Snapshot {}  (all_success: {})", snapshot.date, snapshot.all_success);
            println!("─────────────────────────────────────────────────────");
            for stock in &snapshot.stocks {
                println!(
                    "  {:<6} {:<28} {:>10}  cap {:>14}  {}",
                    stock.code,
                    stock.name.as_deref().unwrap_or("?"),
                    utils::fmt_price(stock.price),
                    stock
                        .market_cap
                        .map(|c| utils::fmt_number(c as i64))
                        .unwrap_or_else(|| "—".to_string()),
                    if stock.success_scraping { "ok" } else { "FAILED" },
                );
            }
            println!("─────────────────────────────────────────────────────");
        }

        Command::Prune => {
            let store = SnapshotStore::open(&config.storage)?;
            let removed = store.prune(Local::now().date_naive())?;
            println!("Retention applied: {removed} snapshots removed.");
        }
    }

    Ok(())
}
