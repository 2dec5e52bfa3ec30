//! One-off operator commands: cache clear, calendar refresh, manual snapshot
//! generation. Shares its provider/coordinator wiring with `stockwatch`
//! itself rather than re-implementing it.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use stockwatch_backend::cache::Caches;
use stockwatch_backend::calendar::TradingCalendar;
use stockwatch_backend::config::Config;
use stockwatch_backend::providers::coordinator::Coordinator;
use stockwatch_backend::providers::spot_cache::SpotCache;
use stockwatch_backend::providers::{
    cn_fundamentals::CnFundamentalsProvider, fallback::FallbackProvider,
    global_fundamentals::GlobalFundamentalsProvider, primary::PrimaryProvider,
    secondary::SecondaryProvider, spot_bulk::SpotBulkProvider, Provider,
};
use stockwatch_backend::snapshot;
use stockwatch_backend::storage::stocks::StockFilter;
use stockwatch_backend::storage::Db;

#[derive(Parser)]
#[command(name = "stockwatch-cli", about = "Operator commands for the stockwatch backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drain every TTL cache and report how many entries each held.
    ClearCache,
    /// Fetch and persist a calendar year's trading dates.
    RefreshCalendar {
        #[arg(long)]
        year: i32,
    },
    /// Run snapshot generation for a single date.
    GenerateSnapshots {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn build_coordinator(config: &Config) -> Coordinator {
    let spot_cache = Arc::new(SpotCache::new());
    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(PrimaryProvider::new()),
        Arc::new(SpotBulkProvider::new(spot_cache)),
        Arc::new(SecondaryProvider::new()),
        Arc::new(FallbackProvider::new()),
        Arc::new(CnFundamentalsProvider::new(config.l5_api_key.clone())),
        Arc::new(GlobalFundamentalsProvider::new(config.l6_api_key.clone())),
    ];
    Coordinator::new(providers, config.rate_limit_ms, config.cooldown_minutes)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env().context("loading configuration")?;
    let db = Db::open(&config.database_path).context("opening database")?;

    match cli.command {
        Command::ClearCache => {
            let caches = Caches::new();
            let counts = caches.clear_all_caches();
            for (name, count) in counts {
                println!("{name}: {count} entries cleared");
            }
        }
        Command::RefreshCalendar { year } => {
            let coordinator = build_coordinator(&config);
            let fetch = coordinator.get_trading_dates(year).await.context("fetching trading dates")?;
            db.hydrate_year(year, &fetch.data).context("persisting calendar year")?;
            println!("{year}: {} trading days hydrated from {}", fetch.data.len(), fetch.provider_name);
        }
        Command::GenerateSnapshots { date, force } => {
            let coordinator = Arc::new(build_coordinator(&config));
            let calendar = TradingCalendar::new(db.clone(), coordinator.clone());
            let caches = Caches::new();
            let rules = db.list_rules().context("loading trading rules")?;
            let mut instruments = db.list(&StockFilter::default()).context("loading instruments")?;
            for instrument in &mut instruments {
                instrument.groups = db.groups_for_stock(instrument.id).unwrap_or_default();
            }

            let outcome = snapshot::generate_daily_snapshots(
                &db,
                &instruments,
                &coordinator,
                &calendar,
                &caches,
                &rules,
                date,
                force,
                config.batch_pool_size,
                chrono::Utc::now(),
            )
            .await
            .context("generating snapshots")?;

            println!("{}", outcome.message);
        }
    }

    Ok(())
}
