//! stockwatch — market data acquisition & indicator pipeline.
//!
//! Wires the six concrete providers into the coordinator, opens the
//! persistence layer, seeds the default rule set, and serves the HTTP
//! façade over axum.

mod api;
mod cache;
mod calendar;
mod config;
mod enrichment;
mod error;
mod freshness;
mod indicators;
mod middleware;
mod models;
mod providers;
mod report;
mod rules;
mod snapshot;
mod storage;
mod symbol;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::cache::Caches;
use crate::calendar::TradingCalendar;
use crate::config::Config;
use crate::providers::coordinator::Coordinator;
use crate::providers::spot_cache::SpotCache;
use crate::providers::{
    cn_fundamentals::CnFundamentalsProvider, fallback::FallbackProvider,
    global_fundamentals::GlobalFundamentalsProvider, primary::PrimaryProvider,
    secondary::SecondaryProvider, spot_bulk::SpotBulkProvider, Provider,
};
use crate::storage::Db;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("loading configuration")?;
    info!(database_path = %config.database_path, port = config.port, "starting stockwatch");

    let db = Db::open(&config.database_path).context("opening database")?;
    db.seed_default_rules_if_empty().context("seeding default trading rules")?;

    let spot_cache = Arc::new(SpotCache::new());

    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(PrimaryProvider::new()),
        Arc::new(SpotBulkProvider::new(spot_cache.clone())),
        Arc::new(SecondaryProvider::new()),
        Arc::new(FallbackProvider::new()),
        Arc::new(CnFundamentalsProvider::new(config.l5_api_key.clone())),
        Arc::new(GlobalFundamentalsProvider::new(config.l6_api_key.clone())),
    ];

    let coordinator = Arc::new(Coordinator::new(providers, config.rate_limit_ms, config.cooldown_minutes));
    let calendar = Arc::new(TradingCalendar::new(db.clone(), coordinator.clone()));
    let caches = Arc::new(Caches::new());

    let state = AppState {
        db,
        coordinator,
        calendar,
        caches,
        batch_pool_size: config.batch_pool_size,
    };

    let app = api::build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    info!(%addr, "stockwatch listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockwatch_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
