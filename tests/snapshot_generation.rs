//! End-to-end test of historical snapshot generation against an in-memory
//! database and a deterministic fake provider, skipping the network-backed
//! concrete providers entirely.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use stockwatch_backend::calendar::TradingCalendar;
use stockwatch_backend::cache::Caches;
use stockwatch_backend::error::ProviderError;
use stockwatch_backend::providers::coordinator::Coordinator;
use stockwatch_backend::providers::health::ProviderHealth;
use stockwatch_backend::providers::{Capability, KlineBar, Provider, ProviderResult};
use stockwatch_backend::snapshot::generate_daily_snapshots;
use stockwatch_backend::storage::Db;

struct FakeKlineProvider {
    health: ProviderHealth,
    capabilities: HashSet<Capability>,
    bars: Vec<KlineBar>,
}

impl FakeKlineProvider {
    fn new(bars: Vec<KlineBar>) -> Self {
        let mut capabilities = HashSet::new();
        capabilities.insert(Capability::KlineData);
        FakeKlineProvider { health: ProviderHealth::new(), capabilities, bars }
    }
}

#[async_trait]
impl Provider for FakeKlineProvider {
    fn priority(&self) -> u32 {
        1
    }

    fn name(&self) -> &str {
        "fake_kline"
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    fn health(&self) -> &ProviderHealth {
        &self.health
    }

    async fn get_kline_data(&self, code: &str, _days: u32) -> ProviderResult<Vec<KlineBar>> {
        if code == "sh600000" {
            Ok(self.bars.clone())
        } else {
            Err(ProviderError::DataInvalid("unknown code".into()))
        }
    }
}

fn bar(date: NaiveDate, close: f64) -> KlineBar {
    KlineBar { date, open: close, high: close, low: close, close, volume: 1_000.0 }
}

#[tokio::test]
async fn historical_snapshot_reconstructs_ma_from_kline_close() {
    let db = Db::open_in_memory().expect("open in-memory db");
    let instrument = db.create_stock("600000", "浦发银行", &[5]).expect("create stock");

    let mut bars = Vec::new();
    let mut d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    for i in 0..10 {
        bars.push(bar(d, 10.0 + i as f64));
        d = d.succ_opt().unwrap();
    }
    let target_date = bars.last().unwrap().date;

    let provider: Arc<dyn Provider> = Arc::new(FakeKlineProvider::new(bars));
    let coordinator = Arc::new(Coordinator::new(vec![provider], 0, 30));
    let calendar = TradingCalendar::new(db.clone(), coordinator.clone());
    db.hydrate_year(target_date.year(), &[target_date]).expect("hydrate calendar year");
    let caches = Caches::new();
    let now = Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap();

    let outcome = generate_daily_snapshots(
        &db,
        std::slice::from_ref(&instrument),
        &coordinator,
        &calendar,
        &caches,
        &[],
        target_date,
        false,
        4,
        now,
    )
    .await
    .expect("generate snapshots");

    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.updated, 0);

    let stored = db.snapshots_for_date(target_date).expect("load snapshots");
    assert_eq!(stored.len(), 1);
    let ma5 = stored[0].ma_results.get("MA5").expect("MA5 present");
    // closes 15..19 averaged = 17.0
    assert!((ma5.ma_price - 17.0).abs() < 1e-9);
}

#[tokio::test]
async fn regenerating_without_force_is_idempotent() {
    let db = Db::open_in_memory().expect("open in-memory db");
    let instrument = db.create_stock("600000", "浦发银行", &[5]).expect("create stock");

    let mut bars = Vec::new();
    let mut d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    for i in 0..10 {
        bars.push(bar(d, 10.0 + i as f64));
        d = d.succ_opt().unwrap();
    }
    let target_date = bars.last().unwrap().date;

    let provider: Arc<dyn Provider> = Arc::new(FakeKlineProvider::new(bars));
    let coordinator = Arc::new(Coordinator::new(vec![provider], 0, 30));
    let calendar = TradingCalendar::new(db.clone(), coordinator.clone());
    db.hydrate_year(target_date.year(), &[target_date]).expect("hydrate calendar year");
    let caches = Caches::new();
    let now = Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap();

    let instruments = std::slice::from_ref(&instrument);
    generate_daily_snapshots(&db, instruments, &coordinator, &calendar, &caches, &[], target_date, false, 4, now)
        .await
        .expect("first generation");
    let second = generate_daily_snapshots(&db, instruments, &coordinator, &calendar, &caches, &[], target_date, false, 4, now)
        .await
        .expect("second generation");

    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 0);
}
