//! Per-instrument and batch enrichment: decide whether to fetch, pull a
//! price and close series through the coordinator, compute MA results, and
//! attach a rule-engine signal when enough history exists.
//!
//! `enrich` never fails outright on a provider outage — a dead coordinator
//! run is recorded and the instrument comes back with a stale/null price,
//! exactly as §7 requires ("the pipeline never throws for partial
//! failure").

use crate::cache::Caches;
use crate::calendar::TradingCalendar;
use crate::freshness;
use crate::indicators::{self, IndicatorReport};
use crate::models::{DataSource, Group, Instrument, MaResult};
use crate::providers::coordinator::Coordinator;
use crate::rules::{self, TradingRule};
use crate::symbol;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct EnrichedInstrument {
    pub instrument_id: i64,
    pub symbol: String,
    pub display_name: String,
    pub current_price: Option<f64>,
    pub ma_results: BTreeMap<String, MaResult>,
    /// The first MA period in the instrument's `ma_spec`, surfaced
    /// separately because most callers only care about one headline number.
    pub primary: Option<(String, MaResult)>,
    pub groups: Vec<Group>,
    pub is_realtime: bool,
    pub data_fetched_at: DateTime<Utc>,
    /// `Some` iff the close series was long enough (≥20) to evaluate
    /// indicators/rules at all — distinguishes "evaluated, nothing fired"
    /// from "not enough history to evaluate".
    pub indicator_report: Option<IndicatorReport>,
    pub signal: Option<rules::RuleFireResult>,
}

pub async fn enrich(
    instrument: &Instrument,
    coordinator: &Coordinator,
    calendar: &TradingCalendar,
    caches: &Caches,
    rule_set: &[TradingRule],
    force_refresh: bool,
    need_calc: bool,
    now: DateTime<Utc>,
) -> EnrichedInstrument {
    let normalized = symbol::normalize(&instrument.symbol);
    let today = now.with_timezone(&chrono_tz::Asia::Shanghai).date_naive();

    let lookup = calendar.is_trading_day(today).await.unwrap_or_else(|_| crate::calendar::CalendarLookup {
        is_trading_day: !matches!(chrono::Datelike::weekday(&today), chrono::Weekday::Sat | chrono::Weekday::Sun),
        reason: "基础判断",
    });

    let mut decision = freshness::decide(
        normalized.market,
        lookup.is_trading_day,
        instrument.last_price,
        instrument.last_updated_at,
        need_calc,
        now,
    );
    if force_refresh {
        let in_session = freshness::is_trading_time(normalized.market, now);
        decision = freshness::FreshnessDecision {
            should_fetch: true,
            reason: "force_refresh",
            is_realtime: in_session && lookup.is_trading_day,
        };
    }

    let mut is_realtime = decision.is_realtime;
    let mut current_price = instrument.last_price;

    if decision.should_fetch {
        match coordinator.get_realtime_price(&normalized.code).await {
            Ok(fetch) => {
                current_price = Some(fetch.data.current_price);
                caches.set_price(&normalized.code, fetch.data.current_price, &fetch.data.name);
            }
            Err(e) => {
                warn!(symbol = %instrument.symbol, error = %e, "realtime price fetch failed, falling back to stored price");
            }
        }
    } else if let Some((cached_price, _name)) = caches.get_price(&normalized.code, false) {
        current_price = Some(cached_price);
    }

    if current_price.is_none() || current_price == Some(0.0) {
        if let Ok(fetch) = coordinator.get_realtime_price(&normalized.code).await {
            current_price = Some(fetch.data.current_price);
            is_realtime = is_realtime || (lookup.is_trading_day && freshness::is_trading_time(normalized.market, now));
        }
    }

    let max_period = instrument.ma_spec.iter().copied().max().unwrap_or(0);
    let today_str = today.to_string();

    let mut closes: Vec<f64> = caches
        .get_kline(&normalized.code, &today_str, max_period, is_realtime)
        .unwrap_or_default();

    if closes.is_empty() {
        if let Ok(fetch) = coordinator.get_kline_data(&normalized.code, max_period + 2).await {
            let mut bars = fetch.data;
            bars.sort_by_key(|b| b.date);
            closes = bars.iter().map(|b| b.close).filter(|c| *c > 0.0).collect();
            if !is_realtime {
                caches.set_kline(&normalized.code, &today_str, max_period, closes.clone());
            }
        }
    }

    if is_realtime {
        if let Some(price) = current_price {
            if price > 0.0 {
                closes.push(price);
            }
        }
    }

    // Step 6: realtime price missing/zero but a close series exists — fall
    // back to last close regardless of is_realtime, since the branch above
    // only appends and never recovers a bad price.
    if current_price.is_none() || current_price == Some(0.0) {
        if let Some(&last_close) = closes.last() {
            current_price = Some(last_close);
        }
    }

    let mut ma_results = BTreeMap::new();
    if let Some(price) = current_price {
        for &k in &instrument.ma_spec {
            let k = k as usize;
            if closes.len() < k {
                continue;
            }
            let window = &closes[closes.len() - k..];
            let ma_price = round2(window.iter().sum::<f64>() / k as f64);
            let reached = price >= ma_price;
            let diff = round2(price - ma_price);
            let diff_pct = if ma_price.abs() > f64::EPSILON {
                round2((price - ma_price) / ma_price * 100.0)
            } else {
                0.0
            };
            let data_source = if is_realtime { DataSource::Realtime } else { DataSource::KlineClose };
            ma_results.insert(
                format!("MA{k}"),
                MaResult { ma_price, reached, diff, diff_pct, data_source },
            );
        }
    }

    let primary = instrument
        .ma_spec
        .first()
        .and_then(|k| ma_results.get(&format!("MA{k}")).map(|r| (format!("MA{k}"), r.clone())));

    let (indicator_report, signal) = if closes.len() >= 20 {
        let report: IndicatorReport = indicators::calc_all(&closes, &closes, &closes);
        let fire = current_price.and_then(|price| rules::evaluate_all(rule_set, &closes, &closes, &closes, price, &report));
        (Some(report), fire)
    } else {
        (None, None)
    };

    EnrichedInstrument {
        instrument_id: instrument.id,
        symbol: instrument.symbol.clone(),
        display_name: instrument.display_name.clone(),
        current_price,
        ma_results,
        primary,
        groups: instrument.groups.clone(),
        is_realtime,
        data_fetched_at: now,
        indicator_report,
        signal,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Precomputes the DB-touching facts (trading-day flag, session flag) once
/// per market on the calling thread, then fans the rest out to a bounded
/// worker pool. Workers never touch the database — they only see the value
/// snapshots already materialized here.
pub async fn enrich_batch(
    instruments: &[Instrument],
    coordinator: &Coordinator,
    calendar: &TradingCalendar,
    caches: &Caches,
    rule_set: &[TradingRule],
    force_refresh: bool,
    need_calc: bool,
    pool_size: usize,
    now: DateTime<Utc>,
) -> Vec<Option<EnrichedInstrument>> {
    use futures_util::stream::{FuturesUnordered, StreamExt};

    let mut results: Vec<Option<EnrichedInstrument>> = vec![None; instruments.len()];
    let mut pending = FuturesUnordered::new();
    let mut next_index = 0usize;

    let mut submit = |idx: usize, pending: &mut FuturesUnordered<_>| {
        let instrument = instruments[idx].clone();
        let fut = async move {
            let enriched = enrich(&instrument, coordinator, calendar, caches, rule_set, force_refresh, need_calc, now).await;
            (idx, enriched)
        };
        pending.push(fut);
    };

    while next_index < instruments.len() && next_index < pool_size {
        submit(next_index, &mut pending);
        next_index += 1;
    }

    while let Some((idx, enriched)) = pending.next().await {
        results[idx] = Some(enriched);
        if next_index < instruments.len() {
            submit(next_index, &mut pending);
            next_index += 1;
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Market;
    use crate::providers::coordinator::Coordinator;
    use chrono::TimeZone;

    fn instrument(id: i64, symbol: &str, ma_spec: Vec<u32>) -> Instrument {
        Instrument {
            id,
            symbol: symbol.to_string(),
            display_name: symbol.to_string(),
            ma_spec,
            last_price: Some(10.0),
            last_updated_at: None,
            groups: Vec::new(),
        }
    }

    #[tokio::test]
    async fn enrich_batch_preserves_input_order() {
        let coordinator = Coordinator::new(Vec::new(), 0, 5);
        let db = crate::storage::Db::open_in_memory().unwrap();
        let calendar = TradingCalendar::new(db, std::sync::Arc::new(Coordinator::new(Vec::new(), 0, 5)));
        let caches = Caches::new();
        let rules = Vec::new();
        let instruments: Vec<Instrument> = (0..8).map(|i| instrument(i, &format!("60000{i}"), vec![5])).collect();
        let now = chrono_tz::Asia::Shanghai.with_ymd_and_hms(2024, 1, 8, 20, 0, 0).unwrap().with_timezone(&Utc);

        let results = enrich_batch(&instruments, &coordinator, &calendar, &caches, &rules, false, false, 3, now).await;

        assert_eq!(results.len(), 8);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.as_ref().unwrap().instrument_id, i as i64);
        }
    }

    #[tokio::test]
    async fn non_trading_day_skips_fetch_and_is_not_realtime() {
        let coordinator = Coordinator::new(Vec::new(), 0, 5);
        let db = crate::storage::Db::open_in_memory().unwrap();
        db.hydrate_year(2024, &[]).unwrap();
        let calendar = TradingCalendar::new(db, std::sync::Arc::new(Coordinator::new(Vec::new(), 0, 5)));
        let caches = Caches::new();
        let rules = Vec::new();
        let inst = instrument(1, "600000", vec![5]);
        let saturday = chrono_tz::Asia::Shanghai.with_ymd_and_hms(2024, 1, 6, 10, 0, 0).unwrap().with_timezone(&Utc);

        let enriched = enrich(&inst, &coordinator, &calendar, &caches, &rules, false, false, saturday).await;
        assert!(!enriched.is_realtime);
        let _ = Market::Cn;
    }
}
