//! Daily snapshot generation: historical dates reconstruct MA from a
//! k-line close series, `target_date == today` delegates to the enrichment
//! batch path. Idempotent when `force=false` (P7).

use crate::cache::Caches;
use crate::calendar::TradingCalendar;
use crate::enrichment;
use crate::models::{DataSource, Instrument, MaResult, Signal, SignalKind, Snapshot};
use crate::providers::coordinator::Coordinator;
use crate::rules::{RuleKind, TradingRule};
use crate::storage::snapshots::UpsertOutcome;
use crate::storage::Db;
use crate::symbol;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::warn;

pub struct GenerationOutcome {
    pub created: usize,
    pub updated: usize,
    pub message: String,
}

pub async fn generate_daily_snapshots(
    db: &Db,
    instruments: &[Instrument],
    coordinator: &Coordinator,
    calendar: &TradingCalendar,
    caches: &Caches,
    rule_set: &[TradingRule],
    target_date: NaiveDate,
    force: bool,
    pool_size: usize,
    now: DateTime<Utc>,
) -> anyhow::Result<GenerationOutcome> {
    let today = now.with_timezone(&chrono_tz::Asia::Shanghai).date_naive();
    let mut created = 0usize;
    let mut updated = 0usize;

    if target_date == today {
        let enriched = enrichment::enrich_batch(
            instruments,
            coordinator,
            calendar,
            caches,
            rule_set,
            true,
            false,
            pool_size.max(1),
            now,
        )
        .await;

        for item in enriched.into_iter().flatten() {
            if let Some(report) = &item.indicator_report {
                let signal = signal_from_fire(item.instrument_id, target_date, item.signal.as_ref(), report);
                if let Err(e) = db.insert_signal(&signal) {
                    warn!(instrument_id = item.instrument_id, error = %e, "failed to persist signal");
                }
            }

            let Some(price) = item.current_price else { continue };
            let snapshot = Snapshot { instrument_id: item.instrument_id, date: target_date, price, ma_results: item.ma_results };
            match db.upsert_snapshot(&snapshot, force)? {
                UpsertOutcome::Created => created += 1,
                UpsertOutcome::Updated => updated += 1,
                UpsertOutcome::Skipped => {}
            }
        }
    } else {
        for instrument in instruments {
            match historical_snapshot(instrument, coordinator, target_date).await {
                Ok(Some(snapshot)) => match db.upsert_snapshot(&snapshot, force)? {
                    UpsertOutcome::Created => created += 1,
                    UpsertOutcome::Updated => updated += 1,
                    UpsertOutcome::Skipped => {}
                },
                Ok(None) => {}
                Err(e) => warn!(symbol = %instrument.symbol, error = %e, "historical snapshot fetch failed"),
            }
        }
    }

    Ok(GenerationOutcome {
        created,
        updated,
        message: format!("generated snapshots for {target_date}: {created} created, {updated} updated"),
    })
}

async fn historical_snapshot(
    instrument: &Instrument,
    coordinator: &Coordinator,
    target_date: NaiveDate,
) -> anyhow::Result<Option<Snapshot>> {
    let normalized = symbol::normalize(&instrument.symbol);
    let max_period = instrument.ma_spec.iter().copied().max().unwrap_or(0);
    // Pull enough history to both locate target_date's close and compute
    // the widest requested MA as of that date.
    let lookback_days = max_period + 90;

    let fetch = match coordinator.get_kline_data(&normalized.code, lookback_days).await {
        Ok(f) => f,
        Err(_) => return Ok(None),
    };

    let mut bars = fetch.data;
    bars.sort_by_key(|b| b.date);

    let Some(target_idx) = bars.iter().position(|b| b.date == target_date) else {
        return Ok(None);
    };

    let closes_up_to_target: Vec<f64> = bars[..=target_idx].iter().map(|b| b.close).filter(|c| *c > 0.0).collect();
    let price = bars[target_idx].close;

    let mut ma_results = BTreeMap::new();
    for &k in &instrument.ma_spec {
        let k = k as usize;
        if closes_up_to_target.len() < k {
            continue;
        }
        let window = &closes_up_to_target[closes_up_to_target.len() - k..];
        let ma_price = round2(window.iter().sum::<f64>() / k as f64);
        let diff = round2(price - ma_price);
        let diff_pct = if ma_price.abs() > f64::EPSILON { round2(diff / ma_price * 100.0) } else { 0.0 };
        ma_results.insert(
            format!("MA{k}"),
            MaResult { ma_price, reached: price >= ma_price, diff, diff_pct, data_source: DataSource::KlineClose },
        );
    }

    if ma_results.is_empty() {
        return Ok(None);
    }

    Ok(Some(Snapshot { instrument_id: instrument.id, date: target_date, price, ma_results }))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Maps a rule-engine result onto the append-only `Signal` row: a firing
/// rule becomes `buy`/`sell`, nothing firing becomes `hold` with strength 0
/// (spec's "if no rule fires, emit hold with strength 0").
fn signal_from_fire(
    instrument_id: i64,
    signal_date: NaiveDate,
    fire: Option<&crate::rules::RuleFireResult>,
    report: &crate::indicators::IndicatorReport,
) -> Signal {
    let indicators = serde_json::to_value(report).unwrap_or(serde_json::Value::Null);
    match fire {
        Some(f) => Signal {
            instrument_id,
            signal_date,
            kind: match f.kind {
                RuleKind::Buy => SignalKind::Buy,
                RuleKind::Sell => SignalKind::Sell,
            },
            strength: f.strength,
            entry_price: Some(f.entry_price),
            stop_loss: f.stop_loss,
            take_profit: f.take_profit,
            triggers: f.triggers.clone(),
            indicators,
            message: f.message.clone(),
        },
        None => Signal {
            instrument_id,
            signal_date,
            kind: SignalKind::Hold,
            strength: 0,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            triggers: Vec::new(),
            indicators,
            message: String::new(),
        },
    }
}
