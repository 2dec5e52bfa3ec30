//! Core data model shared across providers, the indicator/rule engines, and
//! the snapshot/report generator.

use crate::config::Market;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A monitored instrument. Mutated by the enrichment pipeline (price,
/// timestamp) and by the operator (name, ma_spec, group membership).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub id: i64,
    pub symbol: String,
    pub display_name: String,
    /// Ordered MA periods to track; always non-empty (invariant I1).
    pub ma_spec: Vec<u32>,
    pub last_price: Option<f64>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

/// Where a snapshot's per-MA datum came from: a same-day realtime fetch, or
/// a historical close reconstructed from k-line data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Realtime,
    KlineClose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaResult {
    pub ma_price: f64,
    pub reached: bool,
    pub diff: f64,
    pub diff_pct: f64,
    pub data_source: DataSource,
}

/// A persisted per-instrument, per-day record. At most one per
/// (instrument_id, date) — invariant I2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub instrument_id: i64,
    pub date: NaiveDate,
    pub price: f64,
    /// Keyed `MA{k}`; keys are a subset of the instrument's ma_spec at
    /// snapshot time (invariant I3).
    pub ma_results: BTreeMap<String, MaResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub date: NaiveDate,
    pub is_trading_day: bool,
    pub year: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub instrument_id: i64,
    pub signal_date: NaiveDate,
    pub kind: SignalKind,
    pub strength: u8,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub triggers: Vec<String>,
    pub indicators: serde_json::Value,
    pub message: String,
}

pub fn normalized_market_of(market: Market) -> &'static str {
    match market {
        Market::Cn => "cn",
        Market::Us => "us",
    }
}
