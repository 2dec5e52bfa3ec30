//! Uniform contract every data source satisfies, plus the shapes the
//! coordinator moves around.

pub mod coordinator;
pub mod health;
pub mod spot_cache;

pub mod cn_fundamentals;
pub mod fallback;
pub mod global_fundamentals;
pub mod primary;
pub mod secondary;
pub mod spot_bulk;

use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use health::ProviderHealth;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    RealtimePrice,
    KlineData,
    FinancialReport,
    ValuationMetrics,
    MacroIndicators,
}

/// Canonical shape every provider normalizes its output into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockData {
    pub code: String,
    pub name: String,
    pub current_price: f64,
    pub open: Option<f64>,
    pub prev_close: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
    pub turnover: Option<f64>,
    pub provider_name: String,
}

impl StockData {
    /// A provider result is only usable once price and name both look sane.
    pub fn is_valid(&self) -> bool {
        self.current_price > 0.0 && !self.name.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KlineBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Every `Provider` method returns this instead of a bare `Result`, so the
/// coordinator can tell "failed" apart from "doesn't implement this" without
/// inspecting error variants.
pub type ProviderResult<T> = Result<T, ProviderError>;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable ascending priority; lower is tried earlier. Priorities are
    /// total across the provider set (invariant I5).
    fn priority(&self) -> u32;
    fn name(&self) -> &str;
    fn capabilities(&self) -> &HashSet<Capability>;
    fn health(&self) -> &ProviderHealth;

    fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.health().is_available(now)
    }

    fn declares(&self, cap: Capability) -> bool {
        self.capabilities().contains(&cap)
    }

    async fn get_realtime_price(&self, code: &str) -> ProviderResult<StockData> {
        let _ = code;
        Err(ProviderError::UnsupportedCapability)
    }

    async fn get_kline_data(&self, code: &str, days: u32) -> ProviderResult<Vec<KlineBar>> {
        let _ = (code, days);
        Err(ProviderError::UnsupportedCapability)
    }

    async fn get_stock_name(&self, code: &str) -> ProviderResult<String> {
        let _ = code;
        Err(ProviderError::UnsupportedCapability)
    }

    async fn get_financial_report(&self, code: &str) -> ProviderResult<serde_json::Value> {
        let _ = code;
        Err(ProviderError::UnsupportedCapability)
    }

    async fn get_valuation_metrics(&self, code: &str) -> ProviderResult<serde_json::Value> {
        let _ = code;
        Err(ProviderError::UnsupportedCapability)
    }

    async fn get_macro_indicators(&self) -> ProviderResult<serde_json::Value> {
        Err(ProviderError::UnsupportedCapability)
    }

    /// Trading dates for a calendar year, used by C7 hydration. Only L5-class
    /// providers implement this meaningfully.
    async fn get_trading_dates(&self, year: i32) -> ProviderResult<Vec<NaiveDate>> {
        let _ = year;
        Err(ProviderError::UnsupportedCapability)
    }
}

/// What the coordinator hands back for any capability call: first win wins,
/// and the list of providers consulted along the way is always retained for
/// diagnostics, win or lose.
#[derive(Debug, Clone)]
pub struct FetchResult<T> {
    pub data: T,
    pub provider_name: String,
    pub tried_providers: Vec<String>,
}
