//! Error taxonomy for the acquisition & indicator pipeline.
//!
//! Providers and the coordinator never propagate failures as panics or
//! aborts; they return typed errors that the caller decides how to treat.
//! Only the HTTP boundary (`src/api`) turns these into status codes.

use thiserror::Error;

/// Errors a single provider call can produce. These never escape the
/// coordinator as bare propagated errors; they're recorded against
/// `ProviderHealth` and folded into `FetchResult::tried_providers`.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid data: {0}")]
    DataInvalid(String),

    /// Distinct from a failure: the provider simply doesn't implement the
    /// capability. The coordinator skips without touching health.
    #[error("capability not supported")]
    UnsupportedCapability,
}

impl ProviderError {
    /// 403/429-class response forces immediate COOLING regardless of the
    /// provider's prior streak.
    pub fn is_ban(&self) -> bool {
        matches!(self, ProviderError::Transport(msg) if msg.contains("403") || msg.contains("429"))
    }
}

/// Errors surfaced by the coordinator across all providers.
#[derive(Debug, Error, Clone)]
pub enum CoordinatorError {
    #[error("all providers failed for {symbol}: tried {tried:?}")]
    AllProvidersFailed { symbol: String, tried: Vec<String> },
}

/// Errors from trading-calendar hydration/lookup.
#[derive(Debug, Error, Clone)]
pub enum CalendarError {
    #[error("all calendar sources unavailable")]
    AllSourcesFailed,
}

/// Errors surfaced by the enrichment pipeline and snapshot/report layer.
/// These map to HTTP status codes only at the API boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("all providers failed for {symbol}")]
    AllProvidersFailed { symbol: String, tried: Vec<String> },

    #[error("{date} is not a trading day: {reason}")]
    NonTradingDay { date: chrono::NaiveDate, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate instrument: {0}")]
    DuplicateInstrument(String),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
