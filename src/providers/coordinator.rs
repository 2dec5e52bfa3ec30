//! Ordered fan-through across providers with rate limiting and
//! per-capability dispatch. Mirrors `DataSourceCoordinator` in the upstream
//! provider layer: strictly sequential by ascending priority, first valid
//! result wins, never aggregates.

use super::{Capability, KlineBar, Provider, ProviderResult, StockData};
use crate::error::ProviderError;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub struct Coordinator {
    providers: Vec<Arc<dyn Provider>>,
    last_call: Mutex<Option<Instant>>,
    rate_limit: Duration,
    cooldown_minutes: i64,
}

impl Coordinator {
    pub fn new(mut providers: Vec<Arc<dyn Provider>>, rate_limit_ms: u64, cooldown_minutes: i64) -> Self {
        providers.sort_by_key(|p| p.priority());
        Coordinator {
            providers,
            last_call: Mutex::new(None),
            rate_limit: Duration::from_millis(rate_limit_ms),
            cooldown_minutes,
        }
    }

    async fn wait_for_rate_limit(&self) {
        let wait = {
            let mut last = self.last_call.lock();
            let now = Instant::now();
            let wait = match *last {
                Some(prev) if now.duration_since(prev) < self.rate_limit => {
                    Some(self.rate_limit - now.duration_since(prev))
                }
                _ => None,
            };
            *last = Some(now);
            wait
        };
        if let Some(wait) = wait {
            tokio::time::sleep(wait).await;
        }
    }

    fn capable_providers(&self, cap: Capability) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.iter().filter(move |p| p.declares(cap))
    }

    fn record_outcome(&self, provider: &Arc<dyn Provider>, outcome: &ProviderResult<bool>) {
        let now = Utc::now();
        match outcome {
            Ok(true) => provider.health().record_success(now),
            Ok(false) | Err(ProviderError::DataInvalid(_)) => {
                provider.health().record_failure(now, self.cooldown_minutes)
            }
            Err(e) if e.is_ban() => provider.health().mark_banned(now, self.cooldown_minutes),
            Err(ProviderError::UnsupportedCapability) => {}
            Err(_) => provider.health().record_failure(now, self.cooldown_minutes),
        }
    }

    /// Generic fallback loop shared by every capability method: try each
    /// capable, available provider in priority order; first valid result
    /// wins; failures are recorded and folded into `tried_providers`.
    async fn dispatch<T, F, Fut>(&self, cap: Capability, mut call: F) -> Result<super::FetchResult<T>, crate::error::CoordinatorError>
    where
        F: FnMut(Arc<dyn Provider>) -> Fut,
        Fut: std::future::Future<Output = ProviderResult<T>>,
        T: ValidatableResult,
    {
        self.wait_for_rate_limit().await;
        let now = Utc::now();
        let mut tried = Vec::new();

        for provider in self.capable_providers(cap) {
            if !provider.is_available(now) {
                continue;
            }
            tried.push(provider.name().to_string());
            match call(provider.clone()).await {
                Ok(data) if data.is_valid() => {
                    self.record_outcome(provider, &Ok(true));
                    info!(provider = %provider.name(), ?cap, "provider call succeeded");
                    return Ok(super::FetchResult {
                        data,
                        provider_name: provider.name().to_string(),
                        tried_providers: tried,
                    });
                }
                Ok(_) => {
                    self.record_outcome(provider, &Ok(false));
                    warn!(provider = %provider.name(), "provider returned invalid data");
                }
                Err(ProviderError::UnsupportedCapability) => {
                    tried.pop();
                }
                Err(e) => {
                    self.record_outcome(provider, &Err(e.clone()));
                    warn!(provider = %provider.name(), error = %e, "provider call failed");
                }
            }
        }

        Err(crate::error::CoordinatorError::AllProvidersFailed {
            symbol: String::new(),
            tried,
        })
    }

    pub async fn get_realtime_price(
        &self,
        code: &str,
    ) -> Result<super::FetchResult<StockData>, crate::error::CoordinatorError> {
        let code = code.to_string();
        self.dispatch(Capability::RealtimePrice, move |p| {
            let code = code.clone();
            async move { p.get_realtime_price(&code).await }
        })
        .await
        .map_err(|e| match e {
            crate::error::CoordinatorError::AllProvidersFailed { tried, .. } => {
                crate::error::CoordinatorError::AllProvidersFailed {
                    symbol: String::new(),
                    tried,
                }
            }
        })
    }

    pub async fn get_kline_data(
        &self,
        code: &str,
        days: u32,
    ) -> Result<super::FetchResult<Vec<KlineBar>>, crate::error::CoordinatorError> {
        let code = code.to_string();
        self.dispatch(Capability::KlineData, move |p| {
            let code = code.clone();
            async move { p.get_kline_data(&code, days).await }
        })
        .await
    }

    pub async fn get_stock_name(
        &self,
        code: &str,
    ) -> Result<super::FetchResult<String>, crate::error::CoordinatorError> {
        let code = code.to_string();
        self.dispatch(Capability::RealtimePrice, move |p| {
            let code = code.clone();
            async move { p.get_stock_name(&code).await }
        })
        .await
    }

    pub async fn get_financial_report(
        &self,
        code: &str,
    ) -> Result<super::FetchResult<serde_json::Value>, crate::error::CoordinatorError> {
        let code = code.to_string();
        self.dispatch(Capability::FinancialReport, move |p| {
            let code = code.clone();
            async move { p.get_financial_report(&code).await }
        })
        .await
    }

    pub async fn get_valuation_metrics(
        &self,
        code: &str,
    ) -> Result<super::FetchResult<serde_json::Value>, crate::error::CoordinatorError> {
        let code = code.to_string();
        self.dispatch(Capability::ValuationMetrics, move |p| {
            let code = code.clone();
            async move { p.get_valuation_metrics(&code).await }
        })
        .await
    }

    pub async fn get_macro_indicators(
        &self,
    ) -> Result<super::FetchResult<serde_json::Value>, crate::error::CoordinatorError> {
        self.dispatch(Capability::MacroIndicators, |p| async move { p.get_macro_indicators().await })
            .await
    }

    /// Trading-date hydration doesn't fit the per-capability dispatch table
    /// (only L5-class providers implement it meaningfully), so this walks
    /// providers directly in priority order instead of going through
    /// `dispatch`.
    pub async fn get_trading_dates(
        &self,
        year: i32,
    ) -> Result<super::FetchResult<Vec<chrono::NaiveDate>>, crate::error::CoordinatorError> {
        self.wait_for_rate_limit().await;
        let now = Utc::now();
        let mut tried = Vec::new();

        for provider in &self.providers {
            if !provider.is_available(now) {
                continue;
            }
            match provider.get_trading_dates(year).await {
                Ok(dates) if !dates.is_empty() => {
                    tried.push(provider.name().to_string());
                    self.record_outcome(provider, &Ok(true));
                    return Ok(super::FetchResult {
                        data: dates,
                        provider_name: provider.name().to_string(),
                        tried_providers: tried,
                    });
                }
                Ok(_) => {
                    tried.push(provider.name().to_string());
                }
                Err(ProviderError::UnsupportedCapability) => continue,
                Err(e) => {
                    tried.push(provider.name().to_string());
                    self.record_outcome(provider, &Err(e));
                }
            }
        }

        Err(crate::error::CoordinatorError::AllProvidersFailed {
            symbol: format!("calendar:{year}"),
            tried,
        })
    }

    pub fn reset_provider(&self, name: &str) -> bool {
        if let Some(p) = self.providers.iter().find(|p| p.name() == name) {
            p.health().reset();
            true
        } else {
            false
        }
    }

    pub fn reset_all(&self) {
        for p in &self.providers {
            p.health().reset();
        }
    }

    pub fn get_capabilities(&self) -> Vec<(String, Vec<Capability>)> {
        self.providers
            .iter()
            .map(|p| (p.name().to_string(), p.capabilities().iter().copied().collect()))
            .collect()
    }

    pub fn get_health_status(&self) -> Vec<(String, super::health::HealthSnapshot)> {
        self.providers
            .iter()
            .map(|p| (p.name().to_string(), p.health().snapshot()))
            .collect()
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }
}

/// Lets `dispatch` treat "valid, non-empty data" uniformly across the
/// different capability return types without special-casing each one.
pub trait ValidatableResult {
    fn is_valid(&self) -> bool;
}

impl ValidatableResult for StockData {
    fn is_valid(&self) -> bool {
        StockData::is_valid(self)
    }
}

impl ValidatableResult for Vec<KlineBar> {
    fn is_valid(&self) -> bool {
        !self.is_empty()
    }
}

impl ValidatableResult for String {
    fn is_valid(&self) -> bool {
        !self.is_empty()
    }
}

impl ValidatableResult for Vec<chrono::NaiveDate> {
    fn is_valid(&self) -> bool {
        !self.is_empty()
    }
}

impl ValidatableResult for serde_json::Value {
    fn is_valid(&self) -> bool {
        !self.is_null()
    }
}
