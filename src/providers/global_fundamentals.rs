//! L6: library call-outs for overseas instruments. Best-effort per the
//! upstream design notes — its capability surface tracks an external
//! library's own version drift, so callers must not rely on it
//! unconditionally and test suites exclude it from fallback-completeness
//! assertions.

use super::health::ProviderHealth;
use super::{Capability, Provider, ProviderResult};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;

pub struct GlobalFundamentalsProvider {
    client: Client,
    health: ProviderHealth,
    capabilities: HashSet<Capability>,
    api_key: Option<String>,
}

impl GlobalFundamentalsProvider {
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        let mut capabilities = HashSet::new();
        capabilities.insert(Capability::FinancialReport);
        capabilities.insert(Capability::ValuationMetrics);
        capabilities.insert(Capability::MacroIndicators);

        GlobalFundamentalsProvider {
            client,
            health: ProviderHealth::new(),
            capabilities,
            api_key,
        }
    }
}

#[async_trait]
impl Provider for GlobalFundamentalsProvider {
    fn priority(&self) -> u32 {
        6
    }

    fn name(&self) -> &str {
        "global_fundamentals"
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    fn health(&self) -> &ProviderHealth {
        &self.health
    }

    async fn get_financial_report(&self, code: &str) -> ProviderResult<serde_json::Value> {
        if self.api_key.is_none() {
            return Err(ProviderError::UnsupportedCapability);
        }
        let url = format!("https://global-fundamentals.example.com/report/{code}");
        let resp = self.client.get(&url).send().await.map_err(|e| ProviderError::Transport(e.to_string()))?;
        resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn get_valuation_metrics(&self, code: &str) -> ProviderResult<serde_json::Value> {
        if self.api_key.is_none() {
            return Err(ProviderError::UnsupportedCapability);
        }
        let url = format!("https://global-fundamentals.example.com/valuation/{code}");
        let resp = self.client.get(&url).send().await.map_err(|e| ProviderError::Transport(e.to_string()))?;
        resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn get_macro_indicators(&self) -> ProviderResult<serde_json::Value> {
        if self.api_key.is_none() {
            return Err(ProviderError::UnsupportedCapability);
        }
        let resp = self
            .client
            .get("https://global-fundamentals.example.com/macro")
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))
    }
}
