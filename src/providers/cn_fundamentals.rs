//! L5: A-share fundamentals, table-joined from the fallback provider's
//! underlying data library. Also the primary source for trading-calendar
//! hydration (C7 calls `get_trading_dates` on this provider first).

use super::health::ProviderHealth;
use super::{Capability, Provider, ProviderResult};
use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;

pub struct CnFundamentalsProvider {
    client: Client,
    health: ProviderHealth,
    capabilities: HashSet<Capability>,
    api_key: Option<String>,
}

impl CnFundamentalsProvider {
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        let mut capabilities = HashSet::new();
        capabilities.insert(Capability::FinancialReport);
        capabilities.insert(Capability::ValuationMetrics);

        CnFundamentalsProvider {
            client,
            health: ProviderHealth::new(),
            capabilities,
            api_key,
        }
    }
}

#[async_trait]
impl Provider for CnFundamentalsProvider {
    fn priority(&self) -> u32 {
        5
    }

    fn name(&self) -> &str {
        "cn_fundamentals"
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    fn health(&self) -> &ProviderHealth {
        &self.health
    }

    async fn get_financial_report(&self, code: &str) -> ProviderResult<serde_json::Value> {
        let url = format!("https://fundamentals.example.com/report/{code}");
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        let resp = req.send().await.map_err(|e| ProviderError::Transport(e.to_string()))?;
        resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn get_valuation_metrics(&self, code: &str) -> ProviderResult<serde_json::Value> {
        let url = format!("https://fundamentals.example.com/valuation/{code}");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn get_trading_dates(&self, year: i32) -> ProviderResult<Vec<NaiveDate>> {
        let url = format!("https://fundamentals.example.com/calendar/{year}");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let dates: Vec<String> = resp.json().await.map_err(|e| ProviderError::Parse(e.to_string()))?;
        dates
            .into_iter()
            .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|e| ProviderError::Parse(e.to_string())))
            .collect()
    }
}
