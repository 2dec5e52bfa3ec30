//! L2: reads from the shared spot cache (C4) rather than hitting the
//! network per-symbol. Supports realtime price and valuation metrics
//! derivable straight from the bulk snapshot's columns.

use super::health::ProviderHealth;
use super::spot_cache::SpotCache;
use super::{Capability, Provider, ProviderResult, StockData};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub struct SpotBulkProvider {
    client: Client,
    health: ProviderHealth,
    capabilities: HashSet<Capability>,
    cache: Arc<SpotCache>,
}

impl SpotBulkProvider {
    pub fn new(cache: Arc<SpotCache>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        let mut capabilities = HashSet::new();
        capabilities.insert(Capability::RealtimePrice);
        capabilities.insert(Capability::ValuationMetrics);

        SpotBulkProvider {
            client,
            health: ProviderHealth::new(),
            capabilities,
            cache,
        }
    }

    async fn fetch_bulk_snapshot(&self) -> anyhow::Result<Vec<StockData>> {
        let resp = self
            .client
            .get("https://push2.example.com/api/qt/clist/get?pn=1&pz=6000")
            .send()
            .await?
            .text()
            .await?;
        parse_bulk_snapshot(&resp)
    }
}

fn parse_bulk_snapshot(body: &str) -> anyhow::Result<Vec<StockData>> {
    #[derive(serde::Deserialize)]
    struct Row {
        f12: String,
        f14: String,
        f2: f64,
    }
    #[derive(serde::Deserialize)]
    struct Data {
        diff: Vec<Row>,
    }
    #[derive(serde::Deserialize)]
    struct Envelope {
        data: Option<Data>,
    }

    let env: Envelope = serde_json::from_str(body)?;
    let rows = env.data.map(|d| d.diff).unwrap_or_default();
    Ok(rows
        .into_iter()
        .map(|r| StockData {
            code: r.f12,
            name: r.f14,
            current_price: r.f2,
            open: None,
            prev_close: None,
            high: None,
            low: None,
            volume: None,
            turnover: None,
            provider_name: "spot_bulk".to_string(),
        })
        .collect())
}

#[async_trait]
impl Provider for SpotBulkProvider {
    fn priority(&self) -> u32 {
        2
    }

    fn name(&self) -> &str {
        "spot_bulk"
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    fn health(&self) -> &ProviderHealth {
        &self.health
    }

    async fn get_realtime_price(&self, code: &str) -> ProviderResult<StockData> {
        let now = chrono::Utc::now();
        let snapshot = self
            .cache
            .get_or_fetch("spot_bulk", now, || self.fetch_bulk_snapshot())
            .await
            .ok_or_else(|| ProviderError::Transport("bulk snapshot unavailable".into()))?;

        let stripped = code.trim_start_matches(['s', 'h', 'z', 'b', 'j']);
        snapshot
            .iter()
            .find(|row| row.code == code || row.code == stripped)
            .cloned()
            .ok_or_else(|| ProviderError::DataInvalid(format!("{code} not in bulk snapshot")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bulk_envelope() {
        let body = r#"{"data":{"diff":[{"f12":"600000","f14":"浦发银行","f2":7.15}]}}"#;
        let rows = parse_bulk_snapshot(body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code, "600000");
    }
}
