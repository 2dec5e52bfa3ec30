//! L3: delimited text quote provider. No k-line support.

use super::health::ProviderHealth;
use super::{Capability, Provider, ProviderResult, StockData};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::time::Duration;

pub struct SecondaryProvider {
    client: Client,
    health: ProviderHealth,
    capabilities: HashSet<Capability>,
}

impl SecondaryProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        let mut capabilities = HashSet::new();
        capabilities.insert(Capability::RealtimePrice);

        SecondaryProvider {
            client,
            health: ProviderHealth::new(),
            capabilities,
        }
    }

    fn quote_url(code: &str) -> String {
        format!("https://web.ifzq.gtimg.cn/appstock/app/fqkline/get?param={code}")
    }

    /// `v_code="1~name~code~current~prev_close~open~...";`
    fn parse_quote(body: &str, code: &str) -> ProviderResult<StockData> {
        let start = body.find('"').ok_or_else(|| ProviderError::Parse("no quote".into()))? + 1;
        let end = body.rfind('"').ok_or_else(|| ProviderError::Parse("no quote".into()))?;
        if end <= start {
            return Err(ProviderError::Parse("empty quote".into()));
        }
        let fields: Vec<&str> = body[start..end].split('~').collect();
        if fields.len() < 6 {
            return Err(ProviderError::Parse("too few fields".into()));
        }
        let current = fields[3]
            .parse::<f64>()
            .map_err(|_| ProviderError::Parse("bad price".into()))?;

        Ok(StockData {
            code: code.to_string(),
            name: fields[1].to_string(),
            current_price: current,
            open: fields[5].parse().ok(),
            prev_close: fields[4].parse().ok(),
            high: None,
            low: None,
            volume: None,
            turnover: None,
            provider_name: "secondary".to_string(),
        })
    }
}

#[async_trait]
impl Provider for SecondaryProvider {
    fn priority(&self) -> u32 {
        3
    }

    fn name(&self) -> &str {
        "secondary"
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    fn health(&self) -> &ProviderHealth {
        &self.health
    }

    async fn get_realtime_price(&self, code: &str) -> ProviderResult<StockData> {
        let url = Self::quote_url(code);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if resp.status() == StatusCode::FORBIDDEN || resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::Transport(format!("{} banned", resp.status().as_u16())));
        }
        let body = resp.text().await.map_err(|e| ProviderError::Transport(e.to_string()))?;
        Self::parse_quote(&body, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tilde_quote() {
        let body = r#"v_sh600000="1~浦发银行~600000~7.15~7.08~7.10~...";"#;
        let data = SecondaryProvider::parse_quote(body, "sh600000").unwrap();
        assert_eq!(data.name, "浦发银行");
        assert!((data.current_price - 7.15).abs() < 1e-9);
    }
}
