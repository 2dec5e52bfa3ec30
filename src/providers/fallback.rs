//! L4: last-resort provider. JSONP-wrapped realtime quote and a CSV k-line
//! endpoint whose rows arrive date-descending and must be reversed.

use super::health::ProviderHealth;
use super::{Capability, KlineBar, Provider, ProviderResult, StockData};
use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::time::Duration;

pub struct FallbackProvider {
    client: Client,
    health: ProviderHealth,
    capabilities: HashSet<Capability>,
}

impl FallbackProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        let mut capabilities = HashSet::new();
        capabilities.insert(Capability::RealtimePrice);
        capabilities.insert(Capability::KlineData);

        FallbackProvider {
            client,
            health: ProviderHealth::new(),
            capabilities,
        }
    }

    /// `_ntes_quote_callback({ "code": { name, price, open, yestclose, high, low, volume, ... } });`
    fn parse_quote(body: &str, code: &str) -> ProviderResult<StockData> {
        let start = body.find('{').ok_or_else(|| ProviderError::Parse("no json".into()))?;
        let end = body.rfind('}').ok_or_else(|| ProviderError::Parse("no json".into()))?;
        if end <= start {
            return Err(ProviderError::Parse("empty json".into()));
        }
        let slice = &body[start..=end];

        #[derive(serde::Deserialize)]
        struct Quote {
            name: String,
            price: f64,
            open: Option<f64>,
            yestclose: Option<f64>,
            high: Option<f64>,
            low: Option<f64>,
            volume: Option<f64>,
        }

        let map: std::collections::HashMap<String, Quote> =
            serde_json::from_str(slice).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let quote = map
            .into_values()
            .next()
            .ok_or_else(|| ProviderError::Parse("empty quote map".into()))?;

        Ok(StockData {
            code: code.to_string(),
            name: quote.name,
            current_price: quote.price,
            open: quote.open,
            prev_close: quote.yestclose,
            high: quote.high,
            low: quote.low,
            volume: quote.volume,
            turnover: None,
            provider_name: "fallback".to_string(),
        })
    }

    /// CSV header + `date, name, code, close, high, low, open, volume`,
    /// date descending — must be reversed to ascending before returning.
    fn parse_kline_csv(body: &str) -> ProviderResult<Vec<KlineBar>> {
        let mut bars = Vec::new();
        for line in body.lines().skip(1) {
            let cols: Vec<&str> = line.split(',').collect();
            if cols.len() < 8 {
                continue;
            }
            let date = NaiveDate::parse_from_str(cols[0].trim(), "%Y-%m-%d")
                .map_err(|e| ProviderError::Parse(e.to_string()))?;
            bars.push(KlineBar {
                date,
                close: cols[3].trim().parse().map_err(|_| ProviderError::Parse("close".into()))?,
                high: cols[4].trim().parse().map_err(|_| ProviderError::Parse("high".into()))?,
                low: cols[5].trim().parse().map_err(|_| ProviderError::Parse("low".into()))?,
                open: cols[6].trim().parse().map_err(|_| ProviderError::Parse("open".into()))?,
                volume: cols[7].trim().parse().unwrap_or(0.0),
            });
        }
        bars.reverse();
        Ok(bars)
    }
}

#[async_trait]
impl Provider for FallbackProvider {
    fn priority(&self) -> u32 {
        4
    }

    fn name(&self) -> &str {
        "fallback"
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    fn health(&self) -> &ProviderHealth {
        &self.health
    }

    async fn get_realtime_price(&self, code: &str) -> ProviderResult<StockData> {
        let url = format!("https://quotes.example.com/ntes/{code}");
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

    async fn get_kline_data(&self, code: &str, _days: u32) -> ProviderResult<Vec<KlineBar>> {
        let url = format!("https://quotes.example.com/ntes/{code}/kline.csv");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let body = resp.text().await.map_err(|e| ProviderError::Transport(e.to_string()))?;
        Self::parse_kline_csv(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_jsonp_quote() {
        let body = r#"_ntes_quote_callback({ "0600000": { "name": "浦发银行", "price": 7.15, "open": 7.10, "yestclose": 7.08, "high": 7.20, "low": 7.05, "volume": 12345.0 } });"#;
        let data = FallbackProvider::parse_quote(body, "0600000").unwrap();
        assert_eq!(data.name, "浦发银行");
    }

    #[test]
    fn reverses_descending_csv() {
        let body = "date,name,code,close,high,low,open,volume\n2024-01-03,x,c,3,3,3,3,100\n2024-01-02,x,c,2,2,2,2,100\n2024-01-01,x,c,1,1,1,1,100\n";
        let bars = FallbackProvider::parse_kline_csv(body).unwrap();
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(bars.last().unwrap().date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }
}
