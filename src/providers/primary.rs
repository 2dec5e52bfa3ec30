//! L1: fastest provider, highest ban risk. Plain-text quote wrapped in a
//! JS variable assignment, plus a JSON k-line endpoint.

use super::health::ProviderHealth;
use super::{Capability, KlineBar, Provider, ProviderResult, StockData};
use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

pub struct PrimaryProvider {
    client: Client,
    health: ProviderHealth,
    capabilities: HashSet<Capability>,
}

impl PrimaryProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        let mut capabilities = HashSet::new();
        capabilities.insert(Capability::RealtimePrice);
        capabilities.insert(Capability::KlineData);

        PrimaryProvider {
            client,
            health: ProviderHealth::new(),
            capabilities,
        }
    }

    fn quote_url(code: &str) -> String {
        format!("https://hq.sinajs.cn/list={code}")
    }

    fn kline_url(code: &str, days: u32) -> String {
        format!("https://quotes.example.com/kline/{code}?scale=240&datalen={days}")
    }

    async fn http_get(&self, url: &str) -> ProviderResult<String> {
        let resp = self
            .client
            .get(url)
            .header("Referer", "https://finance.sina.com.cn")
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if resp.status() == StatusCode::FORBIDDEN || resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::Transport(format!(
                "{} banned",
                resp.status().as_u16()
            )));
        }
        if !resp.status().is_success() {
            return Err(ProviderError::Transport(format!("status {}", resp.status())));
        }
        resp.text().await.map_err(|e| ProviderError::Transport(e.to_string()))
    }

    /// `var hq_str_xxx = "name,open,prev_close,current,high,low,bid,ask,vol,turnover,...";`
    fn parse_cn_quote(body: &str, code: &str) -> ProviderResult<StockData> {
        let quoted = extract_quoted(body)
            .ok_or_else(|| ProviderError::Parse("no quoted payload".into()))?;
        let fields: Vec<&str> = quoted.split(',').collect();
        if fields.len() < 10 {
            return Err(ProviderError::Parse("too few fields".into()));
        }
        let current = fields[3]
            .parse::<f64>()
            .map_err(|_| ProviderError::Parse("bad price".into()))?;

        Ok(StockData {
            code: code.to_string(),
            name: fields[0].to_string(),
            current_price: current,
            open: fields[1].parse().ok(),
            prev_close: fields[2].parse().ok(),
            high: fields[4].parse().ok(),
            low: fields[5].parse().ok(),
            volume: fields[8].parse().ok(),
            turnover: fields[9].parse().ok(),
            provider_name: "primary".to_string(),
        })
    }

    /// US variant: same wrapper, but only name (index 0) and price (index 1).
    fn parse_us_quote(body: &str, code: &str) -> ProviderResult<StockData> {
        let quoted = extract_quoted(body)
            .ok_or_else(|| ProviderError::Parse("no quoted payload".into()))?;
        let fields: Vec<&str> = quoted.split(',').collect();
        if fields.len() < 2 {
            return Err(ProviderError::Parse("too few fields".into()));
        }
        let current = fields[1]
            .parse::<f64>()
            .map_err(|_| ProviderError::Parse("bad price".into()))?;

        Ok(StockData {
            code: code.to_string(),
            name: fields[0].to_string(),
            current_price: current,
            open: None,
            prev_close: None,
            high: None,
            low: None,
            volume: None,
            turnover: None,
            provider_name: "primary".to_string(),
        })
    }
}

fn extract_quoted(body: &str) -> Option<&str> {
    let start = body.find('"')? + 1;
    let end = body.rfind('"')?;
    if end <= start {
        return None;
    }
    Some(&body[start..end])
}

fn is_cn_code(code: &str) -> bool {
    code.starts_with("sh") || code.starts_with("sz") || code.starts_with("bj")
}

#[async_trait]
impl Provider for PrimaryProvider {
    fn priority(&self) -> u32 {
        1
    }

    fn name(&self) -> &str {
        "primary"
    }

    fn capabilities(&self) -> &HashSet<Capability> {
        &self.capabilities
    }

    fn health(&self) -> &ProviderHealth {
        &self.health
    }

    async fn get_realtime_price(&self, code: &str) -> ProviderResult<StockData> {
        let url = Self::quote_url(code);
        let body = self.http_get(&url).await?;
        debug!(provider = "primary", code, "fetched quote");
        if is_cn_code(code) {
            Self::parse_cn_quote(&body, code)
        } else {
            Self::parse_us_quote(&body, code)
        }
    }

    async fn get_kline_data(&self, code: &str, days: u32) -> ProviderResult<Vec<KlineBar>> {
        let url = Self::kline_url(code, days);
        let body = self.http_get(&url).await?;

        // US variant is JSONP-wrapped; extract the bracketed array first.
        let json_slice = if let (Some(start), Some(end)) = (body.find('['), body.rfind(']')) {
            &body[start..=end]
        } else {
            return Err(ProviderError::Parse("no array in body".into()));
        };

        #[derive(serde::Deserialize)]
        struct RawBar {
            day: String,
            open: String,
            high: String,
            low: String,
            close: String,
            volume: String,
        }

        let raw: Vec<RawBar> =
            serde_json::from_str(json_slice).map_err(|e| ProviderError::Parse(e.to_string()))?;

        raw.into_iter()
            .map(|b| {
                let date_part = b.day.split(' ').next().unwrap_or(&b.day);
                let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                    .map_err(|e| ProviderError::Parse(e.to_string()))?;
                Ok(KlineBar {
                    date,
                    open: b.open.parse().map_err(|_| ProviderError::Parse("open".into()))?,
                    high: b.high.parse().map_err(|_| ProviderError::Parse("high".into()))?,
                    low: b.low.parse().map_err(|_| ProviderError::Parse("low".into()))?,
                    close: b.close.parse().map_err(|_| ProviderError::Parse("close".into()))?,
                    volume: b.volume.parse().unwrap_or(0.0),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cn_quote() {
        let body = r#"var hq_str_sh600000="浦发银行,7.10,7.08,7.15,7.20,7.05,7.14,7.15,12345678,98765432.10,...";"#;
        let data = PrimaryProvider::parse_cn_quote(body, "sh600000").unwrap();
        assert_eq!(data.name, "浦发银行");
        assert!((data.current_price - 7.15).abs() < 1e-9);
    }

    #[test]
    fn parses_us_quote() {
        let body = r#"var hq_str_gb_aapl="Apple Inc.,185.23,...";"#;
        let data = PrimaryProvider::parse_us_quote(body, "AAPL").unwrap();
        assert_eq!(data.name, "Apple Inc.");
        assert!((data.current_price - 185.23).abs() < 1e-9);
    }
}
