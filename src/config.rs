use serde::{Deserialize, Serialize};

/// Application configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    /// Size of the bounded worker pool `enrich_batch` fans out over.
    pub batch_pool_size: usize,
    /// Minimum interval between outbound coordinator calls, in milliseconds.
    pub rate_limit_ms: u64,
    /// Provider cooldown after a ban-class (403/429) response, in minutes.
    pub cooldown_minutes: i64,
    pub l5_api_key: Option<String>,
    pub l6_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./stockwatch.db".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let batch_pool_size = std::env::var("BATCH_POOL_SIZE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let rate_limit_ms = std::env::var("COORDINATOR_RATE_LIMIT_MS")
            .unwrap_or_else(|_| "200".to_string())
            .parse()
            .unwrap_or(200);

        let cooldown_minutes = std::env::var("PROVIDER_COOLDOWN_MINUTES")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        let l5_api_key = std::env::var("L5_API_KEY").ok();
        let l6_api_key = std::env::var("L6_API_KEY").ok();

        Ok(Self {
            database_path,
            port,
            batch_pool_size,
            rate_limit_ms,
            cooldown_minutes,
            l5_api_key,
            l6_api_key,
        })
    }
}

/// Trading market an instrument belongs to, decided once by the symbol
/// normalizer and carried through the rest of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Cn,
    Us,
}
