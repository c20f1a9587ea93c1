use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://backend:3001";
pub const DEFAULT_JSON_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub score_api_base_url: String,
    pub score_api_token: Option<String>,
    pub json_timeout_secs: u64,
    pub upload_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            score_api_base_url: DEFAULT_BASE_URL.to_string(),
            score_api_token: None,
            json_timeout_secs: DEFAULT_JSON_TIMEOUT_SECS,
            upload_timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            score_api_base_url: std::env::var("SCORE_API_BASE_URL")
                .or_else(|_| std::env::var("API_BASE_URL"))
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
                .trim()
                .to_string(),
            score_api_token: std::env::var("SCORE_API_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            json_timeout_secs: parse_secs("SCORE_API_TIMEOUT_SECS", DEFAULT_JSON_TIMEOUT_SECS)?,
            upload_timeout_secs: parse_secs(
                "SCORE_UPLOAD_TIMEOUT_SECS",
                DEFAULT_UPLOAD_TIMEOUT_SECS,
            )?,
        };
        config.validate()?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Scoring API Base URL: {}", config.score_api_base_url);
        tracing::debug!(
            "Timeouts: json={}s upload={}s",
            config.json_timeout_secs,
            config.upload_timeout_secs
        );
        if config.score_api_token.is_none() {
            tracing::warn!("SCORE_API_TOKEN not set, requests will be sent without credentials");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = &self.score_api_base_url;
        if url.is_empty() {
            anyhow::bail!("SCORE_API_BASE_URL cannot be empty");
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("SCORE_API_BASE_URL must start with http:// or https://");
        }
        if self.json_timeout_secs == 0 || self.upload_timeout_secs == 0 {
            anyhow::bail!("Timeouts must be greater than zero");
        }
        Ok(())
    }

    pub fn json_timeout(&self) -> Duration {
        Duration::from_secs(self.json_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

fn parse_secs(var: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds", var)),
        _ => Ok(default),
    }
}
