use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "http://localhost:9200";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticConfig {
    pub base_url: String, // e.g., "http://es-node:9200"
    /// Per-request timeout, applied to every call the client makes.
    pub timeout_ms: u64,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ElasticConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
        .normalized()
    }

    /// Build from `TERMSYNC_ES_URL` / `TERMSYNC_ES_TIMEOUT_MS`, defaults otherwise.
    pub fn from_env() -> Self {
        let mut config = ElasticConfig::default();
        if let Ok(url) = std::env::var("TERMSYNC_ES_URL") {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }
        if let Some(ms) = std::env::var("TERMSYNC_ES_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
        {
            config.timeout_ms = ms;
        }
        config.normalized()
    }

    /// Load from {dir}/elastic.json, falling back to [`ElasticConfig::from_env`].
    pub fn load_or_default(dir: &Path) -> Self {
        let config_json = dir.join("elastic.json");

        if config_json.exists() {
            match std::fs::read_to_string(&config_json) {
                Ok(content) => match serde_json::from_str::<ElasticConfig>(&content) {
                    Ok(config) => {
                        tracing::info!("Loaded backend config: base_url={}", config.base_url);
                        return config.normalized();
                    }
                    Err(e) => {
                        tracing::error!("Failed to parse elastic.json: {}, using defaults", e);
                    }
                },
                Err(e) => {
                    tracing::error!("Failed to read elastic.json: {}, using defaults", e);
                }
            }
        }

        let config = Self::from_env();
        tracing::info!(
            "No elastic.json found, using environment/defaults: base_url={}",
            config.base_url
        );
        config
    }

    fn normalized(mut self) -> Self {
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        self
    }
}
