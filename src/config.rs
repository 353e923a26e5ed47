use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{MAX_K, MIN_K};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the search/chat backend
    pub api_url: String,
    /// Number of documents retrieved as chat context
    pub default_k: u8,
    /// Chat model; None picks the first one the backend lists
    pub model: Option<String>,
    /// Search indexer; None picks the first one the backend lists
    pub indexer: Option<String>,
    /// Trailing-edge delay before a typed query is sent
    pub debounce: Duration,
    /// TCP connect timeout for every request
    pub connect_timeout: Duration,
    /// Total timeout for one-shot (non-streaming) requests
    pub request_timeout: Duration,
    /// Longest allowed gap between two chunks of a chat stream
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            default_k: 5,
            model: None,
            indexer: None,
            debounce: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DOCSEARCH_API_URL").or_else(|_| std::env::var("API_URL")) {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(val) = std::env::var("DOCSEARCH_K") {
            if let Ok(k) = val.parse::<u8>() {
                config.default_k = k.clamp(MIN_K, MAX_K);
            }
        }
        if let Ok(model) = std::env::var("DOCSEARCH_MODEL") {
            if !model.is_empty() {
                config.model = Some(model);
            }
        }
        if let Ok(indexer) = std::env::var("DOCSEARCH_INDEXER") {
            if !indexer.is_empty() {
                config.indexer = Some(indexer);
            }
        }
        if let Ok(val) = std::env::var("DOCSEARCH_DEBOUNCE_MS") {
            if let Ok(ms) = val.parse() {
                config.debounce = Duration::from_millis(ms);
            }
        }
        if let Ok(val) = std::env::var("DOCSEARCH_CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.connect_timeout = Duration::from_secs(secs);
            }
        }
        if let Ok(val) = std::env::var("DOCSEARCH_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.request_timeout = Duration::from_secs(secs);
            }
        }
        if let Ok(val) = std::env::var("DOCSEARCH_IDLE_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                // Zero would time out every read
                config.idle_timeout = Duration::from_secs(secs.max(1));
            }
        }

        config
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.api_url)
    }

    pub fn search_url(&self) -> String {
        format!("{}/search", self.api_url)
    }

    pub fn models_url(&self) -> String {
        format!("{}/models", self.api_url)
    }

    pub fn indexers_url(&self) -> String {
        format!("{}/indexers", self.api_url)
    }

    pub fn document_url(&self) -> String {
        format!("{}/document", self.api_url)
    }
}
