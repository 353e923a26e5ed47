use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::stream::StreamExt;

use crate::api::{ByteStream, ChatTransport, SearchBackend};
use crate::config::Config;
use crate::error::TransportError;
use crate::models::{ChatRequest, Document, SearchResponse};

/// HTTP client for the documentation backend.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Config,
}

impl ApiClient {
    pub fn new(config: Config) -> Result<Self> {
        // No total timeout here: chat streams are bounded by the idle timeout instead
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// GET /models lists chat models the backend can serve.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        self.get_json(&self.config.models_url(), &[])
            .await
            .context("Unable to load model list")
    }

    /// GET /indexers lists available search indexers.
    pub async fn list_indexers(&self) -> Result<Vec<String>> {
        self.get_json(&self.config.indexers_url(), &[])
            .await
            .context("Unable to load indexer list")
    }

    /// GET /document?name= returns the full text and metadata of one document.
    pub async fn document(&self, name: &str) -> Result<Document> {
        self.get_json(&self.config.document_url(), &[("name", name)])
            .await
            .with_context(|| format!("Failed to load document '{name}'"))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, TransportError> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .timeout(self.config.request_timeout)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ChatTransport for ApiClient {
    async fn open_chat(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let k = request.k.to_string();
        let resp = self
            .http
            .get(self.config.chat_url())
            .query(&[
                ("prompt", request.prompt.as_str()),
                ("k", k.as_str()),
                ("model", request.model.as_str()),
                ("indexer", request.indexer.as_str()),
            ])
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Disconnected(e.to_string())));
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl SearchBackend for ApiClient {
    async fn search(&self, query: &str, indexer: &str) -> Result<SearchResponse, TransportError> {
        self.get_json(
            &self.config.search_url(),
            &[("query", query), ("indexer", indexer)],
        )
        .await
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status { status, body })
}
