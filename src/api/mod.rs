//! Backend collaborators.
//!
//! The chat session and the search controller only see the two traits
//! below; [`client::ApiClient`] implements both over HTTP.

pub mod client;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::Stream;

use crate::error::TransportError;
use crate::models::{ChatRequest, SearchResponse};

pub use client::ApiClient;

/// Ordered raw bytes of one streaming chat response.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Opens the streaming chat call.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open_chat(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;
}

/// Issues a single non-streaming search call.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, indexer: &str) -> Result<SearchResponse, TransportError>;
}
