use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Smallest accepted result-count bound for a chat request
pub const MIN_K: u8 = 1;
/// Largest accepted result-count bound for a chat request
pub const MAX_K: u8 = 10;

/// A ranked document suggested by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub document: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

/// A finished chat turn. Never mutated once it is in a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Generation time reported by the backend; only set for confirmed model turns
    pub elapsed_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            elapsed_seconds: None,
            created_at: Utc::now(),
        }
    }

    pub fn model(content: impl Into<String>, elapsed_seconds: Option<f64>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
            elapsed_seconds,
            created_at: Utc::now(),
        }
    }
}

/// Parameters of one streaming chat call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub k: u8,
    pub model: String,
    pub indexer: String,
}

impl ChatRequest {
    /// Builds a request, clamping `k` into the accepted range.
    pub fn new(
        prompt: impl Into<String>,
        k: u8,
        model: impl Into<String>,
        indexer: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            k: k.clamp(MIN_K, MAX_K),
            model: model.into(),
            indexer: indexer.into(),
        }
    }
}

/// A search call as issued by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub indexer: String,
    pub generation: u64,
}

/// Body of the non-streaming search endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub corrected: Option<String>,
    #[serde(default)]
    pub proposals: Vec<Proposal>,
}

/// A single document as returned by the lookup endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub element_type: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub parameters: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// Human readable name for an indexer id. Unknown ids are shown as-is.
pub fn indexer_label(indexer: &str) -> &str {
    match indexer {
        "bert" => "LLM + BallTree",
        "inverted_idx" => "Inverted Index",
        other => other,
    }
}
