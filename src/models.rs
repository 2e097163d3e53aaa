//! Core data models used throughout the service.
//!
//! These types represent the FAQ entries, indexed vectors, and query results
//! that flow through the indexing and retrieval pipeline, plus the `/chat`
//! wire types.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One question/answer pair from the FAQ source file.
///
/// Fields are read leniently: a missing or `null` question/answer becomes
/// an empty string, a missing or `null` topic becomes `"General"`, and
/// numbers or booleans are kept as their JSON text.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FaqEntry {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub question: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub answer: String,
    #[serde(default = "default_topic", deserialize_with = "text_or_general")]
    pub topic: String,
}

pub fn default_topic() -> String {
    "General".to_string()
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn text_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn text_or_general<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_else(default_topic))
}

/// Metadata stored next to each vector in the index.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DocumentMetadata {
    pub topic: String,
    pub original_text: String,
}

/// A `(id, vector, metadata)` triple as sent to the vector index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedDocument {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: DocumentMetadata,
}

/// A nearest-neighbour hit returned by the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Option<DocumentMetadata>,
}

/// Parameters used when creating an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
}

/// State of an index as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub ready: bool,
    pub state: String,
    /// Data-plane host, when the provider reports one.
    pub host: Option<String>,
}

/// Label deciding which path answers a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    FaqAnswer,
    Scheduling,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::FaqAnswer => "FAQ_ANSWER",
            Intent::Scheduling => "SCHEDULING",
        }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// Response of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub agent_response: String,
    pub intent: Intent,
}
