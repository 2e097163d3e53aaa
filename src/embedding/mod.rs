//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`GeminiProvider`]**: calls the Gemini `embedContent` API, one text per call.
//!
//! Callers go through [`generate_embedding`], which short-circuits empty
//! input and logs provider failures before propagating them.
//!
//! # Provider Selection
//!
//! Use [`create_provider`] to instantiate the appropriate provider based
//! on the configuration:
//!
//! ```rust,no_run
//! # use clinic_rag::config::Config;
//! # use clinic_rag::embedding::create_provider;
//! # fn main() -> anyhow::Result<()> {
//! let mut config = Config::default();
//! config.embedding.provider = "disabled".to_string();
//! let client = clinic_rag::http::build_client()?;
//! let provider = create_provider(&config, client)?;
//! assert_eq!(provider.model_name(), "disabled");
//! # Ok(())
//! # }
//! ```
//!
//! # Retry Strategy
//!
//! `embedding.max_retries` defaults to 0: a failed call fails the operation.
//! When raised, transient errors (429, 5xx, network) back off 1s, 2s, 4s, …
//! (see [`crate::http::send_json`]).

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::RagError;
use crate::http::{send_json, JsonRequest};
use crate::retry::RetryPolicy;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// What the vector will be used for. Gemini tunes embeddings per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    RetrievalDocument,
    RetrievalQuery,
}

impl EmbeddingTask {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            EmbeddingTask::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            EmbeddingTask::RetrievalQuery => "RETRIEVAL_QUERY",
        }
    }
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-004"`).
    fn model_name(&self) -> &str;
    /// Embed a single non-empty text.
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>>;
}

/// Embed one text.
///
/// An empty string yields an empty vector without calling the provider.
/// Provider errors are logged and returned unchanged.
pub async fn generate_embedding(
    provider: &dyn EmbeddingProvider,
    text: &str,
    task: EmbeddingTask,
) -> Result<Vec<f32>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    match provider.embed(text, task).await {
        Ok(vector) => Ok(vector),
        Err(e) => {
            tracing::error!(
                model = provider.model_name(),
                task = task.as_api_str(),
                error = %e,
                "error generating embedding"
            );
            Err(e)
        }
    }
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"`. Lets the server run the
/// scheduling path without any embedding credentials.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn embed(&self, _text: &str, _task: EmbeddingTask) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingDisabled.into())
    }
}

// ============ Gemini Provider ============

/// Embedding provider using the Gemini API.
///
/// Calls `POST /v1beta/models/{model}:embedContent` with the configured
/// model, requesting `index.dimension` output dimensions so that documents
/// and queries always match the index. Requires `GEMINI_API_KEY`.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    dims: usize,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl GeminiProvider {
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `GEMINI_API_KEY` is not set.
    pub fn new(config: &Config, client: Client) -> Result<Self> {
        let api_key = config
            .secrets
            .gemini_api_key
            .clone()
            .ok_or_else(|| RagError::config("GEMINI_API_KEY not set in environment"))?;

        Ok(Self {
            client,
            api_key,
            model: config.embedding.model.clone(),
            dims: config.index.dimension,
            base_url: config
                .embedding
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(config.embedding.timeout_secs),
            retry: RetryPolicy::http(config.embedding.max_retries),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
            "taskType": task.as_api_str(),
            "outputDimensionality": self.dims,
        });

        let request = JsonRequest {
            service: "Gemini",
            method: Method::POST,
            url: format!("{}/v1beta/models/{}:embedContent", self.base_url, self.model),
            headers: vec![("x-goog-api-key", self.api_key.clone())],
            body: Some(&body),
            timeout: self.timeout,
        };

        let json = send_json(&self.client, &request, &self.retry).await?;
        parse_gemini_embedding(&json)
    }
}

/// Extract `embedding.values` from an `embedContent` response.
fn parse_gemini_embedding(json: &Value) -> Result<Vec<f32>> {
    let values = json
        .get("embedding")
        .and_then(|e| e.get("values"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| RagError::invalid_response("Gemini", "missing embedding.values"))?;

    Ok(values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"gemini"` | [`GeminiProvider`] |
pub fn create_provider(config: &Config, client: Client) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "gemini" => Ok(Arc::new(GeminiProvider::new(config, client)?)),
        other => Err(RagError::config(format!("Unknown embedding provider: {}", other)).into()),
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
///
/// # Formula
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
