//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait covers everything the service needs from a
//! managed vector database: index administration (list / create / describe)
//! and the data-plane operations (upsert, top-k query) against one target
//! index. Implementations must be `Send + Sync` to be shared across request
//! handlers.
//!
//! | Provider | Type |
//! |----------|------|
//! | `"pinecone"` | [`pinecone::PineconeIndex`] |
//! | `"memory"` | [`memory::InMemoryIndex`] |
//!
//! [`ensure_index`] implements the creation policy: create the index when it
//! is missing, then poll until the provider reports it ready, bounded by a
//! [`RetryPolicy`].

pub mod memory;
pub mod pinecone;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

use crate::config::Config;
use crate::error::RagError;
use crate::models::{IndexDescription, IndexSpec, IndexedDocument, QueryMatch};
use crate::retry::RetryPolicy;

/// Abstract vector index backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_indexes`](VectorIndex::list_indexes) | Names of all indexes in the project |
/// | [`create_index`](VectorIndex::create_index) | Create an index |
/// | [`describe_index`](VectorIndex::describe_index) | Dimension, metric, readiness |
/// | [`upsert`](VectorIndex::upsert) | Insert or overwrite vectors by id |
/// | [`query`](VectorIndex::query) | Top-k nearest neighbours with metadata |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name of the index that `upsert` and `query` operate on.
    fn index_name(&self) -> &str;

    async fn list_indexes(&self) -> Result<Vec<String>>;

    async fn create_index(&self, spec: &IndexSpec) -> Result<()>;

    async fn describe_index(&self, name: &str) -> Result<IndexDescription>;

    /// Insert or overwrite vectors. Returns the number of vectors written.
    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<usize>;

    /// Nearest neighbours of `vector`, best first, with metadata.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>>;
}

/// Spec for the configured index.
pub fn index_spec(config: &Config) -> IndexSpec {
    IndexSpec {
        name: config.index.name.clone(),
        dimension: config.index.dimension,
        metric: config.index.metric.clone(),
    }
}

/// Make sure `spec.name` exists and is ready.
///
/// Creates the index if it is not listed, then polls
/// [`describe_index`](VectorIndex::describe_index) until it reports ready.
/// Polling stops after `policy.max_attempts` describes with
/// [`RagError::IndexNotReady`].
pub async fn ensure_index(
    index: &dyn VectorIndex,
    spec: &IndexSpec,
    policy: &RetryPolicy,
) -> Result<IndexDescription> {
    let existing = index.list_indexes().await?;

    if !existing.iter().any(|name| name == &spec.name) {
        tracing::info!(
            index = %spec.name,
            dimension = spec.dimension,
            metric = %spec.metric,
            "creating vector index"
        );
        index.create_index(spec).await?;
    }

    wait_until_ready(index, &spec.name, policy).await
}

async fn wait_until_ready(
    index: &dyn VectorIndex,
    name: &str,
    policy: &RetryPolicy,
) -> Result<IndexDescription> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let description = index.describe_index(name).await?;

        if description.ready {
            tracing::debug!(index = name, attempt, "vector index ready");
            return Ok(description);
        }

        if !policy.has_attempts_left(attempt) {
            return Err(RagError::IndexNotReady {
                name: name.to_string(),
                attempts: attempt,
            }
            .into());
        }

        let delay = policy.delay_for(attempt);
        tracing::debug!(
            index = name,
            attempt,
            state = %description.state,
            delay_ms = delay.as_millis() as u64,
            "waiting for vector index"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Create the configured [`VectorIndex`] client.
///
/// # Errors
///
/// Returns [`RagError::Configuration`] when Pinecone credentials are missing.
pub fn open_index(config: &Config, client: Client) -> Result<Arc<dyn VectorIndex>> {
    match config.index.provider.as_str() {
        "pinecone" => Ok(Arc::new(pinecone::PineconeIndex::new(config, client)?)),
        "memory" => Ok(Arc::new(memory::InMemoryIndex::new(&config.index.name))),
        other => Err(RagError::config(format!("Unknown index provider: {}", other)).into()),
    }
}
