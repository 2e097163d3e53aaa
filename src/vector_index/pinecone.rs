//! Pinecone [`VectorIndex`] client.
//!
//! Index administration goes to the controller
//! (`https://controller.<environment>.pinecone.io`):
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list | `GET /databases` |
//! | create | `POST /databases` `{name, dimension, metric}` |
//! | describe | `GET /databases/{name}` |
//!
//! Upsert and query go to the index's own host (`POST /vectors/upsert`,
//! `POST /query`). The host comes from `index.host` when configured,
//! otherwise from `describe_index`, and is cached for the life of the
//! client. Every request carries the `Api-Key` header.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::error::RagError;
use crate::http::{send_json, JsonRequest};
use crate::models::{DocumentMetadata, IndexDescription, IndexSpec, IndexedDocument, QueryMatch};
use crate::retry::RetryPolicy;

use super::VectorIndex;

const SERVICE: &str = "Pinecone";

pub struct PineconeIndex {
    client: Client,
    api_key: String,
    controller_url: String,
    index_name: String,
    namespace: Option<String>,
    host: OnceCell<String>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl PineconeIndex {
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `PINECONE_API_KEY` is missing,
    /// or if `PINECONE_ENVIRONMENT` is missing and no `index.controller_url`
    /// is configured.
    pub fn new(config: &Config, client: Client) -> Result<Self> {
        let api_key = config
            .secrets
            .pinecone_api_key
            .clone()
            .ok_or_else(|| RagError::config("Pinecone environment variables not fully set: PINECONE_API_KEY"))?;

        let controller_url = match (&config.index.controller_url, &config.secrets.pinecone_environment) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(env)) => format!("https://controller.{}.pinecone.io", env),
            (None, None) => {
                return Err(RagError::config(
                    "Pinecone environment variables not fully set: PINECONE_ENVIRONMENT",
                )
                .into())
            }
        };

        Ok(Self {
            client,
            api_key,
            controller_url,
            index_name: config.index.name.clone(),
            namespace: config.index.namespace.clone(),
            host: OnceCell::new_with(config.index.host.as_deref().map(normalize_host)),
            timeout: Duration::from_secs(config.index.timeout_secs),
            retry: RetryPolicy::http(0),
        })
    }

    async fn call(&self, method: Method, url: String, body: Option<&Value>) -> Result<Value> {
        let request = JsonRequest {
            service: SERVICE,
            method,
            url,
            headers: vec![("Api-Key", self.api_key.clone())],
            body,
            timeout: self.timeout,
        };
        send_json(&self.client, &request, &self.retry).await
    }

    /// Base URL of the target index's data plane.
    async fn data_host(&self) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let description = self.describe_index(&self.index_name).await?;
                description.host.as_deref().map(normalize_host).ok_or_else(|| {
                    anyhow::Error::from(RagError::invalid_response(
                        SERVICE,
                        format!("index '{}' has no host yet", self.index_name),
                    ))
                })
            })
            .await?;
        Ok(host.as_str())
    }
}

/// Turn a bare hostname into an https base URL; keep explicit schemes.
fn normalize_host(host: &str) -> String {
    let trimmed = host.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

fn parse_index_list(json: &Value) -> Result<Vec<String>> {
    // Controller answers a bare array of names; newer deployments wrap
    // descriptions in {"indexes": [...]}.
    let items = json
        .as_array()
        .or_else(|| json.get("indexes").and_then(|i| i.as_array()))
        .ok_or_else(|| RagError::invalid_response(SERVICE, "index list is not an array"))?;

    Ok(items
        .iter()
        .filter_map(|item| {
            item.as_str()
                .or_else(|| item.get("name").and_then(|n| n.as_str()))
                .map(str::to_string)
        })
        .collect())
}

fn parse_description(json: &Value, name: &str) -> Result<IndexDescription> {
    let database = json.get("database").unwrap_or(json);
    let status = json
        .get("status")
        .ok_or_else(|| RagError::invalid_response(SERVICE, "describe_index response has no status"))?;

    Ok(IndexDescription {
        name: database
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(name)
            .to_string(),
        dimension: database
            .get("dimension")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize,
        metric: database
            .get("metric")
            .and_then(|v| v.as_str())
            .unwrap_or("cosine")
            .to_string(),
        ready: status.get("ready").and_then(|v| v.as_bool()).unwrap_or(false),
        state: status
            .get("state")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string(),
        host: status
            .get("host")
            .and_then(|v| v.as_str())
            .filter(|h| !h.is_empty())
            .map(str::to_string),
    })
}

fn parse_matches(json: &Value) -> Result<Vec<QueryMatch>> {
    let matches = json
        .get("matches")
        .and_then(|m| m.as_array())
        .ok_or_else(|| RagError::invalid_response(SERVICE, "query response has no matches array"))?;

    matches
        .iter()
        .map(|m| {
            let id = m
                .get("id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| RagError::invalid_response(SERVICE, "match without id"))?;
            let metadata = m
                .get("metadata")
                .and_then(|md| serde_json::from_value::<DocumentMetadata>(md.clone()).ok());
            Ok(QueryMatch {
                id: id.to_string(),
                score: m.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
                metadata,
            })
        })
        .collect()
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn list_indexes(&self) -> Result<Vec<String>> {
        let json = self
            .call(Method::GET, format!("{}/databases", self.controller_url), None)
            .await?;
        parse_index_list(&json)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<()> {
        let body = json!({
            "name": spec.name,
            "dimension": spec.dimension,
            "metric": spec.metric,
        });
        self.call(
            Method::POST,
            format!("{}/databases", self.controller_url),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<IndexDescription> {
        let json = self
            .call(
                Method::GET,
                format!("{}/databases/{}", self.controller_url, name),
                None,
            )
            .await?;
        parse_description(&json, name)
    }

    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<usize> {
        let host = self.data_host().await?;
        let mut body = json!({ "vectors": documents });
        if let Some(ns) = &self.namespace {
            body["namespace"] = json!(ns);
        }

        let json = self
            .call(Method::POST, format!("{}/vectors/upsert", host), Some(&body))
            .await?;

        Ok(json
            .get("upsertedCount")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(documents.len()))
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let host = self.data_host().await?;
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        });
        if let Some(ns) = &self.namespace {
            body["namespace"] = json!(ns);
        }

        let json = self
            .call(Method::POST, format!("{}/query", host), Some(&body))
            .await?;
        parse_matches(&json)
    }
}
