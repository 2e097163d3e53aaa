//! Shared HTTP plumbing for the remote providers.
//!
//! One [`reqwest::Client`] is built at startup and cloned into every
//! provider (clones share the connection pool). [`send_json`] performs a
//! JSON request with the retry policy the providers use:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry

use anyhow::{Context, Result};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

use crate::error::RagError;
use crate::retry::RetryPolicy;

pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("clinic-rag/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// A JSON request description, rebuilt into a `reqwest` request per attempt.
pub struct JsonRequest<'a> {
    /// Service label used in errors and logs (e.g. `"Gemini"`).
    pub service: &'static str,
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<&'a Value>,
    pub timeout: Duration,
}

/// Send a request and decode the JSON response body.
///
/// A successful response with an empty body decodes to `Value::Null`; a
/// non-JSON body decodes to `Value::String`.
pub async fn send_json(client: &Client, req: &JsonRequest<'_>, policy: &RetryPolicy) -> Result<Value> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let mut builder = client
            .request(req.method.clone(), &req.url)
            .timeout(req.timeout);
        for (name, value) in &req.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = req.body {
            builder = builder.json(body);
        }

        let err: anyhow::Error = match builder.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let text = response.text().await?;
                    if text.trim().is_empty() {
                        return Ok(Value::Null);
                    }
                    return Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)));
                }

                let body_text = response.text().await.unwrap_or_default();
                let api_err = RagError::Api {
                    service: req.service,
                    status: status.as_u16(),
                    body: body_text,
                };

                // Client error (not 429): don't retry
                if !(status.as_u16() == 429 || status.is_server_error()) {
                    return Err(api_err.into());
                }
                api_err.into()
            }
            Err(e) => anyhow::Error::new(e)
                .context(format!("{} request to {} failed", req.service, req.url)),
        };

        if !policy.has_attempts_left(attempt) {
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            service = req.service,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient API failure, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
