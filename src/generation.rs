//! Answer generation from retrieved FAQ context.
//!
//! A [`Prompt`] bundles the system instruction, the user's question and the
//! numbered context block built from retrieved matches. A [`Generator`]
//! turns it into the final answer:
//! - **[`GeminiGenerator`]**: Gemini `generateContent`.
//! - **[`ExtractiveGenerator`]**: no remote call; answers with the best
//!   retrieved FAQ entry verbatim.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::embedding::GEMINI_BASE_URL;
use crate::error::RagError;
use crate::http::{send_json, JsonRequest};
use crate::models::QueryMatch;
use crate::retry::RetryPolicy;

/// Answer used when nothing relevant was retrieved.
pub const NO_CONTEXT_ANSWER: &str =
    "I'm sorry, I couldn't find that in our clinic FAQ. Please contact the front desk for help.";

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub question: String,
    /// Retrieved FAQ texts, best match first.
    pub context: Vec<String>,
}

impl Prompt {
    pub fn new(system: &str, question: &str, matches: &[QueryMatch]) -> Self {
        Self {
            system: system.to_string(),
            question: question.to_string(),
            context: matches
                .iter()
                .filter_map(|m| m.metadata.as_ref())
                .map(|md| md.original_text.clone())
                .filter(|t| !t.trim().is_empty())
                .collect(),
        }
    }

    /// Numbered context block, one excerpt per line.
    pub fn context_block(&self) -> String {
        self.context
            .iter()
            .enumerate()
            .map(|(i, text)| format!("[{}] {}", i + 1, text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// User turn sent to the model.
    pub fn user_message(&self) -> String {
        let context = if self.context.is_empty() {
            "(no matching FAQ entries)".to_string()
        } else {
            self.context_block()
        };
        format!(
            "FAQ excerpts:\n{}\n\nPatient question: {}",
            context, self.question
        )
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

/// Returns the top retrieved FAQ text; no model involved.
pub struct ExtractiveGenerator;

#[async_trait]
impl Generator for ExtractiveGenerator {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        Ok(prompt
            .context
            .first()
            .cloned()
            .unwrap_or_else(|| NO_CONTEXT_ANSWER.to_string()))
    }
}

/// Generation through Gemini `POST /v1beta/models/{model}:generateContent`.
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl GeminiGenerator {
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
            model: config.generation.model.clone(),
            base_url: config
                .generation
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(config.generation.timeout_secs),
            retry: RetryPolicy::http(config.generation.max_retries),
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = serde_json::json!({
            "systemInstruction": { "parts": [{ "text": prompt.system }] },
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt.user_message() }]
            }],
        });

        let request = JsonRequest {
            service: "Gemini",
            method: Method::POST,
            url: format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ),
            headers: vec![("x-goog-api-key", self.api_key.clone())],
            body: Some(&body),
            timeout: self.timeout,
        };

        let json = send_json(&self.client, &request, &self.retry).await?;
        parse_generated_text(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_generated_text(json: &Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| RagError::invalid_response("Gemini", "no candidate content"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        return Err(RagError::invalid_response("Gemini", "candidate has no text").into());
    }
    Ok(text.trim().to_string())
}

/// | Config Value | Generator |
/// |-------------|----------|
/// | `"gemini"` | [`GeminiGenerator`] |
/// | `"extractive"` | [`ExtractiveGenerator`] |
pub fn create_generator(config: &Config, client: Client) -> Result<Arc<dyn Generator>> {
    match config.generation.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config, client)?)),
        "extractive" => Ok(Arc::new(ExtractiveGenerator)),
        other => Err(RagError::config(format!("Unknown generation provider: {}", other)).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentMetadata;

    fn hit(id: &str, text: &str) -> QueryMatch {
        QueryMatch {
            id: id.to_string(),
            score: 0.9,
            metadata: Some(DocumentMetadata {
                topic: "Insurance".to_string(),
                original_text: text.to_string(),
            }),
        }
    }

    #[test]
    fn prompt_numbers_context_in_rank_order() {
        let matches = vec![
            hit("faq_3", "Q: Do you take Aetna?. A: Yes. (Topic: Insurance)"),
            QueryMatch {
                id: "faq_9".to_string(),
                score: 0.5,
                metadata: None,
            },
            hit("faq_1", "Q: Cancel fee?. A: $25 within 24h. (Topic: Billing)"),
        ];
        let prompt = Prompt::new("sys", "Do you take Aetna?", &matches);
        assert_eq!(prompt.context.len(), 2);
        assert_eq!(
            prompt.context_block(),
            "[1] Q: Do you take Aetna?. A: Yes. (Topic: Insurance)\n[2] Q: Cancel fee?. A: $25 within 24h. (Topic: Billing)"
        );
        assert!(prompt.user_message().ends_with("Patient question: Do you take Aetna?"));
    }

    #[test]
    fn prompt_without_context_says_so() {
        let prompt = Prompt::new("sys", "anything", &[]);
        assert!(prompt.user_message().contains("(no matching FAQ entries)"));
    }

    #[tokio::test]
    async fn extractive_returns_best_match_or_fallback() {
        let prompt = Prompt::new("sys", "q", &[hit("faq_0", "best"), hit("faq_1", "second")]);
        assert_eq!(ExtractiveGenerator.generate(&prompt).await.unwrap(), "best");

        let empty = Prompt::new("sys", "q", &[]);
        assert_eq!(
            ExtractiveGenerator.generate(&empty).await.unwrap(),
            NO_CONTEXT_ANSWER
        );
    }

    #[test]
    fn parses_candidate_text() {
        let json = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": "We accept " }, { "text": "Aetna." }] } }]
        });
        assert_eq!(parse_generated_text(&json).unwrap(), "We accept Aetna.");
    }

    #[test]
    fn rejects_empty_candidates() {
        let json = serde_json::json!({ "candidates": [] });
        assert!(parse_generated_text(&json).is_err());
    }

    #[test]
    fn gemini_generator_requires_key() {
        let config = Config::default();
        assert!(GeminiGenerator::new(&config, Client::new()).is_err());
    }
}
