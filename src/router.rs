//! Keyword intent detection for `/chat`.
//!
//! A message whose lowercase form contains one of the configured keywords
//! goes to the FAQ answer path; everything else gets the fixed scheduling
//! prompt. Each message is classified on its own.

use anyhow::Result;
use std::sync::Arc;

use crate::config::RouterConfig;
use crate::models::{ChatResponse, Intent};
use crate::rag::FaqRag;

/// Classify `message`: [`Intent::FaqAnswer`] when its lowercase form
/// contains any non-empty keyword (compared lowercase), otherwise
/// [`Intent::Scheduling`].
pub fn detect_intent(message: &str, keywords: &[String]) -> Intent {
    let lower = message.to_lowercase();
    if keywords
        .iter()
        .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
    {
        Intent::FaqAnswer
    } else {
        Intent::Scheduling
    }
}

/// Routes `/chat` messages to the FAQ answer path or the scheduling prompt.
pub struct ChatRouter {
    rag: Arc<FaqRag>,
    keywords: Vec<String>,
    scheduling_response: String,
}

impl ChatRouter {
    /// Router using the keywords and scheduling text from `[router]`.
    pub fn new(config: &RouterConfig, rag: Arc<FaqRag>) -> Self {
        Self {
            rag,
            keywords: config.faq_keywords.clone(),
            scheduling_response: config.scheduling_response.clone(),
        }
    }

    /// Classify and answer one message.
    ///
    /// # Errors
    ///
    /// Only the FAQ path can fail; errors from
    /// [`FaqRag::retrieve_and_generate_answer`] are returned unchanged. The
    /// scheduling path never fails.
    pub async fn handle(&self, message: &str) -> Result<ChatResponse> {
        let intent = detect_intent(message, &self.keywords);
        tracing::info!(intent = intent.as_str(), "classified chat message");

        let agent_response = match intent {
            Intent::FaqAnswer => self.rag.retrieve_and_generate_answer(message).await?,
            Intent::Scheduling => self.scheduling_response.clone(),
        };

        Ok(ChatResponse {
            agent_response,
            intent,
        })
    }
}
