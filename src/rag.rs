//! Retrieval-then-generate query path.

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{generate_embedding, EmbeddingProvider, EmbeddingTask};
use crate::error::RagError;
use crate::generation::{Generator, Prompt};
use crate::models::QueryMatch;
use crate::vector_index::VectorIndex;

/// Answers FAQ questions from the vector index.
pub struct FaqRag {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    top_k: usize,
    system_prompt: String,
}

impl FaqRag {
    /// Query path over the given clients, using `retrieval.top_k` and
    /// `generation.system_prompt` from `config`.
    pub fn new(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            top_k: config.retrieval.top_k,
            system_prompt: config.generation.system_prompt.clone(),
        }
    }

    /// Embed `query` and return the `top_k` nearest FAQ entries.
    ///
    /// # Errors
    ///
    /// [`RagError::EmptyQuery`] for an empty query; embedding and index
    /// failures are propagated.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<QueryMatch>> {
        let vector =
            generate_embedding(self.embedder.as_ref(), query, EmbeddingTask::RetrievalQuery)
                .await?;
        if vector.is_empty() {
            return Err(RagError::EmptyQuery.into());
        }

        let matches = self.index.query(&vector, self.top_k).await?;
        tracing::debug!(
            index = self.index.index_name(),
            top_k = self.top_k,
            hits = matches.len(),
            best = matches.first().map(|m| m.id.as_str()).unwrap_or("-"),
            "retrieved FAQ context"
        );
        Ok(matches)
    }

    /// Retrieve context for `query` and generate the answer from it.
    ///
    /// # Errors
    ///
    /// Same as [`retrieve`](Self::retrieve), plus generator failures.
    pub async fn retrieve_and_generate_answer(&self, query: &str) -> Result<String> {
        let matches = self.retrieve(query).await?;
        let prompt = Prompt::new(&self.system_prompt, query, &matches);
        let answer = self.generator.generate(&prompt).await?;
        tracing::info!(
            generator = self.generator.name(),
            context_entries = prompt.context.len(),
            "generated FAQ answer"
        );
        Ok(answer)
    }
}
