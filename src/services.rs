//! Long-lived service graph shared by the CLI and the HTTP server.
//!
//! Everything is built once from a [`Config`]: one HTTP client, the
//! embedding provider, the vector index client and the generator. The
//! same instances back indexing, retrieval and chat routing.

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::generation::{create_generator, Generator};
use crate::http::build_client;
use crate::indexer::Indexer;
use crate::rag::FaqRag;
use crate::router::ChatRouter;
use crate::vector_index::{open_index, VectorIndex};

#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
    pub rag: Arc<FaqRag>,
    pub router: Arc<ChatRouter>,
}

impl Services {
    /// Build every client from configuration.
    ///
    /// # Errors
    ///
    /// Fails with [`RagError::Configuration`](crate::error::RagError) when a
    /// selected provider is missing its credentials.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_client()?;
        let embedder = create_provider(config, client.clone())?;
        let index = open_index(config, client.clone())?;
        let generator = create_generator(config, client)?;
        tracing::debug!(
            embedding = embedder.model_name(),
            index = index.index_name(),
            generator = generator.name(),
            "services ready"
        );
        Ok(Self::from_parts(config, embedder, index, generator))
    }

    /// Assemble services from already-built components.
    pub fn from_parts(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let rag = Arc::new(FaqRag::new(
            config,
            embedder.clone(),
            index.clone(),
            generator,
        ));
        let router = Arc::new(ChatRouter::new(&config.router, rag.clone()));
        Self {
            config: Arc::new(config.clone()),
            embedder,
            index,
            rag,
            router,
        }
    }

    /// An indexer writing through this service graph's clients.
    pub fn indexer(&self) -> Indexer {
        Indexer::new(&self.config, self.embedder.clone(), self.index.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secrets;

    fn offline_config() -> Config {
        let mut config = Config::default();
        config.index.provider = "memory".to_string();
        config.embedding.provider = "disabled".to_string();
        config.generation.provider = "extractive".to_string();
        config
    }

    #[test]
    fn offline_stack_needs_no_credentials() {
        let services = Services::from_config(&offline_config()).unwrap();
        assert_eq!(services.index.index_name(), "clinic-faqs-index");
        assert_eq!(services.embedder.model_name(), "disabled");
    }

    #[test]
    fn pinecone_without_key_is_a_configuration_error() {
        let mut config = offline_config();
        config.index.provider = "pinecone".to_string();
        config.secrets = Secrets::default();
        let err = Services::from_config(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<crate::error::RagError>(),
            Some(crate::error::RagError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn scheduling_works_with_embedding_disabled() {
        let services = Services::from_config(&offline_config()).unwrap();
        let response = services.router.handle("I have a headache").await.unwrap();
        assert_eq!(
            response.agent_response,
            crate::config::RouterConfig::default().scheduling_response
        );
    }
}
