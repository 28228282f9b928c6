//! Text embedding seam and the `provider/model` resolver.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use ai_client::{split_model_name, Cohere, EmbedAgent, OpenAi};
use tendril_common::{ProviderEnv, TendrilError};

// --- TextEmbedder trait ---

#[async_trait]
pub trait TextEmbedder: Send + Sync + std::fmt::Debug {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// Map an embedding-model identifier of the form `provider/model` (or a bare
/// model name, defaulting to `openai`) to a concrete embedding backend.
///
/// The provider set is closed; anything else is `UnsupportedProvider`.
pub fn resolve_embedder(
    model_name: &str,
    env: &ProviderEnv,
) -> Result<Arc<dyn TextEmbedder>, TendrilError> {
    let (provider, model) = split_model_name(model_name);
    match provider {
        "openai" => {
            let api_key = env
                .openai_api_key
                .as_deref()
                .ok_or(TendrilError::MissingCredential("OPENAI_API_KEY"))?;
            Ok(Arc::new(OpenAiEmbedder::new(api_key, model)))
        }
        "cohere" => {
            let api_key = env
                .cohere_api_key
                .as_deref()
                .ok_or(TendrilError::MissingCredential("COHERE_API_KEY"))?;
            Ok(Arc::new(CohereEmbedder::new(api_key, model)))
        }
        other => Err(TendrilError::UnsupportedProvider(other.to_string())),
    }
}

/// OpenAI embeddings via the ai-client.
#[derive(Debug)]
pub struct OpenAiEmbedder {
    client: OpenAi,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, model: &str) -> Self {
        // The chat-model slot is unused here; only the embedding model matters.
        let client = OpenAi::new(api_key, model).with_embedding_model(model);
        Self { client }
    }
}

#[async_trait]
impl TextEmbedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.client.embed_batch(texts).await
    }
}

/// Cohere embeddings via the ai-client.
#[derive(Debug)]
pub struct CohereEmbedder {
    client: Cohere,
}

impl CohereEmbedder {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: Cohere::new(api_key, model),
        }
    }
}

#[async_trait]
impl TextEmbedder for CohereEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.client.embed_batch(texts).await
    }
}
