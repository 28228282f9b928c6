//! Chat-model seam for the pipeline steps.
//!
//! Steps talk to `ChatModel`; the live implementation resolves a concrete
//! client per call from the `provider/model` string, so the query and
//! response models can point at different providers.

use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use ai_client::openai::StructuredOutput;
use ai_client::{split_model_name, ChatAgent, Claude, Message, OpenAi};
use tendril_common::{ProviderEnv, TendrilError};

/// Structured output target for query generation.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchQuery {
    /// Search the indexed documents for a query.
    pub query: String,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Free-text completion over the message sequence.
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<String>;

    /// Extract a single search query, schema-constrained.
    async fn search_query(&self, model: &str, messages: &[Message]) -> Result<String>;
}

/// Resolves and calls real provider clients.
pub struct LiveChatModel {
    env: ProviderEnv,
}

impl LiveChatModel {
    pub fn new(env: ProviderEnv) -> Self {
        Self { env }
    }

    fn load(&self, name: &str) -> Result<Box<dyn ChatAgent>, TendrilError> {
        let (provider, model) = split_model_name(name);
        match provider {
            "openai" => {
                let api_key = self
                    .env
                    .openai_api_key
                    .as_deref()
                    .ok_or(TendrilError::MissingCredential("OPENAI_API_KEY"))?;
                Ok(Box::new(OpenAi::new(api_key, model)))
            }
            "anthropic" => {
                let api_key = self
                    .env
                    .anthropic_api_key
                    .as_deref()
                    .ok_or(TendrilError::MissingCredential("ANTHROPIC_API_KEY"))?;
                Ok(Box::new(Claude::new(api_key, model)))
            }
            other => Err(TendrilError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[async_trait]
impl ChatModel for LiveChatModel {
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<String> {
        let agent = self.load(model)?;
        agent.chat(messages).await
    }

    async fn search_query(&self, model: &str, messages: &[Message]) -> Result<String> {
        let agent = self.load(model)?;
        let raw = agent
            .extract_json(messages, "search_query", SearchQuery::openai_schema())
            .await?;
        let parsed: SearchQuery = serde_json::from_str(&raw)?;
        Ok(parsed.query)
    }
}
