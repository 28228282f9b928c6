mod client;
pub(crate) mod schema;
pub(crate) mod types;

pub use schema::StructuredOutput;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::traits::{ChatAgent, EmbedAgent, Message, MessageRole};
use client::OpenAiClient;

// =============================================================================
// OpenAi Agent
// =============================================================================

#[derive(Debug, Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    embedding_model: String,
    base_url: Option<String>,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: "text-embedding-3-small".to_string(),
            base_url: None,
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> OpenAiClient {
        let client = OpenAiClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    fn wire_messages(messages: &[Message]) -> Vec<types::WireMessage> {
        messages
            .iter()
            .map(|msg| match msg.role {
                MessageRole::System => types::WireMessage::system(&msg.content),
                MessageRole::User => types::WireMessage::user(&msg.content),
                MessageRole::Assistant => types::WireMessage::assistant(&msg.content),
            })
            .collect()
    }

    /// Type-safe structured output extraction.
    pub async fn extract<T: StructuredOutput>(&self, messages: &[Message]) -> Result<T> {
        let json_str = self
            .extract_json(
                messages,
                &T::type_name().to_lowercase(),
                T::openai_schema(),
            )
            .await?;

        serde_json::from_str(&json_str)
            .map_err(|e| anyhow!("Failed to deserialize response: {}", e))
    }
}

// =============================================================================
// ChatAgent Implementation
// =============================================================================

#[async_trait]
impl ChatAgent for OpenAi {
    async fn chat(&self, messages: &[Message]) -> Result<String> {
        let request = types::ChatRequest::new(&self.model)
            .messages(Self::wire_messages(messages))
            .max_tokens(4096)
            .temperature(0.0);

        let response = self.client().chat(&request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No response from OpenAI"))
    }

    async fn extract_json(
        &self,
        messages: &[Message],
        schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<String> {
        let request = types::ChatRequest::new(&self.model)
            .messages(Self::wire_messages(messages))
            .temperature(0.0)
            .response_format(types::ResponseFormat::json_schema(schema_name, schema));

        let response = self.client().chat(&request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No structured output from OpenAI"))
    }
}

// =============================================================================
// EmbedAgent Implementation
// =============================================================================

#[async_trait]
impl EmbedAgent for OpenAi {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self
            .client()
            .embed_batch(&self.embedding_model, &[text.to_string()])
            .await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("No embedding returned from OpenAI"))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.client().embed_batch(&self.embedding_model, &texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_new() {
        let ai = OpenAi::new("sk-test", "gpt-4o-mini");
        assert_eq!(ai.model, "gpt-4o-mini");
        assert_eq!(ai.api_key, "sk-test");
        assert_eq!(ai.embedding_model, "text-embedding-3-small");
    }

    #[test]
    fn test_openai_with_embedding_model() {
        let ai = OpenAi::new("sk-test", "gpt-4o").with_embedding_model("text-embedding-3-large");
        assert_eq!(ai.embedding_model, "text-embedding-3-large");
    }

    #[test]
    fn test_openai_with_base_url() {
        let ai = OpenAi::new("sk-test", "gpt-4o").with_base_url("https://custom.api.com");
        assert_eq!(ai.base_url, Some("https://custom.api.com".to_string()));
    }
}
