use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// Message Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// =============================================================================
// ChatAgent Trait
// =============================================================================

/// Free-text chat and schema-constrained extraction over a message sequence.
#[async_trait]
pub trait ChatAgent: Send + Sync + std::fmt::Debug {
    /// Run the conversation and return the assistant's reply text.
    async fn chat(&self, messages: &[Message]) -> Result<String>;

    /// Run the conversation constrained to a JSON schema and return the raw
    /// JSON string the model produced.
    async fn extract_json(
        &self,
        messages: &[Message],
        schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<String>;
}

// =============================================================================
// EmbedAgent Trait
// =============================================================================

#[async_trait]
pub trait EmbedAgent: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}
