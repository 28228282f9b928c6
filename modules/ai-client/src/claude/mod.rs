pub(crate) mod types;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::debug;

use crate::traits::{ChatAgent, Message, MessageRole};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// =============================================================================
// Claude Agent
// =============================================================================

#[derive(Debug, Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: String,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn send(&self, request: &types::ChatRequest) -> Result<types::ChatResponse> {
        let url = format!("{}/messages", self.base_url);

        debug!(model = %request.model, "Claude chat request");

        let response = reqwest::Client::new()
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Claude API error ({}): {}", status, error_text));
        }

        Ok(response.json().await?)
    }

    /// The Anthropic API carries the system prompt out-of-band, so system
    /// messages are collected into `system` and the rest become turns.
    fn wire_request(&self, messages: &[Message]) -> types::ChatRequest {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut turns: Vec<types::WireMessage> = Vec::new();

        for msg in messages {
            match msg.role {
                MessageRole::System => system_parts.push(&msg.content),
                MessageRole::User => turns.push(types::WireMessage::user(&msg.content)),
                MessageRole::Assistant => {
                    turns.push(types::WireMessage::assistant(&msg.content))
                }
            }
        }

        let mut request = types::ChatRequest::new(&self.model).messages(turns);
        if !system_parts.is_empty() {
            request = request.system(system_parts.join("\n\n"));
        }
        request
    }
}

// =============================================================================
// ChatAgent Implementation
// =============================================================================

#[async_trait]
impl ChatAgent for Claude {
    async fn chat(&self, messages: &[Message]) -> Result<String> {
        let request = self.wire_request(messages);
        let response = self.send(&request).await?;

        response
            .content
            .into_iter()
            .find_map(|block| match block {
                types::ContentBlock::Text { text } => Some(text),
                _ => None,
            })
            .ok_or_else(|| anyhow!("No text content from Claude"))
    }

    async fn extract_json(
        &self,
        messages: &[Message],
        schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<String> {
        let request = self.wire_request(messages).forced_tool(types::ToolDefinitionWire {
            name: schema_name.to_string(),
            description: format!("Record the {} output", schema_name),
            input_schema: schema,
        });

        let response = self.send(&request).await?;

        let input = response
            .content
            .into_iter()
            .find_map(|block| match block {
                types::ContentBlock::ToolUse { input, .. } => Some(input),
                _ => None,
            })
            .ok_or_else(|| anyhow!("No tool_use content from Claude"))?;

        Ok(serde_json::to_string(&input)?)
    }
}
