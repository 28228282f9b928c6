use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::EmbedAgent;

const COHERE_API_URL: &str = "https://api.cohere.com/v1";

// =============================================================================
// Cohere Embedding Agent
// =============================================================================

#[derive(Debug, Clone)]
pub struct Cohere {
    api_key: String,
    model: String,
    input_type: String,
    base_url: String,
}

impl Cohere {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            input_type: "search_document".to_string(),
            base_url: COHERE_API_URL.to_string(),
        }
    }

    /// Cohere distinguishes query-side from document-side embeddings.
    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = input_type.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embed", self.base_url);

        debug!(model = %self.model, count = texts.len(), "Cohere embedding request");

        let request = EmbedRequest {
            model: self.model.clone(),
            texts,
            input_type: self.input_type.clone(),
        };

        let response = reqwest::Client::new()
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Cohere API error ({}): {}", status, error_text));
        }

        let body: EmbedResponse = response.json().await?;
        Ok(body.embeddings)
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    texts: Vec<String>,
    input_type: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbedAgent for Cohere {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("No embedding returned from Cohere"))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.request(texts).await
    }
}
