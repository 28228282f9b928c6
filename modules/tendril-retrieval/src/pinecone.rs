//! Pinecone backend over the serverless HTTP API.
//!
//! Construction resolves the index host from the control plane; queries and
//! upserts go straight to the data plane host.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use tendril_common::{Document, IndexConfiguration, ProviderEnv, TendrilError};

use crate::elastic::search_k;
use crate::embedder::TextEmbedder;
use crate::retriever::Retriever;

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";

/// Merge caller-supplied metadata filter with the tenant constraint, tenant
/// inserted last under `user_id` so it can never be overridden.
pub(crate) fn pinecone_filter(search_kwargs: &Map<String, Value>, user_id: &str) -> Map<String, Value> {
    let mut filter = search_kwargs
        .get("filter")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    filter.insert("user_id".to_string(), Value::String(user_id.to_string()));
    filter
}

pub struct PineconeRetriever {
    http: reqwest::Client,
    host: String,
    api_key: String,
    filter: Map<String, Value>,
    top_k: usize,
    embedder: Arc<dyn TextEmbedder>,
}

impl PineconeRetriever {
    pub(crate) async fn connect(
        config: &IndexConfiguration,
        env: &ProviderEnv,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Result<Self, TendrilError> {
        let index_name = env
            .pinecone_index_name
            .clone()
            .ok_or(TendrilError::MissingIndex("PINECONE_INDEX_NAME"))?;
        let api_key = env
            .pinecone_api_key
            .clone()
            .ok_or(TendrilError::MissingCredential("PINECONE_API_KEY"))?;

        let http = reqwest::Client::new();
        let host = describe_index_host(&http, &api_key, &index_name).await?;

        Ok(Self {
            http,
            host,
            api_key,
            filter: pinecone_filter(&config.search_kwargs, &config.user_id),
            top_k: search_k(&config.search_kwargs),
            embedder,
        })
    }
}

async fn describe_index_host(
    http: &reqwest::Client,
    api_key: &str,
    index_name: &str,
) -> Result<String> {
    let url = format!("{CONTROL_PLANE_URL}/indexes/{index_name}");

    debug!(index = index_name, "Pinecone describe index");

    let response = http.get(&url).header("Api-Key", api_key).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await?;
        return Err(anyhow!("Pinecone describe error ({}): {}", status, error_text));
    }

    let body: Value = response.json().await?;
    body["host"]
        .as_str()
        .map(|h| format!("https://{h}"))
        .ok_or_else(|| anyhow!("Pinecone index {} has no host", index_name))
}

#[async_trait]
impl Retriever for PineconeRetriever {
    async fn query(&self, text: &str) -> Result<Vec<Document>> {
        let vector = self.embedder.embed(text).await?;

        let body = json!({
            "vector": vector,
            "topK": self.top_k,
            "includeMetadata": true,
            "filter": self.filter,
        });

        debug!(top_k = self.top_k, "Pinecone query");

        let url = format!("{}/query", self.host);
        let response = self
            .http
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Pinecone query error ({}): {}", status, error_text));
        }

        let body: Value = response.json().await?;
        let matches = body["matches"].as_array().cloned().unwrap_or_default();

        Ok(matches
            .into_iter()
            .map(|m| {
                let mut metadata = m["metadata"].as_object().cloned().unwrap_or_default();
                let content = metadata
                    .remove("text")
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                Document {
                    id: m["id"].as_str().unwrap_or_default().to_string(),
                    content,
                    metadata,
                }
            })
            .collect())
    }

    async fn add_documents(&self, docs: &[Document]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.embed_batch(texts).await?;

        let payload: Vec<Value> = docs
            .iter()
            .zip(vectors.iter())
            .map(|(doc, vector)| {
                // Content rides along in metadata under `text`, the common
                // Pinecone convention for round-tripping the source string.
                let mut metadata = doc.metadata.clone();
                metadata.insert("text".to_string(), Value::String(doc.content.clone()));
                json!({
                    "id": doc.id,
                    "values": vector,
                    "metadata": metadata,
                })
            })
            .collect();

        debug!(count = docs.len(), "Pinecone upsert");

        let url = format!("{}/vectors/upsert", self.host);
        let response = self
            .http
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&json!({ "vectors": payload }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Pinecone upsert error ({}): {}", status, error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_injected_into_filter() {
        let filter = pinecone_filter(&Map::new(), "u1");
        assert_eq!(filter["user_id"], json!("u1"));
    }

    #[test]
    fn test_caller_filter_keys_survive_merge() {
        let mut kwargs = Map::new();
        kwargs.insert("filter".to_string(), json!({ "topic": "news" }));
        let filter = pinecone_filter(&kwargs, "u1");
        assert_eq!(filter["topic"], json!("news"));
        assert_eq!(filter["user_id"], json!("u1"));
    }

    #[test]
    fn test_caller_cannot_spoof_tenant() {
        let mut kwargs = Map::new();
        kwargs.insert("filter".to_string(), json!({ "user_id": "attacker" }));
        let filter = pinecone_filter(&kwargs, "u1");
        assert_eq!(filter["user_id"], json!("u1"));
    }

    #[test]
    fn test_filters_differ_only_in_tenant() {
        let a = pinecone_filter(&Map::new(), "a");
        let b = pinecone_filter(&Map::new(), "b");
        assert_ne!(a, b);
        let mut a_less = a.clone();
        let mut b_less = b.clone();
        a_less.remove("user_id");
        b_less.remove("user_id");
        assert_eq!(a_less, b_less);
    }
}
