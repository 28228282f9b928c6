//! Elasticsearch backend: kNN search plus bulk indexing over the REST API.
//!
//! The hosted variant authenticates with an API key, the local variant with
//! username/password. Both share the filter and wire format.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use tendril_common::{Document, IndexConfiguration, ProviderEnv, TendrilError};

use crate::embedder::TextEmbedder;
use crate::retriever::Retriever;

const ELASTIC_INDEX: &str = "tendril_index";
const DEFAULT_K: usize = 4;

pub(crate) enum ElasticAuth {
    ApiKey(String),
    Basic { user: String, password: String },
}

impl ElasticAuth {
    fn resolve(env: &ProviderEnv, local: bool) -> Result<Self, TendrilError> {
        if local {
            Ok(Self::Basic {
                user: env
                    .elasticsearch_user
                    .clone()
                    .ok_or(TendrilError::MissingCredential("ELASTICSEARCH_USER"))?,
                password: env
                    .elasticsearch_password
                    .clone()
                    .ok_or(TendrilError::MissingCredential("ELASTICSEARCH_PASSWORD"))?,
            })
        } else {
            Ok(Self::ApiKey(env.elasticsearch_api_key.clone().ok_or(
                TendrilError::MissingCredential("ELASTICSEARCH_API_KEY"),
            )?))
        }
    }
}

/// Merge caller-supplied filter clauses with the tenant constraint.
///
/// The tenant term is pushed last; the clauses are ANDed, so a caller clause
/// can narrow the result set but never widen it past the tenant.
pub(crate) fn elastic_filter(search_kwargs: &Map<String, Value>, user_id: &str) -> Vec<Value> {
    let mut clauses: Vec<Value> = search_kwargs
        .get("filter")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    clauses.push(json!({ "term": { "metadata.user_id": user_id } }));
    clauses
}

pub(crate) fn search_k(search_kwargs: &Map<String, Value>) -> usize {
    search_kwargs
        .get("k")
        .and_then(Value::as_u64)
        .map(|k| k as usize)
        .unwrap_or(DEFAULT_K)
}

/// Candidate pool for approximate kNN: 10x the requested size, floor of 50.
/// `k` comes straight from caller options, so the multiply must saturate.
pub(crate) fn num_candidates(k: usize) -> usize {
    k.saturating_mul(10).max(50)
}

pub struct ElasticRetriever {
    http: reqwest::Client,
    url: String,
    auth: ElasticAuth,
    filter: Vec<Value>,
    k: usize,
    embedder: Arc<dyn TextEmbedder>,
}

impl ElasticRetriever {
    pub(crate) fn new(
        config: &IndexConfiguration,
        env: &ProviderEnv,
        local: bool,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Result<Self, TendrilError> {
        let url = env
            .elasticsearch_url
            .clone()
            .ok_or(TendrilError::MissingCredential("ELASTICSEARCH_URL"))?;
        let auth = ElasticAuth::resolve(env, local)?;

        Ok(Self {
            http: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            auth,
            filter: elastic_filter(&config.search_kwargs, &config.user_id),
            k: search_k(&config.search_kwargs),
            embedder,
        })
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            ElasticAuth::ApiKey(key) => request.header("Authorization", format!("ApiKey {key}")),
            ElasticAuth::Basic { user, password } => request.basic_auth(user, Some(password)),
        }
    }
}

#[async_trait]
impl Retriever for ElasticRetriever {
    async fn query(&self, text: &str) -> Result<Vec<Document>> {
        let vector = self.embedder.embed(text).await?;

        let body = json!({
            "knn": {
                "field": "vector",
                "query_vector": vector,
                "k": self.k,
                "num_candidates": num_candidates(self.k),
                "filter": { "bool": { "filter": self.filter } },
            },
            "size": self.k,
            "_source": ["content", "metadata"],
        });

        debug!(k = self.k, "Elasticsearch kNN query");

        let url = format!("{}/{}/_search", self.url, ELASTIC_INDEX);
        let response = self.authed(self.http.post(&url)).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Elasticsearch error ({}): {}", status, error_text));
        }

        let body: Value = response.json().await?;
        let hits = body["hits"]["hits"].as_array().cloned().unwrap_or_default();

        Ok(hits
            .into_iter()
            .map(|hit| Document {
                id: hit["_id"].as_str().unwrap_or_default().to_string(),
                content: hit["_source"]["content"].as_str().unwrap_or_default().to_string(),
                metadata: hit["_source"]["metadata"]
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn add_documents(&self, docs: &[Document]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.embed_batch(texts).await?;

        let mut body = String::new();
        for (doc, vector) in docs.iter().zip(vectors.iter()) {
            let action = json!({ "index": { "_index": ELASTIC_INDEX, "_id": doc.id } });
            let source = json!({
                "content": doc.content,
                "metadata": doc.metadata,
                "vector": vector,
            });
            body.push_str(&serde_json::to_string(&action)?);
            body.push('\n');
            body.push_str(&serde_json::to_string(&source)?);
            body.push('\n');
        }

        debug!(count = docs.len(), "Elasticsearch bulk index");

        let url = format!("{}/_bulk?refresh=true", self.url);
        let response = self
            .authed(self.http.post(&url))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Elasticsearch bulk error ({}): {}", status, error_text));
        }

        let result: Value = response.json().await?;
        if result["errors"].as_bool().unwrap_or(false) {
            return Err(anyhow!("Elasticsearch bulk index reported item errors"));
        }

        Ok(())
    }
}
