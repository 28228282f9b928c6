//! The retriever seam and the multi-backend factory.
//!
//! A retriever is constructed fresh per call: configuration (including the
//! tenant) can differ per request, and nothing here may be cached across
//! tenants. Connection pooling lives inside the HTTP/driver clients.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use tendril_common::{Document, IndexConfiguration, ProviderEnv, TendrilError};

use crate::elastic::ElasticRetriever;
use crate::embedder::{resolve_embedder, TextEmbedder};
use crate::mongo::MongoRetriever;
use crate::pinecone::PineconeRetriever;

// =============================================================================
// Retriever Trait
// =============================================================================

/// Similarity query and document upsert over one vector-store backend,
/// tenant-scoped at construction.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn query(&self, text: &str) -> Result<Vec<Document>>;
    async fn add_documents(&self, docs: &[Document]) -> Result<()>;
}

// =============================================================================
// Provider dispatch
// =============================================================================

/// The closed set of vector-store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieverProvider {
    Elastic,
    ElasticLocal,
    Pinecone,
    Mongodb,
}

impl RetrieverProvider {
    pub fn parse(value: &str) -> Result<Self, TendrilError> {
        match value {
            "elastic" => Ok(Self::Elastic),
            "elastic-local" => Ok(Self::ElasticLocal),
            "pinecone" => Ok(Self::Pinecone),
            "mongodb" => Ok(Self::Mongodb),
            other => Err(TendrilError::UnsupportedProvider(other.to_string())),
        }
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Construct a retriever for the configured backend.
///
/// This is the single tenant-isolation gate: an empty `user_id` is rejected
/// here, and every backend below folds `user_id` into its filter last so
/// caller-supplied search options can never override it.
pub async fn make_retriever(
    config: &IndexConfiguration,
    env: &ProviderEnv,
    embedder: Arc<dyn TextEmbedder>,
) -> Result<Box<dyn Retriever>, TendrilError> {
    if config.user_id.is_empty() {
        return Err(TendrilError::MissingTenant);
    }

    let provider = RetrieverProvider::parse(&config.retriever_provider)?;
    debug!(?provider, user_id = %config.user_id, "constructing retriever");

    match provider {
        RetrieverProvider::Elastic => {
            Ok(Box::new(ElasticRetriever::new(config, env, false, embedder)?))
        }
        RetrieverProvider::ElasticLocal => {
            Ok(Box::new(ElasticRetriever::new(config, env, true, embedder)?))
        }
        RetrieverProvider::Pinecone => {
            Ok(Box::new(PineconeRetriever::connect(config, env, embedder).await?))
        }
        RetrieverProvider::Mongodb => {
            Ok(Box::new(MongoRetriever::connect(config, env, embedder).await?))
        }
    }
}

// =============================================================================
// Factory seam for the pipeline
// =============================================================================

/// Per-step retriever construction, injectable so pipeline tests can swap in
/// an in-memory fake.
#[async_trait]
pub trait RetrieverFactory: Send + Sync {
    async fn make(&self, config: &IndexConfiguration) -> Result<Box<dyn Retriever>, TendrilError>;
}

/// Default factory: resolves the embedder from the configuration and builds
/// the configured backend against the process environment snapshot.
pub struct EnvRetrieverFactory {
    env: ProviderEnv,
}

impl EnvRetrieverFactory {
    pub fn new(env: ProviderEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl RetrieverFactory for EnvRetrieverFactory {
    async fn make(&self, config: &IndexConfiguration) -> Result<Box<dyn Retriever>, TendrilError> {
        // Tenant gate before embedder resolution so a missing credential
        // never masks the missing-tenant misconfiguration.
        if config.user_id.is_empty() {
            return Err(TendrilError::MissingTenant);
        }
        let embedder = resolve_embedder(&config.embedding_model, &self.env)?;
        make_retriever(config, &self.env, embedder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct NoopEmbedder;

    #[async_trait]
    impl TextEmbedder for NoopEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 3])
        }

        async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 3]).collect())
        }
    }

    fn config(user_id: &str, provider: &str) -> IndexConfiguration {
        IndexConfiguration::resolve(&json!({
            "user_id": user_id,
            "retriever_provider": provider,
        }))
    }

    fn elastic_env() -> ProviderEnv {
        ProviderEnv {
            elasticsearch_url: Some("http://localhost:9200".to_string()),
            elasticsearch_api_key: Some("key".to_string()),
            elasticsearch_user: Some("elastic".to_string()),
            elasticsearch_password: Some("changeme".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_tenant_rejected_for_every_provider() {
        for provider in ["elastic", "elastic-local", "pinecone", "mongodb", "bogus"] {
            let err = make_retriever(&config("", provider), &elastic_env(), Arc::new(NoopEmbedder))
                .await
                .err()
                .expect("empty user_id must be rejected");
            assert!(
                matches!(err, TendrilError::MissingTenant),
                "provider {provider} did not hit the tenant gate"
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_provider_names_the_value() {
        let err = make_retriever(&config("u1", "bogus"), &elastic_env(), Arc::new(NoopEmbedder))
            .await
            .err()
            .unwrap();
        match err {
            TendrilError::UnsupportedProvider(value) => assert_eq!(value, "bogus"),
            other => panic!("expected UnsupportedProvider, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_elastic_requires_url_and_api_key() {
        let err = make_retriever(
            &config("u1", "elastic"),
            &ProviderEnv::default(),
            Arc::new(NoopEmbedder),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, TendrilError::MissingCredential("ELASTICSEARCH_URL")));

        let env = ProviderEnv {
            elasticsearch_url: Some("http://localhost:9200".to_string()),
            ..Default::default()
        };
        let err = make_retriever(&config("u1", "elastic"), &env, Arc::new(NoopEmbedder))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            TendrilError::MissingCredential("ELASTICSEARCH_API_KEY")
        ));
    }

    #[tokio::test]
    async fn test_elastic_local_requires_user_and_password() {
        let env = ProviderEnv {
            elasticsearch_url: Some("http://localhost:9200".to_string()),
            elasticsearch_user: Some("elastic".to_string()),
            ..Default::default()
        };
        let err = make_retriever(&config("u1", "elastic-local"), &env, Arc::new(NoopEmbedder))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            TendrilError::MissingCredential("ELASTICSEARCH_PASSWORD")
        ));
    }

    #[tokio::test]
    async fn test_pinecone_requires_index_name() {
        let env = ProviderEnv {
            pinecone_api_key: Some("pc-test".to_string()),
            ..Default::default()
        };
        let err = make_retriever(&config("u1", "pinecone"), &env, Arc::new(NoopEmbedder))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TendrilError::MissingIndex("PINECONE_INDEX_NAME")));
    }

    #[tokio::test]
    async fn test_mongodb_requires_uri() {
        let err = make_retriever(
            &config("u1", "mongodb"),
            &ProviderEnv::default(),
            Arc::new(NoopEmbedder),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, TendrilError::MissingCredential("MONGODB_ATLAS_URI")));
    }

    #[tokio::test]
    async fn test_elastic_construction_succeeds_with_credentials() {
        let built = make_retriever(
            &config("u1", "elastic"),
            &elastic_env(),
            Arc::new(NoopEmbedder),
        )
        .await;
        assert!(built.is_ok());

        let built = make_retriever(
            &config("u1", "elastic-local"),
            &elastic_env(),
            Arc::new(NoopEmbedder),
        )
        .await;
        assert!(built.is_ok());
    }
}
