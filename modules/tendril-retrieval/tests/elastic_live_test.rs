//! Live round-trip against a local Elasticsearch.
//! Requires a running instance. Set ELASTICSEARCH_TEST_URL or this test is skipped.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use tendril_common::{IndexConfiguration, ProviderEnv};
use tendril_retrieval::{make_retriever, TextEmbedder};

/// Deterministic embedder: maps text length into a tiny vector so nearest
/// neighbor search behaves predictably without a model behind it.
#[derive(Debug)]
struct HashEmbedder;

#[async_trait]
impl TextEmbedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let n = text.len() as f32;
        Ok(vec![n, n * 0.5, 1.0])
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::new();
        for text in &texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

#[tokio::test]
async fn test_elastic_roundtrip_isolates_tenants() {
    let Ok(url) = std::env::var("ELASTICSEARCH_TEST_URL") else {
        eprintln!("ELASTICSEARCH_TEST_URL not set; skipping live test");
        return;
    };

    let env = ProviderEnv {
        elasticsearch_url: Some(url),
        elasticsearch_user: Some(
            std::env::var("ELASTICSEARCH_USER").unwrap_or_else(|_| "elastic".into()),
        ),
        elasticsearch_password: Some(
            std::env::var("ELASTICSEARCH_PASSWORD").unwrap_or_else(|_| "changeme".into()),
        ),
        ..Default::default()
    };

    let config_a = IndexConfiguration::resolve(&json!({
        "user_id": "live-tenant-a",
        "retriever_provider": "elastic-local",
    }));
    let config_b = IndexConfiguration::resolve(&json!({
        "user_id": "live-tenant-b",
        "retriever_provider": "elastic-local",
    }));

    let retriever_a = make_retriever(&config_a, &env, Arc::new(HashEmbedder))
        .await
        .expect("construct tenant-a retriever");
    let retriever_b = make_retriever(&config_b, &env, Arc::new(HashEmbedder))
        .await
        .expect("construct tenant-b retriever");

    let doc = tendril_common::Document::new("tenant a private note").with_id("live-a-1");
    let mut stamped = doc.clone();
    stamped
        .metadata
        .insert("user_id".into(), json!("live-tenant-a"));
    retriever_a
        .add_documents(&[stamped])
        .await
        .expect("index tenant-a doc");

    let found_a = retriever_a
        .query("tenant a private note")
        .await
        .expect("query tenant a");
    assert!(found_a.iter().any(|d| d.id == "live-a-1"));

    let found_b = retriever_b
        .query("tenant a private note")
        .await
        .expect("query tenant b");
    assert!(
        !found_b.iter().any(|d| d.id == "live-a-1"),
        "tenant b must never see tenant a's documents"
    );
}
