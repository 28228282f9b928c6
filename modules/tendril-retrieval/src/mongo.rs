//! MongoDB Atlas backend using `$vectorSearch`.
//!
//! Each tenant's documents live in a tenant-specific collection under a
//! fixed database prefix, in addition to the `user_id` pre-filter applied to
//! every search.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, to_bson, Document as BsonDocument};
use mongodb::{Client, Collection};
use serde_json::{Map, Value};
use tracing::debug;

use tendril_common::{Document, IndexConfiguration, ProviderEnv, TendrilError};

use crate::elastic::{num_candidates, search_k};
use crate::embedder::TextEmbedder;
use crate::retriever::Retriever;

const NAMESPACE_PREFIX: &str = "tendril_retrieval";

/// Database and collection for a tenant: the database is fixed, the
/// collection is the tenant id.
pub(crate) fn mongo_namespace(user_id: &str) -> (String, String) {
    (NAMESPACE_PREFIX.to_string(), user_id.to_string())
}

/// Merge caller-supplied pre-filter with an equality constraint on
/// `user_id`, tenant inserted last.
pub(crate) fn mongo_pre_filter(
    search_kwargs: &Map<String, Value>,
    user_id: &str,
) -> Result<BsonDocument> {
    let mut filter = match search_kwargs.get("pre_filter").and_then(Value::as_object) {
        Some(obj) => mongodb::bson::to_document(&Value::Object(obj.clone()))
            .context("invalid pre_filter in search_kwargs")?,
        None => doc! {},
    };
    filter.insert("user_id", doc! { "$eq": user_id });
    Ok(filter)
}

pub struct MongoRetriever {
    collection: Collection<BsonDocument>,
    index_name: String,
    pre_filter: BsonDocument,
    k: usize,
    embedder: Arc<dyn TextEmbedder>,
}

impl MongoRetriever {
    pub(crate) async fn connect(
        config: &IndexConfiguration,
        env: &ProviderEnv,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Result<Self, TendrilError> {
        let uri = env
            .mongodb_atlas_uri
            .clone()
            .ok_or(TendrilError::MissingCredential("MONGODB_ATLAS_URI"))?;
        let index_name = env
            .mongodb_index_name
            .clone()
            .ok_or(TendrilError::MissingIndex("MONGODB_INDEX_NAME"))?;

        let client = Client::with_uri_str(&uri)
            .await
            .context("connecting to MongoDB Atlas")?;

        let (db, coll) = mongo_namespace(&config.user_id);
        debug!(db = %db, collection = %coll, "MongoDB namespace");

        Ok(Self {
            collection: client.database(&db).collection::<BsonDocument>(&coll),
            index_name,
            pre_filter: mongo_pre_filter(&config.search_kwargs, &config.user_id)?,
            k: search_k(&config.search_kwargs),
            embedder,
        })
    }
}

#[async_trait]
impl Retriever for MongoRetriever {
    async fn query(&self, text: &str) -> Result<Vec<Document>> {
        let vector = self.embedder.embed(text).await?;

        let pipeline = vec![
            doc! {
                "$vectorSearch": {
                    "index": &self.index_name,
                    "path": "embedding",
                    "queryVector": to_bson(&vector)?,
                    "numCandidates": num_candidates(self.k) as i64,
                    "limit": self.k as i64,
                    "filter": self.pre_filter.clone(),
                }
            },
            doc! { "$project": { "_id": 0, "embedding": 0 } },
        ];

        debug!(k = self.k, "MongoDB vector search");

        let mut cursor = self
            .collection
            .aggregate(pipeline)
            .await
            .context("MongoDB vector search failed")?;

        let mut docs = Vec::new();
        while let Some(found) = cursor.try_next().await? {
            docs.push(from_stored(found)?);
        }
        Ok(docs)
    }

    async fn add_documents(&self, docs: &[Document]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.embed_batch(texts).await?;

        let stored: Vec<BsonDocument> = docs
            .iter()
            .zip(vectors.iter())
            .map(|(document, vector)| {
                Ok(doc! {
                    "id": &document.id,
                    "text": &document.content,
                    "metadata": mongodb::bson::to_document(&Value::Object(document.metadata.clone()))?,
                    "embedding": to_bson(vector)?,
                })
            })
            .collect::<Result<_>>()?;

        debug!(count = stored.len(), "MongoDB insert");

        self.collection
            .insert_many(stored)
            .await
            .context("MongoDB insert failed")?;
        Ok(())
    }
}

fn from_stored(stored: BsonDocument) -> Result<Document> {
    let metadata = stored
        .get_document("metadata")
        .ok()
        .map(|m| serde_json::to_value(m))
        .transpose()?
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();

    Ok(Document {
        id: stored.get_str("id").unwrap_or_default().to_string(),
        content: stored.get_str("text").unwrap_or_default().to_string(),
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespace_is_tenant_scoped() {
        assert_eq!(
            mongo_namespace("u1"),
            ("tendril_retrieval".to_string(), "u1".to_string())
        );
        assert_ne!(mongo_namespace("a").1, mongo_namespace("b").1);
    }

    #[test]
    fn test_pre_filter_constrains_tenant() {
        let filter = mongo_pre_filter(&Map::new(), "u1").unwrap();
        assert_eq!(filter.get_document("user_id").unwrap().get_str("$eq").unwrap(), "u1");
    }

    #[test]
    fn test_caller_options_merge_but_never_spoof_tenant() {
        let mut kwargs = Map::new();
        kwargs.insert(
            "pre_filter".to_string(),
            json!({ "topic": { "$eq": "news" }, "user_id": { "$eq": "attacker" } }),
        );
        let filter = mongo_pre_filter(&kwargs, "u1").unwrap();
        assert_eq!(filter.get_document("topic").unwrap().get_str("$eq").unwrap(), "news");
        assert_eq!(filter.get_document("user_id").unwrap().get_str("$eq").unwrap(), "u1");
    }
}
