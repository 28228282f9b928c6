//! Document model, pipeline state, and the reducers that fold step updates
//! into it.
//!
//! Reducers are pure: they take the prior state and an update and return a
//! new value, never mutating the caller's state in place. The graph runner
//! owns the fold.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use ai_client::Message;

// =============================================================================
// Document
// =============================================================================

/// A retrievable unit of content.
///
/// `metadata` always carries an `id` entry equal to `id` once a document has
/// passed through the reducer; after indexing it also carries `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    /// A document with no id yet; the reducer assigns one.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

// =============================================================================
// State
// =============================================================================

/// Per-run conversation state for the retrieval pipeline.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    /// Conversation messages, append-only across steps.
    pub messages: Vec<Message>,
    /// Search queries issued so far, append-only; the last one is
    /// authoritative for retrieval.
    pub queries: Vec<String>,
    /// Result of the most recent retrieval, replaced on each retrieve step.
    pub retrieved_docs: Vec<Document>,
}

/// Per-run ingestion state.
#[derive(Debug, Clone, Default)]
pub struct IndexState {
    pub docs: Vec<Document>,
}

// =============================================================================
// Document reducer
// =============================================================================

/// One element of a [`DocsUpdate::Many`] batch.
#[derive(Debug, Clone)]
pub enum DocSource {
    /// Raw text; the reducer wraps it in a fresh document.
    Text(String),
    /// A pre-built document; a missing id is filled in, a supplied one is
    /// authoritative and never overwritten.
    Doc(Document),
}

impl From<String> for DocSource {
    fn from(text: String) -> Self {
        DocSource::Text(text)
    }
}

impl From<&str> for DocSource {
    fn from(text: &str) -> Self {
        DocSource::Text(text.to_string())
    }
}

impl From<Document> for DocSource {
    fn from(doc: Document) -> Self {
        DocSource::Doc(doc)
    }
}

/// Update applied to the `docs` channel.
#[derive(Debug, Clone)]
pub enum DocsUpdate {
    /// Clear the channel. Emitted after a confirmed index write so a retried
    /// step never reprocesses the same batch.
    Delete,
    /// A single raw text.
    One(String),
    /// A batch; replaces the channel rather than extending it.
    Many(Vec<DocSource>),
}

/// Fold a docs update into the existing sequence using v4 UUIDs for
/// generated ids.
pub fn reduce_docs(existing: &[Document], update: Option<DocsUpdate>) -> Vec<Document> {
    reduce_docs_with(existing, update, || Uuid::new_v4().to_string())
}

/// Same as [`reduce_docs`] with an injectable id generator, so tests can pin
/// generated ids.
pub fn reduce_docs_with(
    existing: &[Document],
    update: Option<DocsUpdate>,
    mut new_id: impl FnMut() -> String,
) -> Vec<Document> {
    match update {
        Some(DocsUpdate::Delete) => Vec::new(),
        Some(DocsUpdate::One(text)) => vec![fresh_doc(text, new_id())],
        Some(DocsUpdate::Many(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    DocSource::Text(text) => {
                        let id = new_id();
                        out.push(fresh_doc(text, id));
                    }
                    DocSource::Doc(mut doc) => {
                        if doc.id.is_empty() {
                            doc.id = doc
                                .metadata
                                .get("id")
                                .and_then(Value::as_str)
                                .filter(|s| !s.is_empty())
                                .map(str::to_string)
                                .unwrap_or_else(&mut new_id);
                        }
                        // Mirror the id into metadata only when absent there.
                        if !doc.metadata.contains_key("id") {
                            doc.metadata
                                .insert("id".to_string(), Value::String(doc.id.clone()));
                        }
                        out.push(doc);
                    }
                }
            }
            out
        }
        None => existing.to_vec(),
    }
}

fn fresh_doc(content: String, id: String) -> Document {
    let mut metadata = Map::new();
    metadata.insert("id".to_string(), Value::String(id.clone()));
    Document {
        id,
        content,
        metadata,
    }
}

// =============================================================================
// Query reducer
// =============================================================================

/// Update applied to the `queries` channel: a scalar or a sequence.
#[derive(Debug, Clone)]
pub enum QueryUpdate {
    One(String),
    Many(Vec<String>),
}

impl From<String> for QueryUpdate {
    fn from(query: String) -> Self {
        QueryUpdate::One(query)
    }
}

impl From<&str> for QueryUpdate {
    fn from(query: &str) -> Self {
        QueryUpdate::One(query.to_string())
    }
}

impl From<Vec<String>> for QueryUpdate {
    fn from(queries: Vec<String>) -> Self {
        QueryUpdate::Many(queries)
    }
}

/// Append-only, order-preserving, no deduplication.
pub fn reduce_queries(existing: &[String], update: impl Into<QueryUpdate>) -> Vec<String> {
    let mut out = existing.to_vec();
    match update.into() {
        QueryUpdate::One(query) => out.push(query),
        QueryUpdate::Many(queries) => out.extend(queries),
    }
    out
}

// =============================================================================
// Message reducer
// =============================================================================

/// Append-only concatenation in arrival order; prior messages are never
/// rewritten.
pub fn reduce_messages(existing: &[Message], new: Vec<Message>) -> Vec<Message> {
    let mut out = existing.to_vec();
    out.extend(new);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter_ids() -> impl FnMut() -> String {
        let mut n = 0;
        move || {
            n += 1;
            format!("id-{n}")
        }
    }

    #[test]
    fn test_delete_clears_docs() {
        let existing = vec![Document::new("a").with_id("1"), Document::new("b").with_id("2")];
        assert!(reduce_docs(&existing, Some(DocsUpdate::Delete)).is_empty());
        assert!(reduce_docs(&[], Some(DocsUpdate::Delete)).is_empty());
    }

    #[test]
    fn test_single_string_becomes_one_doc() {
        let docs = reduce_docs_with(&[], Some(DocsUpdate::One("hello".into())), counter_ids());
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "hello");
        assert_eq!(docs[0].id, "id-1");
        assert_eq!(docs[0].metadata["id"], json!("id-1"));
    }

    #[test]
    fn test_generated_ids_are_nonempty_and_mirrored() {
        let docs = reduce_docs(&[], Some(DocsUpdate::One("hello".into())));
        assert!(!docs[0].id.is_empty());
        assert_eq!(docs[0].metadata["id"].as_str().unwrap(), docs[0].id);
    }

    #[test]
    fn test_mixed_batch_gets_ids_everywhere() {
        let update = DocsUpdate::Many(vec![
            "text one".into(),
            Document::new("prebuilt").into(),
            Document::new("keyed").with_id("caller-id").into(),
        ]);
        let docs = reduce_docs_with(&[], Some(update), counter_ids());
        assert_eq!(docs.len(), 3);
        for doc in &docs {
            assert!(!doc.id.is_empty());
            assert_eq!(doc.metadata["id"].as_str().unwrap(), doc.id);
        }
        assert_eq!(docs[2].id, "caller-id");
    }

    #[test]
    fn test_caller_supplied_id_is_authoritative() {
        let doc = Document::new("keep me").with_id("keep-1");
        let docs = reduce_docs_with(
            &[],
            Some(DocsUpdate::Many(vec![doc.clone().into()])),
            counter_ids(),
        );
        assert_eq!(docs[0].id, "keep-1");
        assert_eq!(docs[0].metadata["id"], json!("keep-1"));

        // Re-submitting the reduced doc changes nothing.
        let again = reduce_docs_with(
            &[],
            Some(DocsUpdate::Many(vec![docs[0].clone().into()])),
            counter_ids(),
        );
        assert_eq!(again, docs);
    }

    #[test]
    fn test_metadata_id_backfills_top_level() {
        let doc = Document::new("meta only").with_metadata("id", json!("from-meta"));
        let docs = reduce_docs_with(
            &[],
            Some(DocsUpdate::Many(vec![doc.into()])),
            counter_ids(),
        );
        assert_eq!(docs[0].id, "from-meta");
    }

    #[test]
    fn test_existing_metadata_id_is_not_overwritten() {
        // A pre-existing metadata.id wins over mirroring.
        let doc = Document::new("two ids")
            .with_id("top")
            .with_metadata("id", json!("meta"));
        let docs = reduce_docs_with(
            &[],
            Some(DocsUpdate::Many(vec![doc.into()])),
            counter_ids(),
        );
        assert_eq!(docs[0].id, "top");
        assert_eq!(docs[0].metadata["id"], json!("meta"));
    }

    #[test]
    fn test_batch_replaces_rather_than_extends() {
        let existing = vec![Document::new("old").with_id("old-1")];
        let docs = reduce_docs_with(
            &existing,
            Some(DocsUpdate::Many(vec!["new".into()])),
            counter_ids(),
        );
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "new");
    }

    #[test]
    fn test_no_update_returns_existing() {
        let existing = vec![Document::new("a").with_id("1")];
        assert_eq!(reduce_docs(&existing, None), existing);
    }

    #[test]
    fn test_queries_append_scalar_and_sequence() {
        let existing = vec!["first".to_string()];
        let one = reduce_queries(&existing, "second");
        assert_eq!(one, vec!["first", "second"]);

        let many = reduce_queries(&one, vec!["third".to_string(), "third".to_string()]);
        // order preserved, no dedup
        assert_eq!(many, vec!["first", "second", "third", "third"]);
        // input untouched
        assert_eq!(existing, vec!["first"]);
    }

    #[test]
    fn test_messages_append_in_arrival_order() {
        let existing = vec![Message::user("q")];
        let merged = reduce_messages(&existing, vec![Message::assistant("a")]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], Message::user("q"));
        assert_eq!(merged[1], Message::assistant("a"));
        assert_eq!(existing.len(), 1);
    }
}
