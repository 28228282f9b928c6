//! The pipeline steps. Each step reads state and emits a partial update;
//! resolver and factory errors propagate unmodified.

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use ai_client::Message;
use tendril_common::{prompts, AgentState, Configuration, DocsUpdate, Document, IndexConfiguration, IndexState};
use tendril_retrieval::RetrieverFactory;

use crate::chat::ChatModel;
use crate::format::format_docs;
use crate::update::{IndexUpdate, StateUpdate};

/// Produce the next search query.
///
/// A single-message conversation is the common first turn; its text is used
/// verbatim with no model call. Otherwise the query model is asked for a
/// structured query, with prior queries in the system prompt for context.
pub async fn generate_query(
    state: &AgentState,
    config: &Configuration,
    chat: &dyn ChatModel,
) -> Result<StateUpdate> {
    if state.messages.len() == 1 {
        let text = state.messages[0].content.clone();
        debug!("single-turn conversation; using input as query");
        return Ok(StateUpdate::Queries(vec![text]));
    }

    let system = prompts::render(
        &config.query_system_prompt,
        &[
            ("queries", &state.queries.join("\n- ")),
            ("system_time", &Utc::now().to_rfc3339()),
        ],
    );

    let mut messages = vec![Message::system(system)];
    messages.extend(state.messages.iter().cloned());

    let query = chat.search_query(&config.query_model, &messages).await?;
    info!(query = %query, "generated search query");
    Ok(StateUpdate::Queries(vec![query]))
}

/// Retrieve documents for the most recent query. The update replaces any
/// previously retrieved documents.
pub async fn retrieve(
    state: &AgentState,
    config: &IndexConfiguration,
    retrievers: &dyn RetrieverFactory,
) -> Result<StateUpdate> {
    let query = state
        .queries
        .last()
        .ok_or_else(|| anyhow!("retrieve called with no query in state"))?;

    let retriever = retrievers.make(config).await?;
    let docs = retriever.query(query).await?;
    info!(count = docs.len(), "retrieved documents");
    Ok(StateUpdate::RetrievedDocs(docs))
}

/// Answer the conversation conditioned on the retrieved documents.
pub async fn respond(
    state: &AgentState,
    config: &Configuration,
    chat: &dyn ChatModel,
) -> Result<StateUpdate> {
    let system = prompts::render(
        &config.response_system_prompt,
        &[
            ("retrieved_docs", &format_docs(&state.retrieved_docs)),
            ("system_time", &Utc::now().to_rfc3339()),
        ],
    );

    let mut messages = vec![Message::system(system)];
    messages.extend(state.messages.iter().cloned());

    let answer = chat.complete(&config.response_model, &messages).await?;
    Ok(StateUpdate::Messages(vec![Message::assistant(answer)]))
}

/// Write the buffered documents into the vector store, stamped with the
/// resolved tenant.
///
/// The clearing `Delete` update is emitted only after the write confirmed;
/// on failure the buffer survives so ingestion can be retried as-is.
pub async fn index_docs(
    state: &IndexState,
    config: &IndexConfiguration,
    retrievers: &dyn RetrieverFactory,
) -> Result<IndexUpdate> {
    let retriever = retrievers.make(config).await?;
    let stamped = stamp_user_id(&state.docs, &config.user_id);

    retriever.add_documents(&stamped).await?;
    info!(count = stamped.len(), user_id = %config.user_id, "indexed documents");
    Ok(Some(DocsUpdate::Delete))
}

/// Stamp the tenant into every document's metadata, overwriting any
/// caller-supplied `user_id` so tenancy cannot be spoofed through document
/// payloads.
pub fn stamp_user_id(docs: &[Document], user_id: &str) -> Vec<Document> {
    docs.iter()
        .cloned()
        .map(|mut doc| {
            doc.metadata
                .insert("user_id".to_string(), Value::String(user_id.to_string()));
            doc
        })
        .collect()
}
