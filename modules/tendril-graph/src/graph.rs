//! Sequential graph runners.
//!
//! The retrieval graph is a fixed three-step pipe (generate_query →
//! retrieve → respond); the index graph is a single step. Each runner owns
//! the fold: a step's update is applied before the next step observes
//! state, and a failed step leaves state exactly as the prior step left it.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use ai_client::Message;
use tendril_common::{AgentState, Configuration, DocsUpdate, IndexConfiguration, IndexState, ProviderEnv};
use tendril_retrieval::{EnvRetrieverFactory, RetrieverFactory};

use crate::chat::{ChatModel, LiveChatModel};
use crate::steps;
use crate::update;

// =============================================================================
// Retrieval Graph
// =============================================================================

pub struct RetrievalGraph {
    config: Configuration,
    chat: Arc<dyn ChatModel>,
    retrievers: Arc<dyn RetrieverFactory>,
}

impl RetrievalGraph {
    pub fn new(config: Configuration, env: ProviderEnv) -> Self {
        Self {
            config,
            chat: Arc::new(LiveChatModel::new(env.clone())),
            retrievers: Arc::new(EnvRetrieverFactory::new(env)),
        }
    }

    /// Swap the chat-model seam (used by tests and embedders of the graph).
    pub fn with_chat(mut self, chat: Arc<dyn ChatModel>) -> Self {
        self.chat = chat;
        self
    }

    /// Swap the retriever factory seam.
    pub fn with_retrievers(mut self, retrievers: Arc<dyn RetrieverFactory>) -> Self {
        self.retrievers = retrievers;
        self
    }

    /// Run the full pipeline over an input conversation and return the final
    /// state. The answer is the last message.
    pub async fn invoke(&self, messages: Vec<Message>) -> Result<AgentState> {
        let mut state = AgentState {
            messages,
            ..Default::default()
        };

        debug!("step: generate_query");
        let queries = steps::generate_query(&state, &self.config, self.chat.as_ref()).await?;
        state = update::apply(&state, queries);

        debug!("step: retrieve");
        let index_config = self.config.index_config();
        let retrieved = steps::retrieve(&state, &index_config, self.retrievers.as_ref()).await?;
        state = update::apply(&state, retrieved);

        debug!("step: respond");
        let answer = steps::respond(&state, &self.config, self.chat.as_ref()).await?;
        Ok(update::apply(&state, answer))
    }
}

// =============================================================================
// Index Graph
// =============================================================================

pub struct IndexGraph {
    config: IndexConfiguration,
    retrievers: Arc<dyn RetrieverFactory>,
}

impl IndexGraph {
    pub fn new(config: IndexConfiguration, env: ProviderEnv) -> Self {
        Self {
            config,
            retrievers: Arc::new(EnvRetrieverFactory::new(env)),
        }
    }

    pub fn with_retrievers(mut self, retrievers: Arc<dyn RetrieverFactory>) -> Self {
        self.retrievers = retrievers;
        self
    }

    /// Fold the docs update into fresh state, index the result, and clear
    /// the buffer once the write is confirmed.
    pub async fn invoke(&self, docs: DocsUpdate) -> Result<IndexState> {
        let state = update::apply_index(&IndexState::default(), Some(docs));

        debug!(count = state.docs.len(), "step: index_docs");
        let cleared = steps::index_docs(&state, &self.config, self.retrievers.as_ref()).await?;
        Ok(update::apply_index(&state, cleared))
    }
}
