//! Partial updates returned by pipeline steps and the fold that applies
//! them.
//!
//! Steps never touch state directly; they emit an update, and the graph
//! runner folds it through the reducers. State in, state out, no in-place
//! mutation of the caller's value.

use ai_client::Message;
use tendril_common::{
    reduce_docs, reduce_messages, reduce_queries, AgentState, DocsUpdate, Document, IndexState,
};

/// Partial update for one channel of [`AgentState`].
#[derive(Debug, Clone)]
pub enum StateUpdate {
    /// Appended to `queries`.
    Queries(Vec<String>),
    /// Replaces `retrieved_docs` wholesale.
    RetrievedDocs(Vec<Document>),
    /// Appended to `messages`.
    Messages(Vec<Message>),
}

pub fn apply(state: &AgentState, update: StateUpdate) -> AgentState {
    match update {
        StateUpdate::Queries(queries) => AgentState {
            queries: reduce_queries(&state.queries, queries),
            ..state.clone()
        },
        StateUpdate::RetrievedDocs(docs) => AgentState {
            retrieved_docs: docs,
            ..state.clone()
        },
        StateUpdate::Messages(messages) => AgentState {
            messages: reduce_messages(&state.messages, messages),
            ..state.clone()
        },
    }
}

/// Partial update for [`IndexState`], folded through the document reducer.
pub type IndexUpdate = Option<DocsUpdate>;

pub fn apply_index(state: &IndexState, update: IndexUpdate) -> IndexState {
    IndexState {
        docs: reduce_docs(&state.docs, update),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_accumulate() {
        let state = AgentState::default();
        let state = apply(&state, StateUpdate::Queries(vec!["one".into()]));
        let state = apply(&state, StateUpdate::Queries(vec!["two".into()]));
        assert_eq!(state.queries, vec!["one", "two"]);
    }

    #[test]
    fn test_retrieved_docs_replace() {
        let state = AgentState {
            retrieved_docs: vec![Document::new("old").with_id("old")],
            ..Default::default()
        };
        let state = apply(
            &state,
            StateUpdate::RetrievedDocs(vec![Document::new("new").with_id("new")]),
        );
        assert_eq!(state.retrieved_docs.len(), 1);
        assert_eq!(state.retrieved_docs[0].id, "new");
    }

    #[test]
    fn test_messages_append() {
        let state = AgentState {
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let state = apply(&state, StateUpdate::Messages(vec![Message::assistant("hello")]));
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn test_apply_leaves_input_untouched() {
        let state = AgentState::default();
        let _ = apply(&state, StateUpdate::Queries(vec!["q".into()]));
        assert!(state.queries.is_empty());
    }

    #[test]
    fn test_index_delete_clears() {
        let state = IndexState {
            docs: vec![Document::new("a").with_id("1")],
        };
        let state = apply_index(&state, Some(DocsUpdate::Delete));
        assert!(state.docs.is_empty());
    }
}
