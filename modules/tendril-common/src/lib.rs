pub mod config;
pub mod error;
pub mod prompts;
pub mod state;

pub use config::{Configuration, IndexConfiguration, ProviderEnv};
pub use error::TendrilError;
pub use state::{
    reduce_docs, reduce_docs_with, reduce_messages, reduce_queries, AgentState, DocSource,
    DocsUpdate, Document, IndexState, QueryUpdate,
};
