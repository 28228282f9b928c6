pub mod chat;
pub mod format;
pub mod graph;
pub mod steps;
pub mod update;

pub use chat::{ChatModel, LiveChatModel, SearchQuery};
pub use graph::{IndexGraph, RetrievalGraph};
pub use update::{IndexUpdate, StateUpdate};
