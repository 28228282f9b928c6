pub mod elastic;
pub mod embedder;
pub mod mongo;
pub mod pinecone;
pub mod retriever;

pub use embedder::{resolve_embedder, TextEmbedder};
pub use retriever::{
    make_retriever, EnvRetrieverFactory, Retriever, RetrieverFactory, RetrieverProvider,
};
