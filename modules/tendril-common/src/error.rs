use thiserror::Error;

#[derive(Error, Debug)]
pub enum TendrilError {
    #[error("missing user_id: retrieval and indexing require a tenant")]
    MissingTenant,

    #[error("{0} environment variable is required")]
    MissingCredential(&'static str),

    #[error("{0} environment variable is not set")]
    MissingIndex(&'static str),

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
