//! Typed configuration resolved from an untyped options map, plus the
//! environment snapshot taken once at the process boundary.

use std::env;

use serde_json::{Map, Value};

use crate::prompts;

pub const DEFAULT_EMBEDDING_MODEL: &str = "openai/text-embedding-3-small";
pub const DEFAULT_RETRIEVER_PROVIDER: &str = "elastic";
pub const DEFAULT_RESPONSE_MODEL: &str = "anthropic/claude-3-5-sonnet-20240620";
pub const DEFAULT_QUERY_MODEL: &str = "openai/gpt-4o-mini";

/// Shared-tenant id for documents indexed without an explicit user.
pub const DEFAULT_TENANT: &str = "default";

/// Configuration for indexing and retrieval against the vector store.
///
/// `user_id` stays empty when the caller supplied none; the retriever
/// factory is the first point that requires a tenant and rejects an empty
/// value there, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfiguration {
    pub user_id: String,
    pub embedding_model: String,
    pub retriever_provider: String,
    pub search_kwargs: Map<String, Value>,
}

impl IndexConfiguration {
    /// Resolve from an untyped options map, applying defaults for every
    /// absent field. Pure and infallible: unknown keys and wrongly-typed
    /// values are ignored in favor of the default.
    pub fn resolve(options: &Value) -> Self {
        Self {
            user_id: str_field(options, "user_id").unwrap_or_default(),
            embedding_model: str_field(options, "embedding_model")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            retriever_provider: str_field(options, "retriever_provider")
                .unwrap_or_else(|| DEFAULT_RETRIEVER_PROVIDER.to_string()),
            search_kwargs: map_field(options, "search_kwargs"),
        }
    }

    /// Fall back to the shared `default` tenant when no user was supplied.
    /// Only ingestion of shared documents opts into this.
    pub fn or_default_tenant(mut self) -> Self {
        if self.user_id.is_empty() {
            self.user_id = DEFAULT_TENANT.to_string();
        }
        self
    }
}

/// Full agent configuration: the index subset plus prompts and chat models.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub user_id: String,
    pub embedding_model: String,
    pub retriever_provider: String,
    pub search_kwargs: Map<String, Value>,
    pub response_system_prompt: String,
    pub response_model: String,
    pub query_system_prompt: String,
    pub query_model: String,
}

impl Configuration {
    pub fn resolve(options: &Value) -> Self {
        let index = IndexConfiguration::resolve(options);
        Self {
            user_id: index.user_id,
            embedding_model: index.embedding_model,
            retriever_provider: index.retriever_provider,
            search_kwargs: index.search_kwargs,
            response_system_prompt: str_field(options, "response_system_prompt")
                .unwrap_or_else(|| prompts::RESPONSE_SYSTEM_PROMPT.to_string()),
            response_model: str_field(options, "response_model")
                .unwrap_or_else(|| DEFAULT_RESPONSE_MODEL.to_string()),
            query_system_prompt: str_field(options, "query_system_prompt")
                .unwrap_or_else(|| prompts::QUERY_SYSTEM_PROMPT.to_string()),
            query_model: str_field(options, "query_model")
                .unwrap_or_else(|| DEFAULT_QUERY_MODEL.to_string()),
        }
    }

    /// The index-facing subset handed to the retriever factory.
    pub fn index_config(&self) -> IndexConfiguration {
        IndexConfiguration {
            user_id: self.user_id.clone(),
            embedding_model: self.embedding_model.clone(),
            retriever_provider: self.retriever_provider.clone(),
            search_kwargs: self.search_kwargs.clone(),
        }
    }
}

fn str_field(options: &Value, key: &str) -> Option<String> {
    options
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn map_field(options: &Value, key: &str) -> Map<String, Value> {
    options
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

// =============================================================================
// ProviderEnv
// =============================================================================

/// Backend credentials and endpoints, read from the environment exactly once
/// at the process boundary and passed down explicitly. Absence of a value is
/// reported by the component that first needs it, not here.
#[derive(Debug, Clone, Default)]
pub struct ProviderEnv {
    pub elasticsearch_url: Option<String>,
    pub elasticsearch_api_key: Option<String>,
    pub elasticsearch_user: Option<String>,
    pub elasticsearch_password: Option<String>,
    pub pinecone_api_key: Option<String>,
    pub pinecone_index_name: Option<String>,
    pub mongodb_atlas_uri: Option<String>,
    pub mongodb_index_name: Option<String>,
    pub openai_api_key: Option<String>,
    pub cohere_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
}

impl ProviderEnv {
    pub fn from_env() -> Self {
        Self {
            elasticsearch_url: optional_env("ELASTICSEARCH_URL"),
            elasticsearch_api_key: optional_env("ELASTICSEARCH_API_KEY"),
            elasticsearch_user: optional_env("ELASTICSEARCH_USER"),
            elasticsearch_password: optional_env("ELASTICSEARCH_PASSWORD"),
            pinecone_api_key: optional_env("PINECONE_API_KEY"),
            pinecone_index_name: optional_env("PINECONE_INDEX_NAME"),
            mongodb_atlas_uri: optional_env("MONGODB_ATLAS_URI"),
            mongodb_index_name: optional_env("MONGODB_INDEX_NAME"),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            cohere_api_key: optional_env("COHERE_API_KEY"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_empty_returns_all_defaults() {
        let config = Configuration::resolve(&json!({}));
        assert_eq!(config.user_id, "");
        assert_eq!(config.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.retriever_provider, DEFAULT_RETRIEVER_PROVIDER);
        assert!(config.search_kwargs.is_empty());
        assert_eq!(config.response_model, DEFAULT_RESPONSE_MODEL);
        assert_eq!(config.query_model, DEFAULT_QUERY_MODEL);
        assert_eq!(config.response_system_prompt, prompts::RESPONSE_SYSTEM_PROMPT);
        assert_eq!(config.query_system_prompt, prompts::QUERY_SYSTEM_PROMPT);
    }

    #[test]
    fn test_resolve_overrides_take_precedence() {
        let config = Configuration::resolve(&json!({
            "user_id": "u1",
            "retriever_provider": "pinecone",
        }));
        assert_eq!(config.user_id, "u1");
        assert_eq!(config.retriever_provider, "pinecone");
        // everything else stays at default
        assert_eq!(config.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.response_model, DEFAULT_RESPONSE_MODEL);
    }

    #[test]
    fn test_resolve_search_kwargs_passed_verbatim() {
        let config = IndexConfiguration::resolve(&json!({
            "search_kwargs": { "k": 8, "filter": { "topic": "news" } },
        }));
        assert_eq!(config.search_kwargs["k"], json!(8));
        assert_eq!(config.search_kwargs["filter"]["topic"], json!("news"));
    }

    #[test]
    fn test_resolve_ignores_wrongly_typed_values() {
        let config = IndexConfiguration::resolve(&json!({
            "embedding_model": 17,
            "search_kwargs": "not a map",
        }));
        assert_eq!(config.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert!(config.search_kwargs.is_empty());
    }

    #[test]
    fn test_or_default_tenant() {
        let config = IndexConfiguration::resolve(&json!({})).or_default_tenant();
        assert_eq!(config.user_id, DEFAULT_TENANT);

        let config = IndexConfiguration::resolve(&json!({ "user_id": "u2" })).or_default_tenant();
        assert_eq!(config.user_id, "u2");
    }

    #[test]
    fn test_index_config_subset() {
        let config = Configuration::resolve(&json!({ "user_id": "u1" }));
        let index = config.index_config();
        assert_eq!(index.user_id, "u1");
        assert_eq!(index.retriever_provider, config.retriever_provider);
    }
}
