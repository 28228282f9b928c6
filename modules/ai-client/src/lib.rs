pub mod claude;
pub mod cohere;
pub mod openai;
pub mod traits;

pub use claude::Claude;
pub use cohere::Cohere;
pub use openai::OpenAi;
pub use traits::{ChatAgent, EmbedAgent, Message, MessageRole};

/// Split a `provider/model` identifier on the first `/`.
///
/// A bare model name (no `/`) defaults the provider to `openai`.
pub fn split_model_name(name: &str) -> (&str, &str) {
    match name.split_once('/') {
        Some((provider, model)) => (provider, model),
        None => ("openai", name),
    }
}
