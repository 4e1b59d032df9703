//! Generation and embedding providers.
//!
//! - `provider`: the `LlmProvider` contract and request/response types
//! - `anthropic`: Messages API client over reqwest
//! - `embeddings`: `EmbeddingProvider` contract and an OpenAI-compatible client
//! - `personalize`: prompt construction and JSON parsing for tailored materials

pub mod anthropic;
pub mod embeddings;
pub mod personalize;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use embeddings::{EmbeddingConfig, EmbeddingProvider, OpenAiEmbeddings};
pub use personalize::{Personalization, Personalizer, PersonalizerConfig};
pub use provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};

use std::time::Duration;

use secrecy::SecretString;

/// Configuration for the generation provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub model: String,
    pub base_url: String,
    /// Hard per-request deadline.
    pub request_timeout: Duration,
}

impl LlmConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.anthropic.com";

    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}
