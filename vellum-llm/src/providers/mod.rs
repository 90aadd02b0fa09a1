//! LLM provider implementations
//!
//! Concrete implementations of the `EmbeddingProvider`, `Summarizer`, and
//! `ContradictionDetector` traits for Anthropic, OpenAI, and Ollama.

pub mod anthropic;
pub mod ollama;
pub mod openai;

pub use anthropic::{AnthropicClient, AnthropicSummarizationProvider};
pub use ollama::OllamaEmbeddingProvider;
pub use openai::{OpenAIClient, OpenAIEmbeddingProvider, OpenAISummarizationProvider};

use vellum_core::{EngineError, LlmError};

/// A provider request that failed at the HTTP layer, before any response
/// body could be parsed. `status` is 0 for a transport-level failure (no
/// response at all, e.g. connection refused).
pub(crate) fn request_failed(provider: &str, status: i32, message: impl Into<String>) -> EngineError {
    EngineError::Llm(LlmError::ProviderError {
        provider: provider.to_string(),
        message: format!("request failed (status {status}): {}", message.into()),
    })
}

/// A provider response that parsed at the HTTP layer but didn't match the
/// shape this client expects.
pub(crate) fn invalid_response(provider: &str, message: impl Into<String>) -> EngineError {
    EngineError::Llm(LlmError::ProviderError {
        provider: provider.to_string(),
        message: message.into(),
    })
}
