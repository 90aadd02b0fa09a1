//! Anthropic (Claude) summarization and contradiction-detection provider.

use super::client::AnthropicClient;
use super::types::{ContentBlock, Message, MessageRequest, MessageResponse};
use crate::{ContradictionDetector, Summarizer, SummarizeConfig, SummarizeStyle};
use async_trait::async_trait;
use vellum_core::EngineResult;

/// Anthropic summarization provider using Claude models. Implements both
/// `Summarizer` (context history compression) and `ContradictionDetector`
/// (janitor consolidation pass) against the same chat-completion endpoint.
pub struct AnthropicSummarizationProvider {
    client: AnthropicClient,
    model: String,
}

impl AnthropicSummarizationProvider {
    /// Create a new Anthropic summarization provider.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key
    /// * `model` - Model name (e.g., "claude-3-5-sonnet-20241022", "claude-3-haiku-20240307")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: AnthropicClient::new(api_key, 50),
            model: model.into(),
        }
    }

    /// Create provider with default Claude 3.5 Sonnet model.
    pub fn with_default_model(api_key: impl Into<String>) -> Self {
        Self::new(api_key, "claude-3-5-sonnet-20241022")
    }

    /// Build system prompt based on summarization style.
    fn build_system_prompt(&self, style: SummarizeStyle) -> String {
        match style {
            SummarizeStyle::Brief => {
                "You are a helpful assistant that creates concise summaries. \
                 Focus on the key points and main ideas. \
                 Keep your response short and to the point."
                    .to_string()
            }
            SummarizeStyle::Detailed => {
                "You are a helpful assistant that creates detailed summaries. \
                 Include important context, key points, and supporting details. \
                 Organize the information clearly."
                    .to_string()
            }
            SummarizeStyle::Structured => {
                "You are a helpful assistant that creates structured summaries. \
                 Use bullet points or numbered lists to organize information. \
                 Include sections like: Overview, Key Points, Details, Conclusion."
                    .to_string()
            }
        }
    }

    /// Extract text from content blocks.
    fn extract_text(content: Vec<ContentBlock>) -> String {
        content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Summarizer for AnthropicSummarizationProvider {
    async fn summarize(&self, content: &str, config: &SummarizeConfig) -> EngineResult<String> {
        let request = MessageRequest {
            model: self.model.clone(),
            system: Some(self.build_system_prompt(config.style)),
            messages: vec![Message {
                role: "user".to_string(),
                content: format!("Summarize the following content:\n\n{}", content),
            }],
            max_tokens: config.max_tokens,
            temperature: Some(0.3), // Lower temperature for focused summaries
        };

        let response: MessageResponse = self.client.request("messages", request).await?;

        Ok(Self::extract_text(response.content))
    }
}

#[async_trait]
impl ContradictionDetector for AnthropicSummarizationProvider {
    async fn detect_contradiction(&self, a: &str, b: &str) -> EngineResult<bool> {
        let request = MessageRequest {
            model: self.model.clone(),
            system: Some(
                "You are a contradiction detection assistant. \
                 Analyze two statements and determine if they contradict each other. \
                 Respond with ONLY 'yes' or 'no'."
                    .to_string(),
            ),
            messages: vec![Message {
                role: "user".to_string(),
                content: format!("Statement A: {}\n\nStatement B: {}\n\nDo these contradict?", a, b),
            }],
            max_tokens: 10,
            temperature: Some(0.0), // Deterministic
        };

        let response: MessageResponse = self.client.request("messages", request).await?;
        let answer = Self::extract_text(response.content).to_lowercase();

        Ok(answer.contains("yes"))
    }
}

impl std::fmt::Debug for AnthropicSummarizationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicSummarizationProvider")
            .field("model", &self.model)
            .finish()
    }
}
