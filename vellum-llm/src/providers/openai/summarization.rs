//! OpenAI summarization and contradiction-detection provider implementation

use super::client::OpenAIClient;
use super::types::{CompletionRequest, CompletionResponse, Message};
use crate::providers::invalid_response;
use crate::{ContradictionDetector, Summarizer, SummarizeConfig, SummarizeStyle};
use async_trait::async_trait;
use vellum_core::EngineResult;

/// OpenAI summarization provider using GPT models. Implements both
/// `Summarizer` and `ContradictionDetector` against the chat-completion
/// endpoint.
pub struct OpenAISummarizationProvider {
    client: OpenAIClient,
    model: String,
}

impl OpenAISummarizationProvider {
    /// Create a new OpenAI summarization provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (e.g., "gpt-4o-mini", "gpt-4o")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: OpenAIClient::new(api_key, 60),
            model: model.into(),
        }
    }

    /// Create provider with default gpt-4o-mini model.
    pub fn with_default_model(api_key: impl Into<String>) -> Self {
        Self::new(api_key, "gpt-4o-mini")
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
}

#[async_trait]
impl Summarizer for OpenAISummarizationProvider {
    async fn summarize(&self, content: &str, config: &SummarizeConfig) -> EngineResult<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: self.build_system_prompt(config.style),
                },
                Message {
                    role: "user".to_string(),
                    content: format!("Summarize the following content:\n\n{}", content),
                },
            ],
            max_tokens: Some(config.max_tokens),
            temperature: Some(0.3), // Lower temperature for more focused summaries
        };

        let response: CompletionResponse = self.client.request("chat/completions", request).await?;

        let summary = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| invalid_response("openai", "No completion in response"))?;

        Ok(summary)
    }
}

#[async_trait]
impl ContradictionDetector for OpenAISummarizationProvider {
    async fn detect_contradiction(&self, a: &str, b: &str) -> EngineResult<bool> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: "You are a contradiction detection assistant. \
                              Analyze two statements and determine if they contradict each other. \
                              Respond with ONLY 'yes' or 'no'."
                        .to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: format!("Statement A: {}\n\nStatement B: {}\n\nDo these contradict?", a, b),
                },
            ],
            max_tokens: Some(10),
            temperature: Some(0.0), // Deterministic
        };

        let response: CompletionResponse = self.client.request("chat/completions", request).await?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.to_lowercase())
            .ok_or_else(|| invalid_response("openai", "No completion in response"))?;

        Ok(answer.contains("yes"))
    }
}

impl std::fmt::Debug for OpenAISummarizationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAISummarizationProvider")
            .field("model", &self.model)
            .finish()
    }
}
