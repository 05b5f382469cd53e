//! LLM provider trait for answer generation

use async_trait::async_trait;

use crate::error::Result;
use crate::generation::Prompt;

/// Trait for completing a prepared prompt
///
/// Implementations:
/// - `OpenAiChat`: OpenAI-compatible chat completions
/// - `OllamaLlm`: Local Ollama server
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete `prompt` and return the model's text
    async fn generate(&self, prompt: &Prompt) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
