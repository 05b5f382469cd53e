//! Answer synthesis over packed context

use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::LlmProvider;
use crate::retry::{with_timeout, RetryPolicy};
use crate::types::{Answer, RetrievedChunk};

use super::packer::pack;
use super::prompt::{PromptBuilder, INSUFFICIENT_CONTEXT_ANSWER};

/// Turns a question and ranked chunks into a grounded answer
pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmProvider>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(llm: Arc<dyn LlmProvider>, config: &RagConfig) -> Self {
        Self::new(llm)
            .with_timeout(config.llm.timeout())
            .with_retry(config.llm.retry_policy())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    /// Answer `question` from `context_chunks` (rank order)
    ///
    /// Makes one generation call, retried on failure. When no chunk fits in
    /// `max_context_length` the model is not called and the answer is the
    /// insufficient-context statement with no citations.
    pub async fn answer(
        &self,
        question: &str,
        context_chunks: &[RetrievedChunk],
        max_context_length: usize,
    ) -> Result<Answer> {
        let packed = pack(context_chunks, max_context_length);
        if packed.is_empty() {
            tracing::info!(
                "No context fits for question ({} chunks retrieved); skipping generation",
                context_chunks.len()
            );
            return Ok(Answer {
                text: INSUFFICIENT_CONTEXT_ANSWER.to_string(),
                cited_chunk_ids: Vec::new(),
            });
        }

        let chunks: Vec<_> = packed.chunks.iter().map(|r| &r.chunk).collect();
        let context = PromptBuilder::build_context(&chunks);
        let prompt = PromptBuilder::build_rag_prompt(question, &context);

        tracing::debug!(
            "Packed {} of {} chunks ({} tokens) for generation",
            packed.chunks.len(),
            context_chunks.len(),
            packed.tokens
        );

        let llm = &self.llm;
        let timeout = self.timeout;
        let prompt = &prompt;
        let text = self
            .retry
            .run("generation", move || {
                with_timeout(timeout, llm.generate(prompt), move || {
                    Error::generation(format!("generation timed out after {:?}", timeout), "")
                })
            })
            .await
            .map_err(|e| e.with_question(question))?;

        Ok(Answer {
            text: text.trim().to_string(),
            cited_chunk_ids: packed.chunk_ids(),
        })
    }
}
