//! Prompt templates for grounded answers

use crate::types::Chunk;

/// Stated by the model, or returned directly, when the context cannot answer
pub const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "I don't have enough information from the document to answer this question.";

/// System and user messages for one generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Prompt builder for document questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// One numbered block per packed chunk, numbered by packed position
    ///
    /// Every chunk passed in gets a section, so section `n` is always the
    /// `n`th cited chunk.
    pub fn build_context(chunks: &[&Chunk]) -> String {
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("Document Section {}:\n{}\n", i + 1, chunk.text.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Build the grounded question-answering prompt
    pub fn build_rag_prompt(question: &str, context: &str) -> Prompt {
        let system = format!(
            r#"You are an intelligent assistant that helps users understand documents.

Your task is to answer questions based ONLY on the provided document context.

IMPORTANT RULES:
1. Only use information from the provided context to answer questions
2. If the context doesn't contain enough information to answer the question, say "{insufficient}"
3. Be accurate, helpful, and concise
4. Cite the section numbers you relied on when possible
5. If asked about something not in the document, politely redirect to document content

Context:
{context}

Question: {question}

Answer:"#,
            insufficient = INSUFFICIENT_CONTEXT_ANSWER,
            context = context,
            question = question
        );

        Prompt {
            system,
            user: question.to_string(),
        }
    }
}
