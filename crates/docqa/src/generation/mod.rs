//! Context packing, prompt construction and answer generation

pub mod packer;
pub mod prompt;
pub mod synthesizer;

pub use packer::{estimate_tokens, pack, PackedContext};
pub use prompt::{Prompt, PromptBuilder, INSUFFICIENT_CONTEXT_ANSWER};
pub use synthesizer::AnswerSynthesizer;
