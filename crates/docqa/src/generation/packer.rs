//! Fitting retrieved chunks into the generator's context budget

use crate::types::RetrievedChunk;

/// Rough token count: whitespace-delimited words, at least 1
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count().max(1)
}

/// Chunks chosen for the prompt, in rank order
#[derive(Debug, Clone, Default)]
pub struct PackedContext<'a> {
    pub chunks: Vec<&'a RetrievedChunk>,
    pub tokens: usize,
}

impl PackedContext<'_> {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunk_ids(&self) -> Vec<u32> {
        self.chunks.iter().map(|r| r.chunk.id).collect()
    }
}

/// Take whole chunks in rank order until the next one would exceed `max_tokens`
///
/// Packing stops at the first chunk that does not fit; later, smaller chunks
/// are not considered, so the packed set is a rank prefix of the non-blank
/// chunks. Whitespace-only chunks are skipped: they cost nothing, never
/// reach the prompt and are never cited.
pub fn pack(retrieved: &[RetrievedChunk], max_tokens: usize) -> PackedContext<'_> {
    let mut packed = PackedContext::default();

    for item in retrieved {
        if item.chunk.text.trim().is_empty() {
            continue;
        }
        let cost = estimate_tokens(&item.chunk.text);
        if packed.tokens + cost > max_tokens {
            tracing::debug!(
                "Context budget reached at chunk {} ({} + {} > {}); {} of {} packed",
                item.chunk.id,
                packed.tokens,
                cost,
                max_tokens,
                packed.chunks.len(),
                retrieved.len()
            );
            break;
        }
        packed.tokens += cost;
        packed.chunks.push(item);
    }

    packed
}
