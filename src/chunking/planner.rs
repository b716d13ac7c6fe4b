//! Chunk planner
//!
//! Encodes every input text, slices each token sequence into pieces of at most
//! `ctx_limit` units and windows the flat chunk list into batches of at most
//! `batch_size` chunks. Batches are exposed as a lazy iterator of start offsets.

use std::iter::StepBy;
use std::ops::Range;
use std::sync::Arc;

use crate::error::LlmError;
use crate::tokenizer::{ChunkUnit, TextTokenizer};
use crate::types::EmbeddingInput;

/// Called once per dispatched batch with `(batch_index, total_batches, chunks_in_batch)`.
pub type ProgressObserver = Arc<dyn Fn(usize, usize, usize) + Send + Sync>;

/// A slice of one input text, tied to that text's position in the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenChunk {
    /// Index of the originating input text
    pub origin: usize,
    pub input: EmbeddingInput,
}

impl TokenChunk {
    pub fn weight(&self) -> usize {
        self.input.weight()
    }
}

/// Output of [`plan_chunks`].
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    num_texts: usize,
    chunks: Vec<TokenChunk>,
    batch_size: usize,
}

impl ChunkPlan {
    /// Build a plan from already sliced chunks.
    pub fn from_chunks(
        num_texts: usize,
        chunks: Vec<TokenChunk>,
        batch_size: usize,
    ) -> Result<Self, LlmError> {
        if batch_size == 0 {
            return Err(LlmError::InvalidParameter(
                "batch size must be greater than 0".to_string(),
            ));
        }
        if let Some(chunk) = chunks.iter().find(|c| c.origin >= num_texts) {
            return Err(LlmError::InternalError(format!(
                "chunk origin {} out of range for {num_texts} texts",
                chunk.origin
            )));
        }
        Ok(Self {
            num_texts,
            chunks,
            batch_size,
        })
    }

    pub fn num_texts(&self) -> usize {
        self.num_texts
    }

    pub fn chunks(&self) -> &[TokenChunk] {
        &self.chunks
    }

    /// Origin index of every chunk, parallel to [`ChunkPlan::chunks`].
    pub fn origins(&self) -> Vec<usize> {
        self.chunks.iter().map(|c| c.origin).collect()
    }

    /// Weight of every chunk, parallel to [`ChunkPlan::chunks`].
    pub fn weights(&self) -> Vec<usize> {
        self.chunks.iter().map(TokenChunk::weight).collect()
    }

    pub fn num_batches(&self) -> usize {
        self.chunks.len().div_ceil(self.batch_size)
    }

    /// Lazily iterate the start offset of each batch window.
    ///
    /// Calling this again restarts the sequence.
    pub fn batches(&self) -> BatchOffsets {
        BatchOffsets {
            inner: (0..self.chunks.len()).step_by(self.batch_size),
        }
    }

    /// Chunks covered by the batch starting at `offset`.
    pub fn batch_at(&self, offset: usize) -> &[TokenChunk] {
        let end = (offset + self.batch_size).min(self.chunks.len());
        &self.chunks[offset.min(end)..end]
    }

    /// Endpoint payloads for the batch starting at `offset`.
    pub fn batch_inputs(&self, offset: usize) -> Vec<EmbeddingInput> {
        self.batch_at(offset)
            .iter()
            .map(|c| c.input.clone())
            .collect()
    }
}

/// Lazy sequence of batch start offsets.
#[derive(Debug, Clone)]
pub struct BatchOffsets {
    inner: StepBy<Range<usize>>,
}

impl Iterator for BatchOffsets {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for BatchOffsets {}

/// Tokenize and slice `texts` into chunks of at most `ctx_limit` units.
///
/// A text that encodes to zero tokens contributes no chunks.
pub fn plan_chunks<S: AsRef<str>>(
    tokenizer: &dyn TextTokenizer,
    texts: &[S],
    ctx_limit: usize,
    batch_size: usize,
) -> Result<ChunkPlan, LlmError> {
    if ctx_limit == 0 {
        return Err(LlmError::InvalidParameter(
            "embedding context length must be greater than 0".to_string(),
        ));
    }

    let unit = tokenizer.chunk_unit();
    let mut chunks = Vec::new();
    for (origin, text) in texts.iter().enumerate() {
        let tokens = tokenizer.encode(text.as_ref())?;
        for slice in tokens.chunks(ctx_limit) {
            let input = match unit {
                ChunkUnit::Tokens => EmbeddingInput::Tokens(slice.to_vec()),
                ChunkUnit::Text => EmbeddingInput::Text(tokenizer.decode(slice)?),
            };
            chunks.push(TokenChunk { origin, input });
        }
    }

    tracing::debug!(
        texts = texts.len(),
        chunks = chunks.len(),
        ctx_limit,
        batch_size,
        "planned embedding chunks"
    );
    ChunkPlan::from_chunks(texts.len(), chunks, batch_size)
}
