//! siumai-provider-compressa
//!
//! Compressa provider: a completion model and a length-safe embedding model over
//! Compressa's OpenAI-compatible HTTP API.
//!
//! Oversized embedding inputs are split into token-bounded chunks, chunks are
//! batched into few requests, and per-chunk vectors are recombined with a
//! length-weighted, L2-normalized average. Every operation has an async and a
//! blocking surface sharing the same planning and aggregation logic.
//!
//! ```rust,no_run
//! use siumai_provider_compressa::prelude::*;
//!
//! # async fn example() -> Result<(), LlmError> {
//! let embeddings = CompressaEmbeddings::builder()
//!     .api_key("your-api-key")
//!     .embedding_ctx_length(512)
//!     .build()?;
//! let query = embeddings.embed_query("what is a chunk?").await?;
//!
//! let llm = CompressaLlm::builder().api_key("your-api-key").build()?;
//! let result = llm.generate(&["Tell me a joke".to_string()], None).await?;
//! println!("{} dims, {:?}", query.len(), result.texts());
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]

pub mod chunking;
pub mod error;
pub mod params;
pub mod providers;
pub mod retry;
pub mod retry_api;
pub mod telemetry;
pub mod tokenizer;
pub mod traits;
pub mod types;
pub mod utils;

pub use error::LlmError;
pub use providers::compressa::{CompressaEmbeddings, CompressaLlm};

/// Commonly used items.
pub mod prelude {
    pub use crate::error::LlmError;
    pub use crate::providers::compressa::{
        CompressaEmbeddings, CompressaEmbeddingsConfig, CompressaLlm, CompressaLlmConfig,
    };
    pub use crate::traits::{CompletionModel, EmbeddingModel};
    pub use crate::types::{
        EmbeddingInput, Generation, GenerationChunk, LlmResult, SpecialTokens, TokenUsage,
    };
}
