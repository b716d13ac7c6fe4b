//! Compressa Provider
//!
//! Compressa serves an OpenAI-compatible API with `/completions` and `/embeddings`.
//!
//! - [`CompressaEmbeddings`]: length-safe chunked embeddings
//! - [`CompressaLlm`]: completions, sub-prompt batching and streaming
//!
//! Both read `COMPRESSA_API_KEY` and `COMPRESSA_API_BASE` when no explicit value is given.

pub mod client;
pub mod completions;
pub mod config;
pub mod embeddings;
pub mod result;
pub mod streaming;

pub use client::CompressaClient;
pub use completions::{CompletionEndpoint, CompressaLlm, CompressaLlmBuilder, TokenObserver};
pub use config::{CompressaEmbeddingsConfig, CompressaLlmConfig};
pub use embeddings::{CompressaEmbeddings, CompressaEmbeddingsBuilder, EmbeddingEndpoint};
pub use result::ResultBuilder;
pub use streaming::{CompletionEventConverter, StreamAccumulator};
