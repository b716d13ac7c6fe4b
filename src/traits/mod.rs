//! Provider traits
//!
//! The seams through which an orchestration layer consumes the provider.

pub mod completion;
pub mod embedding;

pub use completion::CompletionModel;
pub use embedding::EmbeddingModel;
