//! Provider module.

pub mod compressa;

pub use compressa::{CompressaEmbeddings, CompressaLlm};
