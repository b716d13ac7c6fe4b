//! Data types shared by the embeddings and completion providers.

pub mod common;
pub mod completion;
pub mod embedding;
pub mod http;
pub mod streaming;

pub use common::*;
pub use completion::*;
pub use embedding::*;
pub use http::*;
pub use streaming::*;
