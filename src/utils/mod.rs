//! Utility helpers shared by the providers.

pub mod blocking;
pub mod streaming;

pub use blocking::block_on;
pub use streaming::{SseEventConverter, StreamFactory};
