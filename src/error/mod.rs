//! Error Handling Module
//!
//! This module provides error handling for the Compressa provider, including:
//! - Core error types (`LlmError`, `ErrorCategory`)
//! - HTTP error classification for non-2xx responses and error payloads
//! - Type conversions from common error types
//!
//! # Example
//!
//! ```rust,ignore
//! use siumai_provider_compressa::error::{LlmError, ErrorCategory};
//!
//! let error = LlmError::api_error(404, "Not found");
//! assert_eq!(error.category(), ErrorCategory::Client);
//! assert!(!error.is_retryable());
//! ```

// Module declarations
pub mod classify;
mod conversions;
pub mod types;

// Re-exports for public API
pub use classify::*;
pub use types::*;
