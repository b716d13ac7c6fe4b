//! Type Conversions for LlmError
//!
//! From trait implementations for converting common error types into LlmError.

use super::types::LlmError;

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(err.to_string())
        } else if err.is_connect() {
            Self::ConnectionError(err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for LlmError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}
