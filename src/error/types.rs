//! Core error types.

use thiserror::Error;

/// Coarse error category, used for retry decisions and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Client,
    Server,
    Network,
    Parsing,
    Validation,
    Configuration,
    Tokenizer,
    Aggregation,
    Unsupported,
    Unknown,
}

/// Unified error type for every operation of the provider.
///
/// Every variant aborts the enclosing top-level call; no partial results are
/// ever returned alongside an error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    /// Transport failure reported by the HTTP client
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Non-success response or explicit error payload from the API
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceededError(String),

    #[error("Request timed out: {0}")]
    TimeoutError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The response body did not have the expected shape
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing credential, conflicting parameters, invalid sampling combination
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Failure while consuming a streamed response
    #[error("Stream error: {0}")]
    StreamError(String),

    /// The tokenizer failed to encode or decode
    #[error("Tokenizer error: {0}")]
    TokenizerError(String),

    /// The selected tokenizer backend cannot be used in this build or environment
    #[error("Tokenizer backend unavailable: {0}")]
    TokenizerUnavailable(String),

    /// Multi-chunk aggregation hit a zero total weight or a zero-norm average
    #[error("Degenerate aggregation for input {index}: {reason}")]
    DegenerateAggregation { index: usize, reason: String },

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl LlmError {
    /// Create an API error from a status code and message.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// HTTP status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            Self::AuthenticationError(_) => Some(401),
            Self::RateLimitError(_) => Some(429),
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthenticationError(_) => ErrorCategory::Authentication,
            Self::RateLimitError(_) | Self::QuotaExceededError(_) => ErrorCategory::RateLimit,
            Self::ApiError { code, .. } if *code >= 500 => ErrorCategory::Server,
            Self::ApiError { .. } | Self::NotFound(_) | Self::InvalidInput(_) => {
                ErrorCategory::Client
            }
            Self::HttpError(_)
            | Self::TimeoutError(_)
            | Self::ConnectionError(_)
            | Self::StreamError(_) => ErrorCategory::Network,
            Self::JsonError(_) | Self::ParseError(_) => ErrorCategory::Parsing,
            Self::InvalidParameter(_) => ErrorCategory::Validation,
            Self::ConfigurationError(_) => ErrorCategory::Configuration,
            Self::TokenizerError(_) | Self::TokenizerUnavailable(_) => ErrorCategory::Tokenizer,
            Self::DegenerateAggregation { .. } => ErrorCategory::Aggregation,
            Self::UnsupportedOperation(_) => ErrorCategory::Unsupported,
            Self::InternalError(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether the transport layer may retry the request that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ApiError { code, .. } => *code >= 500 || *code == 408,
            Self::RateLimitError(_)
            | Self::TimeoutError(_)
            | Self::ConnectionError(_)
            | Self::HttpError(_) => true,
            _ => false,
        }
    }
}
