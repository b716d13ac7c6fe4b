//! Compressa HTTP error classification.
//!
//! Preserves the provider's error message when the body carries one, while
//! keeping retry-friendly error variants.

use super::types::LlmError;

fn extract_message(body_text: &str) -> Option<String> {
    let json = serde_json::from_str::<serde_json::Value>(body_text).ok()?;
    error_payload_message(&json)
}

/// Extract a human-readable message from an error payload.
///
/// Accepts `{"error": {"message": ..}}`, `{"error": ".."}` and `{"message": ..}`.
pub fn error_payload_message(json: &serde_json::Value) -> Option<String> {
    let message = json
        .get("error")
        .and_then(|v| v.get("message"))
        .and_then(|v| v.as_str())
        .or_else(|| json.get("error").and_then(|v| v.as_str()))
        .or_else(|| json.get("message").and_then(|v| v.as_str()))
        .or_else(|| json.get("detail").and_then(|v| v.as_str()))
        .map(|s| s.trim().to_string())?;

    if message.is_empty() {
        None
    } else {
        Some(message)
    }
}

/// Map a non-success HTTP response to an `LlmError`.
pub fn classify_http_error(status: u16, body_text: &str) -> LlmError {
    let message = extract_message(body_text).unwrap_or_else(|| {
        if body_text.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            body_text.to_string()
        }
    });
    let lower = body_text.to_lowercase();

    match status {
        401 | 403 => LlmError::AuthenticationError(message),
        404 => LlmError::NotFound(message),
        429 => LlmError::RateLimitError(message),
        400 => {
            if lower.contains("quota") {
                LlmError::QuotaExceededError(message)
            } else if lower.contains("rate limit") || lower.contains("rate_limit") {
                LlmError::RateLimitError(message)
            } else {
                LlmError::InvalidInput(message)
            }
        }
        _ => LlmError::ApiError {
            code: status,
            message,
            details: serde_json::from_str::<serde_json::Value>(body_text).ok(),
        },
    }
}

/// Turn an explicit `error` field inside a 2xx body into an `LlmError`.
pub fn error_from_payload(json: &serde_json::Value) -> Option<LlmError> {
    let error = json.get("error")?;
    if error.is_null() {
        return None;
    }
    let message = error_payload_message(json).unwrap_or_else(|| error.to_string());
    let code = error
        .get("code")
        .and_then(|v| v.as_u64())
        .and_then(|c| u16::try_from(c).ok())
        .unwrap_or(500);
    Some(LlmError::ApiError {
        code,
        message,
        details: Some(error.clone()),
    })
}
