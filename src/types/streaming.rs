//! Streaming types for incremental completion output.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use super::completion::{Generation, GenerationInfo};
use crate::error::LlmError;

/// Stream of completion deltas for a single prompt.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<GenerationChunk, LlmError>> + Send>>;

/// One streamed delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationChunk {
    pub text: String,
    pub generation_info: Option<GenerationInfo>,
}

impl GenerationChunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            generation_info: None,
        }
    }

    /// Concatenate `other` onto this chunk.
    ///
    /// Text is appended; the finish reason of the later chunk wins when present;
    /// log-probability arrays are extended.
    pub fn concat(&mut self, other: GenerationChunk) {
        self.text.push_str(&other.text);
        self.generation_info = match (self.generation_info.take(), other.generation_info) {
            (None, right) => right,
            (left, None) => left,
            (Some(left), Some(right)) => Some(GenerationInfo {
                finish_reason: right.finish_reason.or(left.finish_reason),
                logprobs: merge_logprobs(left.logprobs, right.logprobs),
            }),
        };
    }
}

impl From<GenerationChunk> for Generation {
    fn from(chunk: GenerationChunk) -> Self {
        Self {
            text: chunk.text,
            generation_info: chunk.generation_info,
        }
    }
}

fn merge_logprobs(
    left: Option<serde_json::Value>,
    right: Option<serde_json::Value>,
) -> Option<serde_json::Value> {
    use serde_json::Value;
    match (left, right) {
        (None, right) => right,
        (left, None) => left,
        (Some(Value::Object(mut l)), Some(Value::Object(r))) => {
            for (key, value) in r {
                match (l.get_mut(&key), value) {
                    (Some(Value::Array(existing)), Value::Array(more)) => existing.extend(more),
                    (_, value) => {
                        l.insert(key, value);
                    }
                }
            }
            Some(Value::Object(l))
        }
        (_, right) => right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(
        text: &str,
        finish: Option<&str>,
        logprobs: Option<serde_json::Value>,
    ) -> GenerationChunk {
        GenerationChunk {
            text: text.to_string(),
            generation_info: Some(GenerationInfo {
                finish_reason: finish.map(str::to_string),
                logprobs,
            }),
        }
    }

    #[test]
    fn concat_appends_text_and_keeps_last_finish_reason() {
        let first = json!({"tokens": ["Hel"], "token_logprobs": [-0.1]});
        let second = json!({"tokens": ["lo"], "token_logprobs": [-0.2]});
        let mut acc = chunk("Hel", None, Some(first));
        acc.concat(chunk("lo", Some("stop"), Some(second)));

        assert_eq!(acc.text, "Hello");
        let info = acc.generation_info.unwrap();
        assert_eq!(info.finish_reason.as_deref(), Some("stop"));
        assert_eq!(
            info.logprobs.unwrap(),
            json!({"tokens": ["Hel", "lo"], "token_logprobs": [-0.1, -0.2]})
        );
    }

    #[test]
    fn concat_with_missing_info() {
        let mut acc = GenerationChunk::new("a");
        acc.concat(GenerationChunk::new("b"));
        assert_eq!(acc.text, "ab");
        assert!(acc.generation_info.is_none());
    }
}
