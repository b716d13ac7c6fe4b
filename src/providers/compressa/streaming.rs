//! Compressa Streaming
//!
//! Converts streamed `/completions` events into [`GenerationChunk`]s and folds a
//! stream back into a single choice.

use crate::error::{LlmError, error_from_payload};
use crate::types::{CompletionChoice, CompletionResponse, GenerationChunk, GenerationInfo};
use crate::utils::streaming::SseEventConverter;

/// Event converter for streamed completions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionEventConverter;

impl SseEventConverter for CompletionEventConverter {
    fn convert_event(&self, data: &str) -> Vec<Result<GenerationChunk, LlmError>> {
        let json: serde_json::Value = match serde_json::from_str(data) {
            Ok(json) => json,
            Err(e) => {
                return vec![Err(LlmError::ParseError(format!(
                    "Failed to parse stream event: {e}"
                )))];
            }
        };
        if let Some(error) = error_from_payload(&json) {
            return vec![Err(error)];
        }
        match serde_json::from_value::<CompletionResponse>(json) {
            Ok(response) => vec![Ok(chunk_from_response(response))],
            Err(e) => vec![Err(LlmError::ParseError(format!(
                "Unexpected stream event: {e}"
            )))],
        }
    }
}

/// First choice of a streamed event as a chunk; no choices yields an empty chunk.
pub fn chunk_from_response(response: CompletionResponse) -> GenerationChunk {
    match response.choices.into_iter().next() {
        None => GenerationChunk::new(""),
        Some(choice) => GenerationChunk {
            text: choice.text,
            generation_info: Some(GenerationInfo {
                finish_reason: choice.finish_reason,
                logprobs: choice.logprobs,
            }),
        },
    }
}

/// Running generation for one streamed prompt.
///
/// `Empty` and `Accumulating` move to `Accumulating` on every delta; `finish` moves
/// to `Done`, after which further deltas are rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum StreamAccumulator {
    #[default]
    Empty,
    Accumulating(GenerationChunk),
    Done(GenerationChunk),
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: GenerationChunk) -> Result<(), LlmError> {
        *self = match std::mem::take(self) {
            Self::Empty => Self::Accumulating(chunk),
            Self::Accumulating(mut generation) => {
                generation.concat(chunk);
                Self::Accumulating(generation)
            }
            done @ Self::Done(_) => {
                *self = done;
                return Err(LlmError::StreamError(
                    "received a delta after the stream completed".to_string(),
                ));
            }
        };
        Ok(())
    }

    /// Mark the stream complete. A stream without any delta is an error.
    pub fn finish(&mut self) -> Result<&GenerationChunk, LlmError> {
        *self = match std::mem::take(self) {
            Self::Empty => {
                return Err(LlmError::StreamError(
                    "stream ended without producing any output".to_string(),
                ));
            }
            Self::Accumulating(generation) | Self::Done(generation) => Self::Done(generation),
        };
        match self {
            Self::Done(generation) => Ok(generation),
            _ => Err(LlmError::InternalError("accumulator not finished".to_string())),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Finished generation as a completion choice.
    pub fn into_choice(mut self) -> Result<CompletionChoice, LlmError> {
        let generation = self.finish()?.clone();
        let info = generation.generation_info.unwrap_or_default();
        Ok(CompletionChoice {
            text: generation.text,
            index: None,
            finish_reason: info.finish_reason,
            logprobs: info.logprobs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_event_with_choice() {
        let events = CompletionEventConverter.convert_event(
            r#"{"choices":[{"text":"Hel","index":0,"finish_reason":null,"logprobs":null}]}"#,
        );
        let chunk = events.into_iter().next().unwrap().unwrap();
        assert_eq!(chunk.text, "Hel");
    }

    #[test]
    fn empty_choices_give_empty_chunk() {
        let events = CompletionEventConverter.convert_event(r#"{"choices":[]}"#);
        assert_eq!(events[0].as_ref().unwrap(), &GenerationChunk::new(""));
    }

    #[test]
    fn error_event_fails() {
        let events = CompletionEventConverter.convert_event(r#"{"error":{"message":"boom"}}"#);
        assert!(events[0].is_err());
        let events = CompletionEventConverter.convert_event("not json");
        assert!(matches!(events[0], Err(LlmError::ParseError(_))));
    }

    #[test]
    fn accumulates_then_finishes() {
        let mut acc = StreamAccumulator::new();
        acc.push(GenerationChunk::new("Hel")).unwrap();
        acc.push(GenerationChunk {
            text: "lo".into(),
            generation_info: Some(GenerationInfo {
                finish_reason: Some("stop".into()),
                logprobs: Some(json!({"tokens": ["lo"]})),
            }),
        })
        .unwrap();
        assert!(!acc.is_done());

        let choice = acc.clone().into_choice().unwrap();
        assert_eq!(choice.text, "Hello");
        assert_eq!(choice.finish_reason.as_deref(), Some("stop"));

        acc.finish().unwrap();
        assert!(acc.is_done());
        assert!(acc.push(GenerationChunk::new("!")).is_err());
        assert!(acc.is_done());
    }

    #[test]
    fn empty_stream_is_an_error() {
        assert!(StreamAccumulator::new().into_choice().is_err());
    }
}
