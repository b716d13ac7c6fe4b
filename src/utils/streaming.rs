//! Common Streaming Utilities
//!
//! SSE processing for streamed completions using eventsource-stream, which handles
//! UTF-8 boundaries and line buffering. The stream ends at the `[DONE]` sentinel.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;

use crate::error::LlmError;
use crate::types::{CompletionStream, GenerationChunk};

/// Converts the `data` of one SSE event into zero or more chunks.
pub trait SseEventConverter: Send + Sync {
    fn convert_event(&self, data: &str) -> Vec<Result<GenerationChunk, LlmError>>;
}

/// Stream factory for SSE completion streams
pub struct StreamFactory;

impl StreamFactory {
    /// Build a chunk stream from a successful streaming response.
    pub fn create_eventsource_stream<C>(
        response: reqwest::Response,
        converter: C,
    ) -> CompletionStream
    where
        C: SseEventConverter + 'static,
    {
        let stream = async_stream::stream! {
            let mut events = response.bytes_stream().eventsource();
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        let data = event.data.trim();
                        if data == "[DONE]" {
                            break;
                        }
                        if data.is_empty() {
                            continue;
                        }
                        for item in converter.convert_event(data) {
                            yield item;
                        }
                    }
                    Err(e) => {
                        yield Err(LlmError::StreamError(format!("SSE parsing error: {e}")));
                        break;
                    }
                }
            }
        };
        Box::pin(stream)
    }
}
