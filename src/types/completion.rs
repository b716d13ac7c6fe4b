//! Completion request/response types and generation containers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `POST /completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: Vec<String>,
    /// Sampling and passthrough parameters, flattened into the body
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// One choice of a `/completions` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub logprobs: Option<serde_json::Value>,
}

/// Raw usage counters reported by the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

/// Non-streaming `/completions` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Option<CompletionUsage>,
    #[serde(default)]
    pub system_fingerprint: Option<String>,
}

/// Token usage summed across every sub-batch of one `generate` call.
///
/// A counter stays `None` until some response reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    /// Add the counters present in `usage`.
    pub fn accumulate(&mut self, usage: &CompletionUsage) {
        fn add(slot: &mut Option<u64>, value: Option<u64>) {
            if let Some(v) = value {
                *slot = Some(slot.unwrap_or(0) + v);
            }
        }
        add(&mut self.prompt_tokens, usage.prompt_tokens);
        add(&mut self.completion_tokens, usage.completion_tokens);
        add(&mut self.total_tokens, usage.total_tokens);
    }

    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none()
            && self.completion_tokens.is_none()
            && self.total_tokens.is_none()
    }
}

/// Finish reason and log-probabilities attached to a generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub finish_reason: Option<String>,
    pub logprobs: Option<serde_json::Value>,
}

/// A single generated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub generation_info: Option<GenerationInfo>,
}

impl From<CompletionChoice> for Generation {
    fn from(choice: CompletionChoice) -> Self {
        Self {
            text: choice.text,
            generation_info: Some(GenerationInfo {
                finish_reason: choice.finish_reason,
                logprobs: choice.logprobs,
            }),
        }
    }
}

/// Provider-level output attached to an [`LlmResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmOutput {
    pub token_usage: TokenUsage,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
}

/// Result of a `generate` call: one list of generations per prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResult {
    pub generations: Vec<Vec<Generation>>,
    pub llm_output: Option<LlmOutput>,
}

impl LlmResult {
    /// Text of the first generation for each prompt.
    pub fn texts(&self) -> Vec<String> {
        self.generations
            .iter()
            .map(|g| g.first().map(|g| g.text.clone()).unwrap_or_default())
            .collect()
    }
}

/// Parameters identifying a configured completion model.
pub type IdentifyingParams = HashMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_only_sums_reported_counters() {
        let mut usage = TokenUsage::default();
        assert!(usage.is_empty());

        usage.accumulate(&CompletionUsage {
            prompt_tokens: Some(3),
            completion_tokens: Some(5),
            total_tokens: Some(8),
        });
        usage.accumulate(&CompletionUsage {
            prompt_tokens: Some(2),
            completion_tokens: None,
            total_tokens: Some(2),
        });

        assert_eq!(usage.prompt_tokens, Some(5));
        assert_eq!(usage.completion_tokens, Some(5));
        assert_eq!(usage.total_tokens, Some(10));
    }

    #[test]
    fn response_parses_without_optional_fields() {
        let resp: CompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"text": "hi", "finish_reason": "stop"}]
        }))
        .unwrap();
        assert_eq!(resp.choices.len(), 1);
        assert!(resp.usage.is_none());

        let generation = Generation::from(resp.choices[0].clone());
        assert_eq!(generation.text, "hi");
        assert_eq!(
            generation.generation_info.unwrap().finish_reason.as_deref(),
            Some("stop")
        );
    }
}
