//! Shared helpers for the mock API tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};
use siumai_provider_compressa::LlmError;
use siumai_provider_compressa::retry_api::{RetryOptions, RetryPolicy};
use siumai_provider_compressa::tokenizer::{ChunkUnit, TextTokenizer};
use wiremock::{Request, Respond, ResponseTemplate};

pub const API_KEY: &str = "test-api-key";

/// One token per character; the token id is the code point.
pub struct CharTokenizer;

impl TextTokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, LlmError> {
        Ok(text.chars().map(u32::from).collect())
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, LlmError> {
        tokens
            .iter()
            .map(|t| {
                char::from_u32(*t).ok_or_else(|| LlmError::TokenizerError(format!("bad id {t}")))
            })
            .collect()
    }

    fn chunk_unit(&self) -> ChunkUnit {
        ChunkUnit::Tokens
    }
}

/// Retries with a negligible delay.
pub fn fast_retries(max_retries: u32) -> RetryOptions {
    RetryOptions::default().with_policy(
        RetryPolicy::from_max_retries(max_retries)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false),
    )
}

pub fn fixture(name: &str) -> String {
    let path: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("compressa")
        .join(name);
    std::fs::read_to_string(path).expect("read fixture")
}

/// Answers `/embeddings` with `[first token, chunk length]` per input, listed in
/// reverse order with explicit indices.
pub struct EchoEmbeddings;

impl Respond for EchoEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("json body");
        let inputs = match &body["input"] {
            Value::Array(items) => items.clone(),
            single => vec![single.clone()],
        };
        let mut data: Vec<Value> = inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let embedding = match input {
                    Value::Array(tokens) => vec![
                        tokens.first().and_then(Value::as_f64).unwrap_or(0.0),
                        tokens.len() as f64,
                    ],
                    Value::String(text) => vec![
                        text.chars().next().map(|c| u32::from(c) as f64).unwrap_or(0.0),
                        text.chars().count() as f64,
                    ],
                    _ => vec![0.0, 0.0],
                };
                json!({"object": "embedding", "index": index, "embedding": embedding})
            })
            .collect();
        data.reverse();
        ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": data,
            "model": body["model"],
            "usage": {"prompt_tokens": 0, "total_tokens": 0}
        }))
    }
}

/// Answers `/completions` with `n` choices per prompt, texts `"{prompt}#{i}"`.
pub struct EchoCompletions;

impl Respond for EchoCompletions {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("json body");
        let n = body["n"].as_u64().unwrap_or(1);
        let prompts = body["prompt"].as_array().cloned().unwrap_or_default();
        let choices: Vec<Value> = prompts
            .iter()
            .flat_map(|p| {
                let p = p.as_str().unwrap_or_default().to_string();
                (0..n).map(move |i| {
                    json!({
                        "text": format!("{p}#{i}"),
                        "index": i,
                        "finish_reason": "length",
                        "logprobs": null
                    })
                })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "id": "cmpl-test",
            "object": "text_completion",
            "model": body["model"],
            "choices": choices,
            "usage": {"prompt_tokens": 4, "completion_tokens": 6, "total_tokens": 10},
            "system_fingerprint": "fp_compressa"
        }))
    }
}
