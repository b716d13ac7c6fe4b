//! Mock API tests for Compressa completions

mod support;

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use serde_json::json;
use siumai_provider_compressa::prelude::*;
use siumai_provider_compressa::providers::compressa::CompressaLlmBuilder;
use support::{API_KEY, CharTokenizer, EchoCompletions, fast_retries, fixture};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn llm(server: &MockServer) -> CompressaLlmBuilder {
    CompressaLlm::builder()
        .api_key(API_KEY)
        .base_url(server.uri())
        .model("compressa-test")
        .tokenizer(Arc::new(CharTokenizer))
        .retry_options(fast_retries(0))
}

async fn mount_stream(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(fixture("completion_stream.sse"), "text/event-stream"),
        )
        .expect(expected)
        .mount(server)
        .await;
}

fn prompts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn generate_reshapes_sub_batches_and_sums_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .and(body_partial_json(json!({"model": "compressa-test", "n": 2})))
        .respond_with(EchoCompletions)
        .expect(2)
        .mount(&server)
        .await;

    let model = llm(&server).n(2).best_of(2).batch_size(2).build().unwrap();
    let result = model
        .generate(&prompts(&["a", "b", "c"]), None)
        .await
        .unwrap();

    assert_eq!(result.generations.len(), 3);
    for (prompt, generations) in ["a", "b", "c"].iter().zip(&result.generations) {
        let texts: Vec<&str> = generations.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(texts, vec![format!("{prompt}#0"), format!("{prompt}#1")]);
    }
    let output = result.llm_output.unwrap();
    assert_eq!(output.model_name, "compressa-test");
    assert_eq!(output.token_usage.prompt_tokens, Some(8));
    assert_eq!(output.token_usage.completion_tokens, Some(12));
    assert_eq!(output.token_usage.total_tokens, Some(20));
    assert_eq!(output.system_fingerprint.as_deref(), Some("fp_compressa"));
}

#[tokio::test]
async fn stop_sequences_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .and(body_partial_json(json!({"stop": ["\n\n"], "prompt": ["hi"]})))
        .respond_with(EchoCompletions)
        .expect(1)
        .mount(&server)
        .await;

    let model = llm(&server).build().unwrap();
    let result = model
        .generate(&prompts(&["hi"]), Some(vec!["\n\n".to_string()]))
        .await
        .unwrap();
    assert_eq!(result.texts(), vec!["hi#0".to_string()]);
}

#[tokio::test]
async fn conflicting_stop_is_rejected_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(EchoCompletions)
        .expect(0)
        .mount(&server)
        .await;

    let model = llm(&server)
        .model_kwarg("stop", json!(["END"]))
        .build()
        .unwrap();
    let err = model
        .generate(&prompts(&["hi"]), Some(vec!["\n".to_string()]))
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::ConfigurationError(_)));
}

#[tokio::test]
async fn unknown_values_pass_through_to_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .and(body_partial_json(json!({"seed": 7, "temperature": 0.1})))
        .respond_with(EchoCompletions)
        .expect(1)
        .mount(&server)
        .await;

    let mut raw = serde_json::Map::new();
    raw.insert("api_key".into(), json!(API_KEY));
    raw.insert("base_url".into(), json!(server.uri()));
    raw.insert("temperature".into(), json!(0.1));
    raw.insert("seed".into(), json!(7));
    let model = CompressaLlm::from_values(raw).unwrap();
    assert_eq!(model.config().model_kwargs.get("seed"), Some(&json!(7)));

    model.invoke("x").await.unwrap();
}

#[tokio::test]
async fn stream_yields_deltas_until_done() {
    let server = MockServer::start().await;
    mount_stream(&server, 1).await;

    let model = llm(&server).build().unwrap();
    let mut stream = model.stream("say hello", None).await.unwrap();
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.unwrap());
    }

    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["Hel", "lo", "", "!"]);
    assert_eq!(
        chunks
            .last()
            .and_then(|c| c.generation_info.as_ref())
            .and_then(|i| i.finish_reason.as_deref()),
        Some("stop")
    );
}

#[tokio::test]
async fn streaming_generate_accumulates_one_generation() {
    let server = MockServer::start().await;
    mount_stream(&server, 1).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let model = llm(&server)
        .streaming(true)
        .on_token(move |chunk| sink.lock().unwrap().push(chunk.text.clone()))
        .build()
        .unwrap();

    let result = model.generate(&prompts(&["say hello"]), None).await.unwrap();
    assert_eq!(result.generations.len(), 1);
    let generation = &result.generations[0][0];
    assert_eq!(generation.text, "Hello!");
    assert_eq!(
        generation
            .generation_info
            .as_ref()
            .and_then(|i| i.finish_reason.as_deref()),
        Some("stop")
    );
    assert_eq!(seen.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn invalid_streaming_requests_never_reach_the_endpoint() {
    let server = MockServer::start().await;
    mount_stream(&server, 0).await;

    let streaming = llm(&server).streaming(true).build().unwrap();
    assert!(matches!(
        streaming.generate(&prompts(&["a", "b"]), None).await,
        Err(LlmError::ConfigurationError(_))
    ));

    let n2 = llm(&server).n(2).build().unwrap();
    assert!(n2.stream("a", None).await.is_err());

    let best_of = llm(&server).best_of(2).build().unwrap();
    assert!(best_of.stream("a", None).await.is_err());

    assert!(llm(&server).streaming(true).best_of(3).build().is_err());
}

#[tokio::test]
async fn max_tokens_minus_one_uses_remaining_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .and(body_partial_json(json!({"max_tokens": 90})))
        .respond_with(EchoCompletions)
        .expect(1)
        .mount(&server)
        .await;

    let model = llm(&server)
        .max_tokens(-1)
        .context_size(100)
        .build()
        .unwrap();
    model
        .generate(&prompts(&["ten chars!"]), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn rate_limit_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let model = llm(&server).build().unwrap();
    let err = model.invoke("x").await.unwrap_err();
    assert!(matches!(err, LlmError::RateLimitError(_)));
}

#[tokio::test]
async fn missing_choices_are_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let model = llm(&server).build().unwrap();
    let err = model.generate(&prompts(&["a"]), None).await.unwrap_err();
    assert!(matches!(err, LlmError::ParseError(_)));
}
