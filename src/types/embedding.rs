//! Embedding request/response types.

use serde::{Deserialize, Serialize};

/// Payload of one chunk sent to the embeddings endpoint.
///
/// The sub-word backend sends token ids; the text-chunk backend sends the
/// decoded substring because the endpoint cannot read its opaque ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Tokens(Vec<u32>),
    Text(String),
}

impl EmbeddingInput {
    /// Weight of the chunk during multi-chunk aggregation.
    ///
    /// Token count for the sub-word backend, character count for decoded text.
    pub fn weight(&self) -> usize {
        match self {
            Self::Tokens(tokens) => tokens.len(),
            Self::Text(text) => text.chars().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.weight() == 0
    }
}

impl From<&str> for EmbeddingInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u32>> for EmbeddingInput {
    fn from(tokens: Vec<u32>) -> Self {
        Self::Tokens(tokens)
    }
}

/// `input` field of an embeddings request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EmbeddingPayload {
    Single(EmbeddingInput),
    Batch(Vec<EmbeddingInput>),
}

impl EmbeddingPayload {
    /// Number of vectors the endpoint is expected to return.
    pub fn expected_len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(inputs) => inputs.len(),
        }
    }
}

/// Body of `POST /embeddings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: EmbeddingPayload,
    /// Passthrough parameters, flattened into the body
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Embedding usage information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Embeddings returned by one endpoint call, in submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub model: Option<String>,
    pub usage: Option<EmbeddingUsage>,
}

impl EmbeddingResponse {
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        Self {
            embeddings,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_counts_tokens_or_chars() {
        assert_eq!(EmbeddingInput::Tokens(vec![1, 2, 3]).weight(), 3);
        assert_eq!(EmbeddingInput::Text("héllo".into()).weight(), 5);
        assert!(EmbeddingInput::Text(String::new()).is_empty());
    }

    #[test]
    fn serializes_untagged() {
        let tokens = serde_json::to_value(EmbeddingInput::Tokens(vec![4, 5])).unwrap();
        assert_eq!(tokens, serde_json::json!([4, 5]));
        let text = serde_json::to_value(EmbeddingInput::from("hi")).unwrap();
        assert_eq!(text, serde_json::json!("hi"));
    }

    #[test]
    fn request_flattens_params() {
        let mut params = serde_json::Map::new();
        params.insert("encoding_format".into(), serde_json::json!("float"));
        let request = EmbeddingRequest {
            model: "m".into(),
            input: EmbeddingPayload::Batch(vec![vec![1, 2].into(), "x".into()]),
            params,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"model": "m", "input": [[1, 2], "x"], "encoding_format": "float"})
        );
        assert_eq!(request.input.expected_len(), 2);
    }
}
