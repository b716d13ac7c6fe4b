//! Text-chunk backend built on HuggingFace `tokenizers` (feature `huggingface`).

use std::sync::Arc;

use super::TextTokenizer;
use crate::error::LlmError;

#[cfg(feature = "huggingface")]
pub use enabled::HuggingFaceTokenizer;

/// Load `model_name`, then `fallback` when the model cannot be loaded.
#[cfg(feature = "huggingface")]
pub(super) fn load(model_name: &str, fallback: &str) -> Result<Arc<dyn TextTokenizer>, LlmError> {
    match HuggingFaceTokenizer::from_name_or_file(model_name) {
        Ok(tokenizer) => Ok(Arc::new(tokenizer)),
        Err(primary) if !fallback.is_empty() && fallback != model_name => {
            tracing::warn!(
                model = model_name,
                fallback,
                error = %primary,
                "HuggingFace tokenizer not found, using fallback"
            );
            let tokenizer = HuggingFaceTokenizer::from_name_or_file(fallback).map_err(|e| {
                LlmError::TokenizerUnavailable(format!("{primary}; fallback {e}"))
            })?;
            Ok(Arc::new(tokenizer))
        }
        Err(primary) => Err(primary),
    }
}

#[cfg(not(feature = "huggingface"))]
pub(super) fn load(model_name: &str, _fallback: &str) -> Result<Arc<dyn TextTokenizer>, LlmError> {
    Err(LlmError::TokenizerUnavailable(format!(
        "the HuggingFace tokenizer for '{model_name}' requires the `huggingface` feature; \
         enable it or set tiktoken_enabled = true"
    )))
}

#[cfg(feature = "huggingface")]
mod enabled {
    use std::path::Path;

    use super::super::{ChunkUnit, TextTokenizer};
    use crate::error::LlmError;

    pub struct HuggingFaceTokenizer {
        inner: tokenizers::Tokenizer,
    }

    impl HuggingFaceTokenizer {
        /// Load from a local `tokenizer.json` (any `.json` path), or from the hub by model id.
        pub fn from_name_or_file(name: &str) -> Result<Self, LlmError> {
            let path = Path::new(name);
            let inner = if path.is_file() || path.extension().is_some_and(|ext| ext == "json") {
                tokenizers::Tokenizer::from_file(name)
            } else {
                tokenizers::Tokenizer::from_pretrained(name, None)
            }
            .map_err(|e| LlmError::TokenizerUnavailable(format!("{name}: {e}")))?;
            Ok(Self { inner })
        }

        pub fn new(inner: tokenizers::Tokenizer) -> Self {
            Self { inner }
        }
    }

    impl TextTokenizer for HuggingFaceTokenizer {
        fn encode(&self, text: &str) -> Result<Vec<u32>, LlmError> {
            self.inner
                .encode(text, false)
                .map(|encoding| encoding.get_ids().to_vec())
                .map_err(|e| LlmError::TokenizerError(e.to_string()))
        }

        fn decode(&self, tokens: &[u32]) -> Result<String, LlmError> {
            self.inner
                .decode(tokens, false)
                .map_err(|e| LlmError::TokenizerError(e.to_string()))
        }

        fn chunk_unit(&self) -> ChunkUnit {
            ChunkUnit::Text
        }
    }
}

#[cfg(all(test, feature = "huggingface"))]
mod tests {
    use super::super::ChunkUnit;
    use super::*;

    const WORD_LEVEL: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"[UNK]": 0, "hello": 1, "world": 2},
            "unk_token": "[UNK]"
        }
    }"#;

    #[test]
    fn unknown_model_loads_fallback_file() {
        let name = format!("compressa-word-level-{}.json", std::process::id());
        let fallback = std::env::temp_dir().join(name);
        std::fs::write(&fallback, WORD_LEVEL).unwrap();

        let tokenizer = load("missing/tokenizer.json", fallback.to_str().unwrap()).unwrap();
        assert_eq!(tokenizer.chunk_unit(), ChunkUnit::Text);
        assert_eq!(tokenizer.encode("hello world").unwrap(), vec![1, 2]);

        let err = load("missing/tokenizer.json", "missing/other.json").unwrap_err();
        assert!(matches!(err, LlmError::TokenizerUnavailable(_)));

        let _ = std::fs::remove_file(fallback);
    }
}
