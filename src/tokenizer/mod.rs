//! Tokenizer adapter
//!
//! Wraps an external tokenizer behind [`TextTokenizer`]. Two backends exist:
//!
//! - **sub-word** ([`TiktokenTokenizer`]): chunks are token-id slices, weighted by token count
//! - **text-chunk** (`HuggingFaceTokenizer`, feature `huggingface`): token slices are decoded
//!   back to text before they are sent, and weighted by character count
//!
//! Backends are loaded lazily by [`LazyTokenizer`], so a missing backend surfaces as
//! [`LlmError::TokenizerUnavailable`] on first use rather than at construction.

mod huggingface;
mod tiktoken;

#[cfg(feature = "huggingface")]
pub use huggingface::HuggingFaceTokenizer;
pub use tiktoken::{KNOWN_SPECIAL_TOKENS, TiktokenTokenizer};

use std::sync::{Arc, OnceLock};

use crate::error::LlmError;
use crate::types::SpecialTokens;

/// Unit in which chunks are handed to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkUnit {
    /// Token-id slices
    Tokens,
    /// Token slices decoded back into strings
    Text,
}

/// Encode/decode capability consumed by the chunk planner.
pub trait TextTokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>, LlmError>;

    fn decode(&self, tokens: &[u32]) -> Result<String, LlmError>;

    fn chunk_unit(&self) -> ChunkUnit;
}

/// Which tokenizer backend to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenizerBackend {
    #[default]
    Tiktoken,
    HuggingFace,
}

impl TokenizerBackend {
    /// Backend selected by the `tiktoken_enabled` configuration flag.
    pub fn from_tiktoken_enabled(enabled: bool) -> Self {
        if enabled {
            Self::Tiktoken
        } else {
            Self::HuggingFace
        }
    }
}

/// Everything needed to load a tokenizer backend.
#[derive(Debug, Clone)]
pub struct TokenizerSpec {
    pub backend: TokenizerBackend,
    /// Model name looked up in the backend's registry
    pub model_name: String,
    /// Tiktoken encoding name, or HuggingFace model id / `tokenizer.json` path, used when
    /// `model_name` is not recognised
    pub fallback_encoding: String,
    pub allowed_special: SpecialTokens,
    pub disallowed_special: SpecialTokens,
}

impl TokenizerSpec {
    pub fn tiktoken(model_name: impl Into<String>) -> Self {
        Self {
            backend: TokenizerBackend::Tiktoken,
            model_name: model_name.into(),
            fallback_encoding: tiktoken::DEFAULT_FALLBACK_ENCODING.to_string(),
            allowed_special: SpecialTokens::None,
            disallowed_special: SpecialTokens::None,
        }
    }

    pub fn load(&self) -> Result<Arc<dyn TextTokenizer>, LlmError> {
        match self.backend {
            TokenizerBackend::Tiktoken => Ok(Arc::new(TiktokenTokenizer::for_model(
                &self.model_name,
                &self.fallback_encoding,
                self.allowed_special.clone(),
                self.disallowed_special.clone(),
            )?)),
            TokenizerBackend::HuggingFace => {
                huggingface::load(&self.model_name, &self.fallback_encoding)
            }
        }
    }
}

/// Tokenizer loaded on first use and reused afterwards.
pub struct LazyTokenizer {
    spec: Option<TokenizerSpec>,
    cell: OnceLock<Arc<dyn TextTokenizer>>,
}

impl LazyTokenizer {
    pub fn new(spec: TokenizerSpec) -> Self {
        Self {
            spec: Some(spec),
            cell: OnceLock::new(),
        }
    }

    /// Use an already constructed tokenizer.
    pub fn custom(tokenizer: Arc<dyn TextTokenizer>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(tokenizer);
        Self { spec: None, cell }
    }

    /// Get the tokenizer, loading the backend if this is the first use.
    pub fn get(&self) -> Result<Arc<dyn TextTokenizer>, LlmError> {
        if let Some(tokenizer) = self.cell.get() {
            return Ok(tokenizer.clone());
        }
        let spec = self.spec.as_ref().ok_or_else(|| {
            LlmError::InternalError("tokenizer has neither a spec nor an instance".to_string())
        })?;
        tracing::debug!(backend = ?spec.backend, model = %spec.model_name, "loading tokenizer");
        let loaded = spec.load()?;
        // A concurrent first use may have won the race; either instance is equivalent.
        Ok(self.cell.get_or_init(|| loaded).clone())
    }
}

impl std::fmt::Debug for LazyTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyTokenizer")
            .field("spec", &self.spec)
            .field("loaded", &self.cell.get().is_some())
            .finish()
    }
}
