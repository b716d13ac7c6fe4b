//! Sub-word backend built on `tiktoken-rs`.

use std::collections::HashSet;

use tiktoken_rs::CoreBPE;

use super::{ChunkUnit, TextTokenizer};
use crate::error::LlmError;
use crate::types::SpecialTokens;

pub(super) const DEFAULT_FALLBACK_ENCODING: &str = "cl100k_base";

/// Special tokens understood by the OpenAI BPE encodings.
pub const KNOWN_SPECIAL_TOKENS: &[&str] = &[
    "<|endoftext|>",
    "<|fim_prefix|>",
    "<|fim_middle|>",
    "<|fim_suffix|>",
    "<|endofprompt|>",
];

pub struct TiktokenTokenizer {
    bpe: CoreBPE,
    allowed_special: SpecialTokens,
    disallowed_special: SpecialTokens,
}

impl TiktokenTokenizer {
    /// Load the encoding registered for `model_name`, or `fallback_encoding` when the
    /// model is unknown to the registry.
    pub fn for_model(
        model_name: &str,
        fallback_encoding: &str,
        allowed_special: SpecialTokens,
        disallowed_special: SpecialTokens,
    ) -> Result<Self, LlmError> {
        let bpe = match tiktoken_rs::get_bpe_from_model(model_name) {
            Ok(bpe) => bpe,
            Err(_) => {
                tracing::debug!(
                    model = model_name,
                    fallback = fallback_encoding,
                    "model not known to tiktoken, using fallback encoding"
                );
                encoding_by_name(fallback_encoding)?
            }
        };
        Ok(Self {
            bpe,
            allowed_special,
            disallowed_special,
        })
    }

    fn allowed_set(&self) -> HashSet<&str> {
        match &self.allowed_special {
            SpecialTokens::None => HashSet::new(),
            SpecialTokens::All => KNOWN_SPECIAL_TOKENS.iter().copied().collect(),
            SpecialTokens::Set(tokens) => tokens.iter().map(String::as_str).collect(),
        }
    }

    fn disallowed_list<'a>(&'a self, allowed: &HashSet<&str>) -> Vec<&'a str> {
        match &self.disallowed_special {
            // Unset disallow list defaults to "all" once any policy is configured.
            SpecialTokens::None | SpecialTokens::All => KNOWN_SPECIAL_TOKENS
                .iter()
                .copied()
                .filter(|t| !allowed.contains(t))
                .collect(),
            SpecialTokens::Set(tokens) => tokens.iter().map(String::as_str).collect(),
        }
    }

    /// Encode ordinary text, turning only allowed special markers into their ids.
    fn encode_with_allowed(&self, text: &str, allowed: &HashSet<&str>) -> Vec<u32> {
        let mut ids = Vec::new();
        let mut rest = text;
        loop {
            let next = allowed
                .iter()
                .filter_map(|token| rest.find(token).map(|pos| (pos, *token)))
                .min_by_key(|(pos, token)| (*pos, std::cmp::Reverse(token.len())));
            match next {
                Some((pos, token)) => {
                    ids.extend(self.bpe.encode_ordinary(&rest[..pos]));
                    ids.extend(self.bpe.encode_with_special_tokens(token));
                    rest = &rest[pos + token.len()..];
                }
                None => {
                    ids.extend(self.bpe.encode_ordinary(rest));
                    return ids;
                }
            }
        }
    }
}

impl TextTokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, LlmError> {
        if self.allowed_special.is_none() && self.disallowed_special.is_none() {
            return Ok(self.bpe.encode_ordinary(text));
        }

        let allowed = self.allowed_set();
        if let Some(token) = self
            .disallowed_list(&allowed)
            .into_iter()
            .find(|t| text.contains(t))
        {
            return Err(LlmError::InvalidInput(format!(
                "text contains disallowed special token {token:?}; \
                 add it to allowed_special or remove it from disallowed_special"
            )));
        }

        if allowed.is_empty() {
            Ok(self.bpe.encode_ordinary(text))
        } else {
            Ok(self.encode_with_allowed(text, &allowed))
        }
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, LlmError> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| LlmError::TokenizerError(e.to_string()))
    }

    fn chunk_unit(&self) -> ChunkUnit {
        ChunkUnit::Tokens
    }
}

fn encoding_by_name(name: &str) -> Result<CoreBPE, LlmError> {
    let loaded = match name {
        "cl100k_base" => tiktoken_rs::cl100k_base(),
        "o200k_base" => tiktoken_rs::o200k_base(),
        "p50k_base" => tiktoken_rs::p50k_base(),
        "p50k_edit" => tiktoken_rs::p50k_edit(),
        "r50k_base" | "gpt2" => tiktoken_rs::r50k_base(),
        other => {
            return Err(LlmError::TokenizerUnavailable(format!(
                "unknown tiktoken encoding '{other}'"
            )));
        }
    };
    loaded.map_err(|e| LlmError::TokenizerUnavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer(allowed: SpecialTokens, disallowed: SpecialTokens) -> TiktokenTokenizer {
        TiktokenTokenizer::for_model("gpt-4", "cl100k_base", allowed, disallowed).unwrap()
    }

    #[test]
    fn ordinary_encoding_without_policy() {
        let t = tokenizer(SpecialTokens::None, SpecialTokens::None);
        let plain = t.encode("a <|endoftext|> b").unwrap();
        // Without a policy the marker is encoded as ordinary text.
        assert!(plain.len() > 3);
    }

    #[test]
    fn disallowed_special_rejected() {
        let t = tokenizer(SpecialTokens::None, SpecialTokens::All);
        let err = t.encode("a <|endoftext|> b").unwrap_err();
        assert!(matches!(err, LlmError::InvalidInput(_)));
        assert!(t.encode("nothing special").is_ok());
    }

    #[test]
    fn allowed_special_becomes_single_token() {
        let t = tokenizer(
            SpecialTokens::Set(vec!["<|endoftext|>".to_string()]),
            SpecialTokens::None,
        );
        let ids = t.encode("<|endoftext|>").unwrap();
        assert_eq!(ids.len(), 1);

        let with_text = t.encode("hi<|endoftext|>there").unwrap();
        assert_eq!(t.decode(&with_text).unwrap(), "hi<|endoftext|>there");
    }

    #[test]
    fn empty_text_has_no_tokens() {
        let t = tokenizer(SpecialTokens::None, SpecialTokens::None);
        assert!(t.encode("").unwrap().is_empty());
    }
}
