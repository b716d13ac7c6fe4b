//! Common enums and metadata types.

use serde::{Deserialize, Serialize};

/// Non-fatal configuration warning.
///
/// Produced when raw configuration contains keys that are not typed fields and
/// were moved into the passthrough `model_kwargs` bag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Warning {
    /// A key was not recognised and is forwarded verbatim to the endpoint
    PassthroughParameter {
        /// The forwarded key
        key: String,
    },
}

impl Warning {
    pub fn passthrough(key: impl Into<String>) -> Self {
        Self::PassthroughParameter { key: key.into() }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PassthroughParameter { key } => write!(
                f,
                "{key} is not a default parameter and was transferred to model_kwargs; \
                 confirm that {key} is what you intended"
            ),
        }
    }
}

/// Special-token policy for the sub-word tokenizer.
///
/// Mirrors the allow/deny lists of BPE tokenizers: `All` means every special
/// token known to the encoding, `Set` lists them explicitly. Serialized as
/// `null`, `"all"` or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpecialTokens {
    #[default]
    None,
    All,
    Set(Vec<String>),
}

impl SpecialTokens {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl Serialize for SpecialTokens {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_none(),
            Self::All => serializer.serialize_str("all"),
            Self::Set(tokens) => tokens.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SpecialTokens {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Marker(String),
            List(Vec<String>),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(Self::None),
            Some(Raw::Marker(s)) if s == "all" => Ok(Self::All),
            Some(Raw::Marker(s)) => Err(serde::de::Error::custom(format!(
                "expected \"all\" or a list of special tokens, got \"{s}\""
            ))),
            Some(Raw::List(tokens)) => Ok(Self::Set(tokens)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_tokens_from_json() {
        let all: SpecialTokens = serde_json::from_value(serde_json::json!("all")).unwrap();
        assert_eq!(all, SpecialTokens::All);

        let set: SpecialTokens =
            serde_json::from_value(serde_json::json!(["<|endoftext|>"])).unwrap();
        assert_eq!(set, SpecialTokens::Set(vec!["<|endoftext|>".to_string()]));

        let none: SpecialTokens = serde_json::from_value(serde_json::Value::Null).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn warning_display_mentions_key() {
        let warning = Warning::passthrough("dimensions");
        assert!(warning.to_string().contains("dimensions"));
    }
}
