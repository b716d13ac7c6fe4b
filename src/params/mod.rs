//! Parameter Management Module
//!
//! Splits raw key/value configuration into the typed fields a provider knows and a
//! passthrough bag of model-invocation parameters (`model_kwargs`) that is
//! forwarded verbatim to the endpoint.

use serde_json::{Map, Value};

use crate::error::LlmError;
use crate::types::Warning;

/// Key under which passthrough parameters are supplied explicitly.
pub const MODEL_KWARGS_KEY: &str = "model_kwargs";

/// Known field names of a configuration struct, plus accepted aliases.
#[derive(Debug, Clone, Copy)]
pub struct FieldSet {
    pub fields: &'static [&'static str],
    /// `(alias, canonical)` pairs
    pub aliases: &'static [(&'static str, &'static str)],
}

impl FieldSet {
    /// Canonical name for `key`, if it names a known field or alias.
    pub fn canonical(&self, key: &str) -> Option<&'static str> {
        self.fields
            .iter()
            .copied()
            .find(|f| *f == key)
            .or_else(|| {
                self.aliases
                    .iter()
                    .find(|(alias, _)| *alias == key)
                    .map(|(_, canonical)| *canonical)
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.canonical(key).is_some()
    }
}

/// Result of [`split_model_kwargs`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitParams {
    /// Known fields keyed by canonical name
    pub fields: Map<String, Value>,
    /// Passthrough parameters
    pub model_kwargs: Map<String, Value>,
    /// Whether the caller supplied `model_kwargs` explicitly
    pub explicit_model_kwargs: bool,
    pub warnings: Vec<Warning>,
}

/// Redistribute unknown keys into `model_kwargs`.
///
/// Errors when a key is supplied both top-level and inside `model_kwargs`, or when a
/// known field is passed inside `model_kwargs`. Each moved key yields a [`Warning`].
pub fn split_model_kwargs(
    mut raw: Map<String, Value>,
    known: &FieldSet,
) -> Result<SplitParams, LlmError> {
    let (mut model_kwargs, explicit_model_kwargs) = match raw.remove(MODEL_KWARGS_KEY) {
        None | Some(Value::Null) => (Map::new(), false),
        Some(Value::Object(map)) => (map, true),
        Some(other) => {
            return Err(LlmError::ConfigurationError(format!(
                "`model_kwargs` must be an object, got {other}"
            )));
        }
    };

    let mut explicit: Vec<&str> = model_kwargs
        .keys()
        .filter(|k| known.contains(k))
        .map(String::as_str)
        .collect();
    if !explicit.is_empty() {
        explicit.sort_unstable();
        return Err(LlmError::ConfigurationError(format!(
            "parameters {explicit:?} should be specified explicitly, \
             not passed in as part of `model_kwargs`"
        )));
    }

    let mut fields = Map::new();
    let mut warnings = Vec::new();
    for (key, value) in raw {
        if model_kwargs.contains_key(&key) {
            return Err(LlmError::ConfigurationError(format!(
                "found `{key}` supplied twice"
            )));
        }
        match known.canonical(&key) {
            Some(canonical) => {
                fields.insert(canonical.to_string(), value);
            }
            None => {
                tracing::warn!(
                    key = %key,
                    "`{key}` is not a default parameter and was transferred to model_kwargs; \
                     confirm that this is intended"
                );
                warnings.push(Warning::passthrough(key.clone()));
                model_kwargs.insert(key, value);
            }
        }
    }

    Ok(SplitParams {
        fields,
        model_kwargs,
        explicit_model_kwargs,
        warnings,
    })
}
