//! Compressa Configuration
//!
//! Typed configuration for the embeddings and completion providers. Both can be
//! built from raw key/value input through `from_values`, which moves unknown keys
//! into `model_kwargs`.

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::LlmError;
use crate::params::{FieldSet, MODEL_KWARGS_KEY, split_model_kwargs};
use crate::types::{HttpConfig, SpecialTokens, Warning};

pub const DEFAULT_BASE_URL: &str = "https://compressa-api.mil-team.ru/v1";
pub const API_KEY_ENV: &str = "COMPRESSA_API_KEY";
pub const API_BASE_ENV: &str = "COMPRESSA_API_BASE";

pub const DEFAULT_EMBEDDING_MODEL: &str =
    "/app/resources/models/models/Salesforce_SFR-Embedding-Mistral";
pub const DEFAULT_LLM_MODEL: &str = "/app/resources/models/models/compressa-ai_Llama-3-8B-Instruct";
pub const DEFAULT_TIKTOKEN_MODEL: &str = "Salesforce/SFR-Embedding-Mistral";
pub const DEFAULT_FALLBACK_ENCODING: &str = "cl100k_base";

const COMMON_ALIASES: &[(&str, &str)] = &[
    ("api_key", "compressa_api_key"),
    ("base_url", "compressa_api_base"),
    ("timeout", "request_timeout"),
];

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Timeouts are given in (fractional) seconds.
fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer)?
        .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
        .transpose()
}

fn from_fields<T: for<'de> Deserialize<'de>>(fields: Map<String, Value>) -> Result<T, LlmError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| LlmError::ConfigurationError(format!("invalid configuration: {e}")))
}

fn http_config_from(
    timeout: Option<Duration>,
    headers: &HashMap<String, String>,
    query: &HashMap<String, String>,
) -> HttpConfig {
    let mut http = HttpConfig::new();
    http.timeout = timeout;
    http.headers = headers.clone();
    let mut query: Vec<_> = query.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    query.sort();
    http.query = query;
    http
}

/// Configuration of [`CompressaEmbeddings`](super::CompressaEmbeddings).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct CompressaEmbeddingsConfig {
    pub model: String,
    /// Falls back to `COMPRESSA_API_KEY`
    #[serde(alias = "api_key", deserialize_with = "deserialize_secret")]
    pub compressa_api_key: Option<SecretString>,
    /// Falls back to `COMPRESSA_API_BASE`, then the public endpoint
    #[serde(alias = "base_url")]
    pub compressa_api_base: Option<String>,
    /// Maximum number of chunks per request
    #[validate(range(min = 1))]
    pub chunk_size: usize,
    /// Maximum number of tokens per chunk
    #[validate(range(min = 1))]
    pub embedding_ctx_length: usize,
    /// Split long inputs; when off, texts are sent as-is
    pub check_embedding_ctx_length: bool,
    pub skip_empty: bool,
    pub tiktoken_enabled: bool,
    pub tiktoken_model_name: Option<String>,
    pub fallback_encoding: String,
    pub allowed_special: SpecialTokens,
    pub disallowed_special: SpecialTokens,
    /// Log progress once per dispatched batch
    pub show_progress_bar: bool,
    pub model_kwargs: Map<String, Value>,
    pub max_retries: u32,
    #[serde(alias = "timeout", deserialize_with = "deserialize_timeout")]
    pub request_timeout: Option<Duration>,
    pub default_headers: HashMap<String, String>,
    pub default_query: HashMap<String, String>,
}

impl Default for CompressaEmbeddingsConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            compressa_api_key: None,
            compressa_api_base: None,
            chunk_size: 1000,
            embedding_ctx_length: 8191,
            check_embedding_ctx_length: true,
            skip_empty: false,
            tiktoken_enabled: true,
            tiktoken_model_name: Some(DEFAULT_TIKTOKEN_MODEL.to_string()),
            fallback_encoding: DEFAULT_FALLBACK_ENCODING.to_string(),
            allowed_special: SpecialTokens::None,
            disallowed_special: SpecialTokens::None,
            show_progress_bar: false,
            model_kwargs: Self::default_model_kwargs(),
            max_retries: 2,
            request_timeout: None,
            default_headers: HashMap::new(),
            default_query: HashMap::new(),
        }
    }
}

impl CompressaEmbeddingsConfig {
    pub const FIELDS: FieldSet = FieldSet {
        fields: &[
            "model",
            "compressa_api_key",
            "compressa_api_base",
            "chunk_size",
            "embedding_ctx_length",
            "check_embedding_ctx_length",
            "skip_empty",
            "tiktoken_enabled",
            "tiktoken_model_name",
            "fallback_encoding",
            "allowed_special",
            "disallowed_special",
            "show_progress_bar",
            MODEL_KWARGS_KEY,
            "max_retries",
            "request_timeout",
            "default_headers",
            "default_query",
        ],
        aliases: COMMON_ALIASES,
    };

    pub fn default_model_kwargs() -> Map<String, Value> {
        let mut kwargs = Map::new();
        kwargs.insert("encoding_format".to_string(), Value::from("float"));
        kwargs
    }

    /// Build from raw key/value input.
    ///
    /// Unknown keys become passthrough parameters and are reported as warnings. When
    /// `model_kwargs` is not given explicitly, the default passthrough parameters are kept.
    pub fn from_values(raw: Map<String, Value>) -> Result<(Self, Vec<Warning>), LlmError> {
        let split = split_model_kwargs(raw, &Self::FIELDS)?;
        let mut model_kwargs = if split.explicit_model_kwargs {
            Map::new()
        } else {
            Self::default_model_kwargs()
        };
        model_kwargs.extend(split.model_kwargs);

        let mut fields = split.fields;
        fields.insert(MODEL_KWARGS_KEY.to_string(), Value::Object(model_kwargs));
        let config: Self = from_fields(fields)?;
        config.check()?;
        Ok((config, split.warnings))
    }

    pub fn check(&self) -> Result<(), LlmError> {
        self.validate()?;
        Ok(())
    }

    /// Model name handed to the tokenizer registry.
    pub fn tokenizer_model(&self) -> &str {
        self.tiktoken_model_name.as_deref().unwrap_or(&self.model)
    }

    pub fn http_config(&self) -> HttpConfig {
        http_config_from(
            self.request_timeout,
            &self.default_headers,
            &self.default_query,
        )
    }
}

/// Configuration of [`CompressaLlm`](super::CompressaLlm).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct CompressaLlmConfig {
    #[serde(alias = "model")]
    pub model_name: String,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f64,
    /// `-1` fills the remaining context window of a single prompt
    #[validate(range(min = -1))]
    pub max_tokens: i64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    /// Completions per prompt
    #[validate(range(min = 1))]
    pub n: u32,
    #[validate(range(min = 1))]
    pub best_of: u32,
    pub logit_bias: HashMap<String, f64>,
    pub model_kwargs: Map<String, Value>,
    #[serde(alias = "api_key", deserialize_with = "deserialize_secret")]
    pub compressa_api_key: Option<SecretString>,
    #[serde(alias = "base_url")]
    pub compressa_api_base: Option<String>,
    /// Prompts per request
    #[validate(range(min = 1))]
    pub batch_size: usize,
    #[serde(alias = "timeout", deserialize_with = "deserialize_timeout")]
    pub request_timeout: Option<Duration>,
    pub max_retries: u32,
    pub streaming: bool,
    pub allowed_special: SpecialTokens,
    pub disallowed_special: SpecialTokens,
    pub tiktoken_model_name: Option<String>,
    pub fallback_encoding: String,
    /// Context window used to resolve `max_tokens = -1`
    #[validate(range(min = 1))]
    pub context_size: usize,
    pub default_headers: HashMap<String, String>,
    pub default_query: HashMap<String, String>,
}

impl Default for CompressaLlmConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_LLM_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 256,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            n: 1,
            best_of: 1,
            logit_bias: HashMap::new(),
            model_kwargs: Map::new(),
            compressa_api_key: None,
            compressa_api_base: None,
            batch_size: 20,
            request_timeout: None,
            max_retries: 2,
            streaming: false,
            allowed_special: SpecialTokens::None,
            disallowed_special: SpecialTokens::All,
            tiktoken_model_name: Some(DEFAULT_TIKTOKEN_MODEL.to_string()),
            fallback_encoding: DEFAULT_FALLBACK_ENCODING.to_string(),
            context_size: 8192,
            default_headers: HashMap::new(),
            default_query: HashMap::new(),
        }
    }
}

impl CompressaLlmConfig {
    pub const FIELDS: FieldSet = FieldSet {
        fields: &[
            "model_name",
            "temperature",
            "max_tokens",
            "top_p",
            "frequency_penalty",
            "presence_penalty",
            "n",
            "best_of",
            "logit_bias",
            MODEL_KWARGS_KEY,
            "compressa_api_key",
            "compressa_api_base",
            "batch_size",
            "request_timeout",
            "max_retries",
            "streaming",
            "allowed_special",
            "disallowed_special",
            "tiktoken_model_name",
            "fallback_encoding",
            "context_size",
            "default_headers",
            "default_query",
        ],
        aliases: &[
            ("model", "model_name"),
            ("api_key", "compressa_api_key"),
            ("base_url", "compressa_api_base"),
            ("timeout", "request_timeout"),
        ],
    };

    /// Build from raw key/value input; unknown keys become passthrough parameters.
    pub fn from_values(raw: Map<String, Value>) -> Result<(Self, Vec<Warning>), LlmError> {
        let split = split_model_kwargs(raw, &Self::FIELDS)?;
        let mut fields = split.fields;
        fields.insert(
            MODEL_KWARGS_KEY.to_string(),
            Value::Object(split.model_kwargs),
        );
        let config: Self = from_fields(fields)?;
        config.check()?;
        Ok((config, split.warnings))
    }

    /// Range checks plus the streaming constraints.
    pub fn check(&self) -> Result<(), LlmError> {
        self.validate()?;
        if self.streaming && self.n > 1 {
            return Err(LlmError::ConfigurationError(
                "Cannot stream results when n > 1".to_string(),
            ));
        }
        if self.streaming && self.best_of > 1 {
            return Err(LlmError::ConfigurationError(
                "Cannot stream results when best_of > 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Sampling parameters sent with every request, overlaid by `model_kwargs`.
    pub fn default_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("temperature".to_string(), Value::from(self.temperature));
        params.insert("top_p".to_string(), Value::from(self.top_p));
        params.insert(
            "frequency_penalty".to_string(),
            Value::from(self.frequency_penalty),
        );
        params.insert(
            "presence_penalty".to_string(),
            Value::from(self.presence_penalty),
        );
        params.insert("n".to_string(), Value::from(self.n));
        let logit_bias: Map<String, Value> = self
            .logit_bias
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(*v)))
            .collect();
        params.insert("logit_bias".to_string(), Value::Object(logit_bias));
        params.insert("max_tokens".to_string(), Value::from(self.max_tokens));
        params.insert("best_of".to_string(), Value::from(self.best_of));
        params.extend(self.model_kwargs.clone());
        params
    }

    pub fn tokenizer_model(&self) -> &str {
        self.tiktoken_model_name.as_deref().unwrap_or(&self.model_name)
    }

    pub fn http_config(&self) -> HttpConfig {
        http_config_from(
            self.request_timeout,
            &self.default_headers,
            &self.default_query,
        )
    }
}
