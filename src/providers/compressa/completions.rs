//! Compressa Completions
//!
//! Completion-style text model over `/completions`: prompts are sent in sub-batches
//! of `batch_size`, the flat choice list is reshaped into `n` generations per
//! prompt, and token usage is summed across sub-batches.
//!
//! ```rust,no_run
//! use siumai_provider_compressa::providers::compressa::CompressaLlm;
//!
//! # async fn example() -> Result<(), siumai_provider_compressa::LlmError> {
//! let llm = CompressaLlm::builder()
//!     .api_key("your-api-key")
//!     .temperature(0.2)
//!     .build()?;
//! let text = llm.invoke("Say hello").await?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use secrecy::SecretString;
use serde_json::{Map, Value};

use super::client::CompressaClient;
use super::config::CompressaLlmConfig;
use super::result::{ResultBuilder, prepare_params, sub_prompts};
use super::streaming::{CompletionEventConverter, StreamAccumulator};
use crate::error::LlmError;
use crate::retry_api::RetryOptions;
use crate::tokenizer::{LazyTokenizer, TextTokenizer, TokenizerSpec};
use crate::traits::CompletionModel;
use crate::types::{
    CompletionRequest, CompletionResponse, CompletionStream, GenerationChunk, HttpConfig,
    IdentifyingParams, LlmResult, SpecialTokens,
};
use crate::utils::{StreamFactory, block_on};

/// Observer called with every streamed delta.
pub type TokenObserver = Arc<dyn Fn(&GenerationChunk) + Send + Sync>;

/// Remote completions endpoint.
#[async_trait]
pub trait CompletionEndpoint: Send + Sync {
    async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError>;

    /// Open a streamed completion; `request` already carries `stream: true`.
    async fn create_completion_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, LlmError>;
}

#[async_trait]
impl CompletionEndpoint for CompressaClient {
    async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.post_json("completions", request).await
    }

    async fn create_completion_stream(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionStream, LlmError> {
        let response = self.post_stream("completions", request).await?;
        Ok(StreamFactory::create_eventsource_stream(
            response,
            CompletionEventConverter,
        ))
    }
}

/// Compressa completion model.
pub struct CompressaLlm {
    config: CompressaLlmConfig,
    endpoint: Arc<dyn CompletionEndpoint>,
    tokenizer: LazyTokenizer,
    token_observer: Option<TokenObserver>,
}

impl std::fmt::Debug for CompressaLlm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressaLlm")
            .field("config", &self.config)
            .field("tokenizer", &self.tokenizer)
            .finish()
    }
}

impl CompressaLlm {
    pub fn builder() -> CompressaLlmBuilder {
        CompressaLlmBuilder::new()
    }

    /// Build from raw key/value configuration; unknown keys become passthrough parameters.
    pub fn from_values(raw: Map<String, Value>) -> Result<Self, LlmError> {
        let (config, _warnings) = CompressaLlmConfig::from_values(raw)?;
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &CompressaLlmConfig {
        &self.config
    }

    pub fn llm_type(&self) -> &'static str {
        "compressa-llm"
    }

    pub fn identifying_params(&self) -> IdentifyingParams {
        let mut params: IdentifyingParams = self.config.default_params().into_iter().collect();
        params.insert(
            "model_name".to_string(),
            Value::from(self.config.model_name.clone()),
        );
        params
    }

    /// Token ids of `text` under the configured tiktoken encoding.
    pub fn get_token_ids(&self, text: &str) -> Result<Vec<u32>, LlmError> {
        self.tokenizer.get()?.encode(text)
    }

    pub fn get_num_tokens(&self, text: &str) -> Result<usize, LlmError> {
        Ok(self.get_token_ids(text)?.len())
    }

    /// Tokens left in the context window after `prompt`.
    pub fn max_tokens_for_prompt(&self, prompt: &str) -> Result<i64, LlmError> {
        let used = self.get_num_tokens(prompt)?;
        let remaining = self.config.context_size as i64 - used as i64;
        if remaining <= 0 {
            return Err(LlmError::InvalidInput(format!(
                "prompt uses {used} tokens, leaving no room in a context of {}",
                self.config.context_size
            )));
        }
        Ok(remaining)
    }

    fn request(&self, prompt: Vec<String>, params: &Map<String, Value>) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model_name.clone(),
            prompt,
            params: params.clone(),
        }
    }

    /// Generate `n` completions for every prompt.
    pub async fn generate(
        &self,
        prompts: &[String],
        stop: Option<Vec<String>>,
    ) -> Result<LlmResult, LlmError> {
        if self.config.streaming && prompts.len() > 1 {
            return Err(LlmError::ConfigurationError(
                "Cannot stream results with multiple prompts".to_string(),
            ));
        }

        let mut params = self.config.default_params();
        prepare_params(&mut params, prompts, stop, |prompt| {
            self.max_tokens_for_prompt(prompt)
        })?;

        let mut builder = ResultBuilder::new();
        for batch in sub_prompts(prompts, self.config.batch_size) {
            if self.config.streaming {
                for prompt in batch {
                    let mut stream = self.open_stream(prompt, params.clone()).await?;
                    let mut accumulator = StreamAccumulator::new();
                    while let Some(chunk) = stream.next().await {
                        accumulator.push(chunk?)?;
                    }
                    builder.add_choice(accumulator.into_choice()?);
                }
            } else {
                tracing::debug!(prompts = batch.len(), "dispatching completion batch");
                let response = self
                    .endpoint
                    .create_completion(&self.request(batch.to_vec(), &params))
                    .await?;
                builder.add_response(response);
            }
        }

        builder.build(prompts.len(), self.config.n as usize, &self.config.model_name)
    }

    /// Stream completion deltas for one prompt.
    pub async fn stream(
        &self,
        prompt: &str,
        stop: Option<Vec<String>>,
    ) -> Result<CompletionStream, LlmError> {
        if self.config.n > 1 {
            return Err(LlmError::ConfigurationError(
                "Cannot stream results when n > 1".to_string(),
            ));
        }
        if self.config.best_of > 1 {
            return Err(LlmError::ConfigurationError(
                "Cannot stream results when best_of > 1".to_string(),
            ));
        }

        let prompts = [prompt.to_string()];
        let mut params = self.config.default_params();
        prepare_params(&mut params, &prompts, stop, |prompt| {
            self.max_tokens_for_prompt(prompt)
        })?;
        self.open_stream(prompt, params).await
    }

    async fn open_stream(
        &self,
        prompt: &str,
        mut params: Map<String, Value>,
    ) -> Result<CompletionStream, LlmError> {
        params.insert("stream".to_string(), Value::Bool(true));
        let stream = self
            .endpoint
            .create_completion_stream(&self.request(vec![prompt.to_string()], &params))
            .await?;

        match &self.token_observer {
            Some(observer) => {
                let observer = observer.clone();
                Ok(Box::pin(stream.inspect(move |item| {
                    if let Ok(chunk) = item {
                        observer(chunk);
                    }
                })))
            }
            None => Ok(stream),
        }
    }

    /// Text of the first generation for `prompt`.
    pub async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        CompletionModel::invoke(self, prompt).await
    }

    pub fn generate_blocking(
        &self,
        prompts: &[String],
        stop: Option<Vec<String>>,
    ) -> Result<LlmResult, LlmError> {
        block_on(self.generate(prompts, stop))?
    }

    pub fn invoke_blocking(&self, prompt: &str) -> Result<String, LlmError> {
        block_on(self.invoke(prompt))?
    }
}

#[async_trait]
impl CompletionModel for CompressaLlm {
    fn llm_type(&self) -> &'static str {
        CompressaLlm::llm_type(self)
    }

    fn identifying_params(&self) -> IdentifyingParams {
        CompressaLlm::identifying_params(self)
    }

    async fn generate(
        &self,
        prompts: Vec<String>,
        stop: Option<Vec<String>>,
    ) -> Result<LlmResult, LlmError> {
        CompressaLlm::generate(self, &prompts, stop).await
    }

    async fn stream(
        &self,
        prompt: String,
        stop: Option<Vec<String>>,
    ) -> Result<CompletionStream, LlmError> {
        CompressaLlm::stream(self, &prompt, stop).await
    }
}

/// Builder for [`CompressaLlm`].
#[derive(Default)]
pub struct CompressaLlmBuilder {
    config: CompressaLlmConfig,
    http_config: HttpConfig,
    http_client: Option<reqwest::Client>,
    retry_options: Option<RetryOptions>,
    endpoint: Option<Arc<dyn CompletionEndpoint>>,
    tokenizer: Option<Arc<dyn TextTokenizer>>,
    token_observer: Option<TokenObserver>,
}

impl CompressaLlmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: CompressaLlmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.config.compressa_api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.config.compressa_api_base = Some(base_url.into());
        self
    }

    pub fn model<S: Into<String>>(mut self, model: S) -> Self {
        self.config.model_name = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Completion length; `-1` fills the remaining context window.
    pub fn max_tokens(mut self, max_tokens: i64) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn top_p(mut self, top_p: f64) -> Self {
        self.config.top_p = top_p;
        self
    }

    pub fn frequency_penalty(mut self, penalty: f64) -> Self {
        self.config.frequency_penalty = penalty;
        self
    }

    pub fn presence_penalty(mut self, penalty: f64) -> Self {
        self.config.presence_penalty = penalty;
        self
    }

    pub fn n(mut self, n: u32) -> Self {
        self.config.n = n;
        self
    }

    pub fn best_of(mut self, best_of: u32) -> Self {
        self.config.best_of = best_of;
        self
    }

    pub fn logit_bias(mut self, logit_bias: HashMap<String, f64>) -> Self {
        self.config.logit_bias = logit_bias;
        self
    }

    /// Prompts per request
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.config.streaming = streaming;
        self
    }

    pub fn context_size(mut self, context_size: usize) -> Self {
        self.config.context_size = context_size;
        self
    }

    pub fn tiktoken_model_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.tiktoken_model_name = Some(name.into());
        self
    }

    pub fn fallback_encoding<S: Into<String>>(mut self, encoding: S) -> Self {
        self.config.fallback_encoding = encoding.into();
        self
    }

    pub fn allowed_special(mut self, tokens: SpecialTokens) -> Self {
        self.config.allowed_special = tokens;
        self
    }

    pub fn disallowed_special(mut self, tokens: SpecialTokens) -> Self {
        self.config.disallowed_special = tokens;
        self
    }

    pub fn model_kwarg<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.config.model_kwargs.insert(key.into(), value);
        self
    }

    pub fn model_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.config.model_kwargs = kwargs;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.http_config.connect_timeout = Some(timeout);
        self
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.config.default_query.insert(key.into(), value.into());
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.http_config.user_agent = Some(user_agent.into());
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn retry_options(mut self, options: RetryOptions) -> Self {
        self.retry_options = Some(options);
        self
    }

    /// Use a custom endpoint instead of the HTTP client.
    pub fn endpoint(mut self, endpoint: Arc<dyn CompletionEndpoint>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Use a custom tokenizer for token counting.
    pub fn tokenizer(mut self, tokenizer: Arc<dyn TextTokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Observe every streamed delta.
    pub fn on_token<F>(mut self, observer: F) -> Self
    where
        F: Fn(&GenerationChunk) + Send + Sync + 'static,
    {
        self.token_observer = Some(Arc::new(observer));
        self
    }

    pub fn build(self) -> Result<CompressaLlm, LlmError> {
        let config = self.config;
        config.check()?;

        let endpoint = match self.endpoint {
            Some(endpoint) => endpoint,
            None => {
                let mut http_config = config.http_config();
                http_config.connect_timeout = self.http_config.connect_timeout;
                http_config.user_agent = self.http_config.user_agent;
                let retry_options = self
                    .retry_options
                    .unwrap_or_else(|| RetryOptions::from_max_retries(config.max_retries));
                Arc::new(CompressaClient::from_settings(
                    config.compressa_api_key.clone(),
                    config.compressa_api_base.clone(),
                    http_config,
                    retry_options,
                    self.http_client,
                )?) as Arc<dyn CompletionEndpoint>
            }
        };

        let tokenizer = match self.tokenizer {
            Some(tokenizer) => LazyTokenizer::custom(tokenizer),
            None => LazyTokenizer::new(TokenizerSpec {
                fallback_encoding: config.fallback_encoding.clone(),
                allowed_special: config.allowed_special.clone(),
                disallowed_special: config.disallowed_special.clone(),
                ..TokenizerSpec::tiktoken(config.tokenizer_model())
            }),
        };

        Ok(CompressaLlm {
            config,
            endpoint,
            tokenizer,
            token_observer: self.token_observer,
        })
    }
}
