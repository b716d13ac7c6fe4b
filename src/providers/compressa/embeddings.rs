//! Compressa Embeddings
//!
//! Length-safe embeddings: inputs are tokenized and split into chunks no longer than
//! `embedding_ctx_length`, chunks are sent in batches of `chunk_size`, and the
//! chunk embeddings are folded back into one vector per input.
//!
//! ```rust,no_run
//! use siumai_provider_compressa::providers::compressa::CompressaEmbeddings;
//!
//! # async fn example() -> Result<(), siumai_provider_compressa::LlmError> {
//! let embeddings = CompressaEmbeddings::builder().api_key("your-api-key").build()?;
//! let vectors = embeddings
//!     .embed_documents(&["first text".to_string(), "second".to_string()])
//!     .await?;
//! assert_eq!(vectors.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::client::CompressaClient;
use super::config::CompressaEmbeddingsConfig;
use crate::chunking::{AggregationContext, ChunkAggregator, ProgressObserver, plan_chunks};
use crate::error::LlmError;
use crate::retry_api::RetryOptions;
use crate::tokenizer::{LazyTokenizer, TextTokenizer, TokenizerBackend, TokenizerSpec};
use crate::traits::EmbeddingModel;
use crate::types::{
    EmbeddingInput, EmbeddingPayload, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage,
    HttpConfig, SpecialTokens,
};
use crate::utils::block_on;

/// Remote embeddings endpoint.
///
/// Must return exactly one vector per submitted input, in submission order.
#[async_trait]
pub trait EmbeddingEndpoint: Send + Sync {
    async fn create_embeddings(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, LlmError>;
}

#[derive(Debug, Deserialize)]
struct EmbeddingsBody {
    data: Vec<EmbeddingDatum>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[async_trait]
impl EmbeddingEndpoint for CompressaClient {
    async fn create_embeddings(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, LlmError> {
        let mut body: EmbeddingsBody = self.post_json("embeddings", request).await?;
        if body.data.iter().all(|d| d.index.is_some()) {
            body.data.sort_by_key(|d| d.index);
        }

        let expected = request.input.expected_len();
        if body.data.len() != expected {
            return Err(LlmError::ParseError(format!(
                "expected {expected} embeddings, got {}",
                body.data.len()
            )));
        }

        Ok(EmbeddingResponse {
            embeddings: body.data.into_iter().map(|d| d.embedding).collect(),
            model: body.model,
            usage: body.usage,
        })
    }
}

/// Compressa embedding model.
pub struct CompressaEmbeddings {
    config: CompressaEmbeddingsConfig,
    endpoint: Arc<dyn EmbeddingEndpoint>,
    tokenizer: LazyTokenizer,
    progress: Option<ProgressObserver>,
}

impl std::fmt::Debug for CompressaEmbeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressaEmbeddings")
            .field("config", &self.config)
            .field("tokenizer", &self.tokenizer)
            .finish()
    }
}

impl CompressaEmbeddings {
    pub fn builder() -> CompressaEmbeddingsBuilder {
        CompressaEmbeddingsBuilder::new()
    }

    /// Build from raw key/value configuration; unknown keys become passthrough parameters.
    pub fn from_values(raw: Map<String, Value>) -> Result<Self, LlmError> {
        let (config, _warnings) = CompressaEmbeddingsConfig::from_values(raw)?;
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &CompressaEmbeddingsConfig {
        &self.config
    }

    fn request(&self, input: EmbeddingPayload) -> EmbeddingRequest {
        EmbeddingRequest {
            model: self.config.model.clone(),
            input,
            params: self.config.model_kwargs.clone(),
        }
    }

    /// Embed every text, one vector per input, in input order.
    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.embed_documents_with_chunk_size(texts, None).await
    }

    /// Like [`embed_documents`](Self::embed_documents) with a per-call batch size.
    ///
    /// `None` or `Some(0)` uses the configured `chunk_size`.
    pub async fn embed_documents_with_chunk_size(
        &self,
        texts: &[String],
        chunk_size: Option<usize>,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        let batch_size = chunk_size
            .filter(|&size| size > 0)
            .unwrap_or(self.config.chunk_size);
        if self.config.check_embedding_ctx_length {
            self.len_safe_embeddings(texts, batch_size).await
        } else {
            self.unchecked_embeddings(texts, batch_size).await
        }
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError("no embedding returned for query".to_string()))
    }

    pub fn embed_documents_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        block_on(self.embed_documents(texts))?
    }

    pub fn embed_documents_with_chunk_size_blocking(
        &self,
        texts: &[String],
        chunk_size: Option<usize>,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        block_on(self.embed_documents_with_chunk_size(texts, chunk_size))?
    }

    pub fn embed_query_blocking(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        block_on(self.embed_query(text))?
    }

    fn report_progress(&self, batch_index: usize, total_batches: usize, chunks: usize) {
        tracing::debug!(
            batch = batch_index,
            total_batches,
            chunks,
            "dispatching embedding batch"
        );
        if let Some(progress) = &self.progress {
            progress(batch_index, total_batches, chunks);
        }
    }

    async fn len_safe_embeddings(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        let tokenizer = self.tokenizer.get()?;
        let plan = plan_chunks(
            tokenizer.as_ref(),
            texts,
            self.config.embedding_ctx_length,
            batch_size,
        )?;

        let total_batches = plan.num_batches();
        let mut chunk_embeddings = Vec::with_capacity(plan.chunks().len());
        for (batch_index, offset) in plan.batches().enumerate() {
            let inputs = plan.batch_inputs(offset);
            self.report_progress(batch_index, total_batches, inputs.len());
            let response = self
                .endpoint
                .create_embeddings(&self.request(EmbeddingPayload::Batch(inputs)))
                .await?;
            chunk_embeddings.extend(response.embeddings);
        }

        let aggregated = ChunkAggregator::new()
            .with_skip_empty(self.config.skip_empty)
            .aggregate(
                plan.num_texts(),
                &plan.weights(),
                &chunk_embeddings,
                &plan.origins(),
            )?;

        let this = self;
        AggregationContext::new()
            .fill_empty(aggregated, move || this.empty_string_embedding())
            .await
    }

    async fn empty_string_embedding(&self) -> Result<Vec<f32>, LlmError> {
        let request = self.request(EmbeddingPayload::Single(EmbeddingInput::Text(String::new())));
        self.endpoint
            .create_embeddings(&request)
            .await?
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError("no embedding returned for empty input".into()))
    }

    /// Send texts as-is, without tokenizing or splitting.
    async fn unchecked_embeddings(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        if batch_size == 0 {
            return Err(LlmError::InvalidParameter(
                "batch size must be greater than 0".to_string(),
            ));
        }
        let total_batches = texts.len().div_ceil(batch_size);
        let mut embeddings = Vec::with_capacity(texts.len());
        for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
            self.report_progress(batch_index, total_batches, batch.len());
            let inputs = batch
                .iter()
                .map(|t| EmbeddingInput::Text(t.clone()))
                .collect();
            let response = self
                .endpoint
                .create_embeddings(&self.request(EmbeddingPayload::Batch(inputs)))
                .await?;
            embeddings.extend(response.embeddings);
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingModel for CompressaEmbeddings {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
        CompressaEmbeddings::embed_documents(self, &texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        CompressaEmbeddings::embed_query(self, text).await
    }
}

/// Builder for [`CompressaEmbeddings`].
///
/// The API key comes from [`api_key`](Self::api_key) or `COMPRESSA_API_KEY`; the base
/// URL from [`base_url`](Self::base_url), `COMPRESSA_API_BASE`, or the public endpoint.
#[derive(Default)]
pub struct CompressaEmbeddingsBuilder {
    config: CompressaEmbeddingsConfig,
    http_config: HttpConfig,
    http_client: Option<reqwest::Client>,
    retry_options: Option<RetryOptions>,
    endpoint: Option<Arc<dyn EmbeddingEndpoint>>,
    tokenizer: Option<Arc<dyn TextTokenizer>>,
    progress: Option<ProgressObserver>,
}

impl CompressaEmbeddingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: CompressaEmbeddingsConfig) -> Self {
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
        self.config.model = model.into();
        self
    }

    /// Maximum number of chunks per request
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_size = chunk_size;
        self
    }

    /// Maximum number of tokens per chunk
    pub fn embedding_ctx_length(mut self, length: usize) -> Self {
        self.config.embedding_ctx_length = length;
        self
    }

    pub fn check_embedding_ctx_length(mut self, check: bool) -> Self {
        self.config.check_embedding_ctx_length = check;
        self
    }

    pub fn skip_empty(mut self, skip_empty: bool) -> Self {
        self.config.skip_empty = skip_empty;
        self
    }

    pub fn tiktoken_enabled(mut self, enabled: bool) -> Self {
        self.config.tiktoken_enabled = enabled;
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

    pub fn show_progress_bar(mut self, show: bool) -> Self {
        self.config.show_progress_bar = show;
        self
    }

    /// Add one passthrough parameter.
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

    /// Use a custom `reqwest::Client`.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Override the retry options derived from `max_retries`.
    pub fn retry_options(mut self, options: RetryOptions) -> Self {
        self.retry_options = Some(options);
        self
    }

    /// Use a custom endpoint instead of the HTTP client.
    pub fn endpoint(mut self, endpoint: Arc<dyn EmbeddingEndpoint>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Use a custom tokenizer instead of the configured backend.
    pub fn tokenizer(mut self, tokenizer: Arc<dyn TextTokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Observe progress once per dispatched batch.
    pub fn on_progress<F>(mut self, observer: F) -> Self
    where
        F: Fn(usize, usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(observer));
        self
    }

    pub fn build(self) -> Result<CompressaEmbeddings, LlmError> {
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
                )?) as Arc<dyn EmbeddingEndpoint>
            }
        };

        let tokenizer = match self.tokenizer {
            Some(tokenizer) => LazyTokenizer::custom(tokenizer),
            None => LazyTokenizer::new(TokenizerSpec {
                backend: TokenizerBackend::from_tiktoken_enabled(config.tiktoken_enabled),
                model_name: config.tokenizer_model().to_string(),
                fallback_encoding: config.fallback_encoding.clone(),
                allowed_special: config.allowed_special.clone(),
                disallowed_special: config.disallowed_special.clone(),
            }),
        };

        let progress = match self.progress {
            Some(progress) => Some(progress),
            None if config.show_progress_bar => Some(logging_progress()),
            None => None,
        };

        Ok(CompressaEmbeddings {
            config,
            endpoint,
            tokenizer,
            progress,
        })
    }
}

fn logging_progress() -> ProgressObserver {
    Arc::new(|batch_index, total_batches, chunks| {
        tracing::info!(
            "embedding batch {}/{} ({chunks} chunks)",
            batch_index + 1,
            total_batches
        );
    })
}
