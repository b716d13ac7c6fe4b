//! Completion capability trait

use crate::error::LlmError;
use crate::types::streaming::CompletionStream;
use crate::types::{IdentifyingParams, LlmResult};
use async_trait::async_trait;

#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Short identifier of the model family.
    fn llm_type(&self) -> &'static str;

    /// Parameters that identify this model configuration.
    fn identifying_params(&self) -> IdentifyingParams;

    /// Generate completions for every prompt.
    ///
    /// `generations[i]` holds the completions for `prompts[i]`.
    async fn generate(
        &self,
        prompts: Vec<String>,
        stop: Option<Vec<String>>,
    ) -> Result<LlmResult, LlmError>;

    async fn stream(
        &self,
        _prompt: String,
        _stop: Option<Vec<String>>,
    ) -> Result<CompletionStream, LlmError> {
        Err(LlmError::UnsupportedOperation(
            "Streaming completion not supported by this provider".to_string(),
        ))
    }

    /// Text of the first generation for a single prompt.
    async fn invoke(&self, prompt: &str) -> Result<String, LlmError> {
        let result = self.generate(vec![prompt.to_string()], None).await?;
        result
            .generations
            .into_iter()
            .next()
            .and_then(|g| g.into_iter().next())
            .map(|g| g.text)
            .ok_or_else(|| LlmError::ParseError("no generation returned".to_string()))
    }
}
