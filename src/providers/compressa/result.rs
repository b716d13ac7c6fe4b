//! Completion result builder
//!
//! Plans sub-prompt batches and reshapes the flat choice list of all batches into
//! one group of `n` generations per prompt.

use serde_json::{Map, Value};

use crate::error::LlmError;
use crate::types::{
    CompletionChoice, CompletionResponse, Generation, LlmOutput, LlmResult, TokenUsage,
};

/// Apply `stop` and resolve `max_tokens = -1` on the request parameters.
///
/// `max_tokens_for_prompt` is only called for the `-1` case.
pub fn prepare_params<F>(
    params: &mut Map<String, Value>,
    prompts: &[String],
    stop: Option<Vec<String>>,
    max_tokens_for_prompt: F,
) -> Result<(), LlmError>
where
    F: FnOnce(&str) -> Result<i64, LlmError>,
{
    if let Some(stop) = stop {
        if params.contains_key("stop") {
            return Err(LlmError::ConfigurationError(
                "`stop` found in both the input and default params".to_string(),
            ));
        }
        params.insert("stop".to_string(), Value::from(stop));
    }

    if params.get("max_tokens").and_then(Value::as_i64) == Some(-1) {
        let [prompt] = prompts else {
            return Err(LlmError::ConfigurationError(
                "max_tokens set to -1 not supported for multiple inputs".to_string(),
            ));
        };
        params.insert(
            "max_tokens".to_string(),
            Value::from(max_tokens_for_prompt(prompt.as_str())?),
        );
    }
    Ok(())
}

/// Group prompts into request-sized batches.
pub fn sub_prompts(prompts: &[String], batch_size: usize) -> Vec<&[String]> {
    prompts.chunks(batch_size.max(1)).collect()
}

/// Collects choices and usage across sub-batches.
#[derive(Debug, Default)]
pub struct ResultBuilder {
    choices: Vec<CompletionChoice>,
    token_usage: TokenUsage,
    system_fingerprint: Option<String>,
}

impl ResultBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response(&mut self, response: CompletionResponse) {
        if let Some(usage) = &response.usage {
            self.token_usage.accumulate(usage);
        }
        if self.system_fingerprint.is_none() {
            self.system_fingerprint = response.system_fingerprint;
        }
        self.choices.extend(response.choices);
    }

    pub fn add_choice(&mut self, choice: CompletionChoice) {
        self.choices.push(choice);
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Reshape into `num_prompts` groups; group `i` covers choices `[i*n, (i+1)*n)`.
    pub fn build(
        self,
        num_prompts: usize,
        n: usize,
        model_name: &str,
    ) -> Result<LlmResult, LlmError> {
        let n = n.max(1);
        if self.choices.len() != num_prompts * n {
            return Err(LlmError::ParseError(format!(
                "expected {} choices for {num_prompts} prompts with n = {n}, got {}",
                num_prompts * n,
                self.choices.len()
            )));
        }

        let mut choices = self.choices.into_iter();
        let generations = (0..num_prompts)
            .map(|_| choices.by_ref().take(n).map(Generation::from).collect())
            .collect();

        Ok(LlmResult {
            generations,
            llm_output: Some(LlmOutput {
                token_usage: self.token_usage,
                model_name: model_name.to_string(),
                system_fingerprint: self.system_fingerprint,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CompletionUsage;

    fn choice(text: &str) -> CompletionChoice {
        CompletionChoice {
            text: text.to_string(),
            index: None,
            finish_reason: Some("stop".to_string()),
            logprobs: None,
        }
    }

    fn prompts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("p{i}")).collect()
    }

    #[test]
    fn reshapes_by_n() {
        let mut builder = ResultBuilder::new();
        for text in ["a0", "a1", "b0", "b1", "c0", "c1"] {
            builder.add_choice(choice(text));
        }
        let result = builder.build(3, 2, "m").unwrap();
        let texts: Vec<Vec<&str>> = result
            .generations
            .iter()
            .map(|g| g.iter().map(|g| g.text.as_str()).collect())
            .collect();
        assert_eq!(texts, vec![vec!["a0", "a1"], vec!["b0", "b1"], vec!["c0", "c1"]]);
    }

    #[test]
    fn choice_count_must_match() {
        let mut builder = ResultBuilder::new();
        builder.add_choice(choice("a"));
        assert!(builder.build(2, 1, "m").is_err());
    }

    #[test]
    fn usage_summed_and_first_fingerprint_kept() {
        let mut builder = ResultBuilder::new();
        builder.add_response(CompletionResponse {
            id: None,
            model: None,
            choices: vec![choice("a")],
            usage: Some(CompletionUsage {
                prompt_tokens: Some(3),
                completion_tokens: Some(5),
                total_tokens: Some(8),
            }),
            system_fingerprint: Some("fp-1".into()),
        });
        builder.add_response(CompletionResponse {
            id: None,
            model: None,
            choices: vec![choice("b")],
            usage: Some(CompletionUsage {
                prompt_tokens: Some(1),
                completion_tokens: None,
                total_tokens: Some(1),
            }),
            system_fingerprint: Some("fp-2".into()),
        });
        let output = builder.build(2, 1, "m").unwrap().llm_output.unwrap();
        assert_eq!(output.token_usage.prompt_tokens, Some(4));
        assert_eq!(output.token_usage.completion_tokens, Some(5));
        assert_eq!(output.token_usage.total_tokens, Some(9));
        assert_eq!(output.system_fingerprint.as_deref(), Some("fp-1"));
        assert_eq!(output.model_name, "m");
    }

    #[test]
    fn stop_conflict_rejected() {
        let mut params = Map::new();
        params.insert("stop".into(), Value::from(vec!["\n"]));
        let err = prepare_params(&mut params, &prompts(1), Some(vec!["x".into()]), |_| Ok(0))
            .unwrap_err();
        assert!(matches!(err, LlmError::ConfigurationError(_)));
    }

    #[test]
    fn max_tokens_minus_one() {
        let mut params = Map::new();
        params.insert("max_tokens".into(), Value::from(-1));
        prepare_params(&mut params, &prompts(1), None, |p| {
            assert_eq!(p, "p0");
            Ok(100)
        })
        .unwrap();
        assert_eq!(params["max_tokens"], Value::from(100));

        let mut params = Map::new();
        params.insert("max_tokens".into(), Value::from(-1));
        assert!(prepare_params(&mut params, &prompts(2), None, |_| Ok(1)).is_err());
    }

    #[test]
    fn batches_prompts() {
        let all = prompts(5);
        let batches = sub_prompts(&all, 2);
        assert_eq!(batches.iter().map(|b| b.len()).collect::<Vec<_>>(), vec![2, 2, 1]);
    }
}
