//! Embedding capability trait

use crate::error::LlmError;
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed every text; the result has one vector per input, in input order.
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_documents(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError("no embedding returned for query".to_string()))
    }

    /// Cosine similarity of two embeddings of the same dimension.
    fn calculate_similarity(
        &self,
        embedding1: &[f32],
        embedding2: &[f32],
    ) -> Result<f32, LlmError> {
        if embedding1.len() != embedding2.len() {
            return Err(LlmError::InvalidInput(
                "Embedding vectors must have the same dimension".to_string(),
            ));
        }
        let dot: f32 = embedding1.iter().zip(embedding2).map(|(a, b)| a * b).sum();
        let norm1: f32 = embedding1.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm2: f32 = embedding2.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm1 == 0.0 || norm2 == 0.0 {
            return Ok(0.0);
        }
        Ok(dot / (norm1 * norm2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl EmbeddingModel for Fixed {
        async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[tokio::test]
    async fn query_is_first_document() {
        assert_eq!(Fixed.embed_query("abc").await.unwrap(), vec![3.0, 1.0]);
    }

    #[test]
    fn similarity() {
        let sim = Fixed.calculate_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
        assert_eq!(Fixed.calculate_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);
        assert!(Fixed.calculate_similarity(&[1.0], &[1.0, 2.0]).is_err());
    }
}
