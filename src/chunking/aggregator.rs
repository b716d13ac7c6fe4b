//! Chunk aggregator
//!
//! Rebuilds one embedding per input text from per-chunk embeddings:
//!
//! - no chunks: a sentinel, later replaced by the empty-string embedding
//! - one chunk: that embedding, untouched
//! - several chunks: token-weighted average, then L2-normalized

use crate::error::LlmError;

pub struct ChunkAggregator {
    skip_empty: bool,
}

impl ChunkAggregator {
    pub fn new() -> Self {
        Self { skip_empty: false }
    }

    /// Exclude chunks whose weight is zero.
    pub fn with_skip_empty(mut self, skip_empty: bool) -> Self {
        self.skip_empty = skip_empty;
        self
    }

    /// Aggregate chunk embeddings per originating text.
    ///
    /// `weights`, `embeddings` and `origins` are parallel, one entry per chunk.
    /// The result has exactly `num_texts` entries; `None` marks a text with no
    /// contributing chunk.
    pub fn aggregate(
        &self,
        num_texts: usize,
        weights: &[usize],
        embeddings: &[Vec<f32>],
        origins: &[usize],
    ) -> Result<Vec<Option<Vec<f32>>>, LlmError> {
        if weights.len() != embeddings.len() || origins.len() != embeddings.len() {
            return Err(LlmError::InternalError(format!(
                "mismatched chunk data: {} weights, {} embeddings, {} origins",
                weights.len(),
                embeddings.len(),
                origins.len()
            )));
        }

        let mut grouped: Vec<Vec<(&[f32], usize)>> = vec![Vec::new(); num_texts];
        for ((embedding, &weight), &origin) in embeddings.iter().zip(weights).zip(origins) {
            if self.skip_empty && weight == 0 {
                continue;
            }
            let slot = grouped.get_mut(origin).ok_or_else(|| {
                LlmError::InternalError(format!(
                    "chunk origin {origin} out of range for {num_texts} texts"
                ))
            })?;
            slot.push((embedding.as_slice(), weight));
        }

        grouped
            .into_iter()
            .enumerate()
            .map(|(index, parts)| match parts.as_slice() {
                [] => Ok(None),
                [(single, _)] => Ok(Some(single.to_vec())),
                _ => weighted_normalized_average(index, &parts).map(Some),
            })
            .collect()
    }
}

impl Default for ChunkAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for [`ChunkAggregator::aggregate`].
pub fn aggregate(
    num_texts: usize,
    weights: &[usize],
    embeddings: &[Vec<f32>],
    origins: &[usize],
    skip_empty: bool,
) -> Result<Vec<Option<Vec<f32>>>, LlmError> {
    ChunkAggregator::new()
        .with_skip_empty(skip_empty)
        .aggregate(num_texts, weights, embeddings, origins)
}

fn weighted_normalized_average(
    index: usize,
    parts: &[(&[f32], usize)],
) -> Result<Vec<f32>, LlmError> {
    let dimension = parts[0].0.len();
    if let Some((other, _)) = parts.iter().find(|(e, _)| e.len() != dimension) {
        return Err(LlmError::ParseError(format!(
            "chunk embeddings for text {index} differ in dimension ({dimension} vs {})",
            other.len()
        )));
    }

    let total_weight: f64 = parts.iter().map(|(_, w)| *w as f64).sum();
    if total_weight == 0.0 {
        return Err(LlmError::DegenerateAggregation {
            index,
            reason: "total chunk weight is zero".to_string(),
        });
    }

    // Accumulate in f64; chunk counts for long documents can be large.
    let mut average = vec![0.0f64; dimension];
    for (embedding, weight) in parts {
        let weight = *weight as f64;
        for (acc, value) in average.iter_mut().zip(embedding.iter()) {
            *acc += f64::from(*value) * weight;
        }
    }
    for value in &mut average {
        *value /= total_weight;
    }

    let norm = average.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(LlmError::DegenerateAggregation {
            index,
            reason: format!("weighted average has norm {norm}"),
        });
    }

    Ok(average.into_iter().map(|v| (v / norm) as f32).collect())
}

/// Per-call state for filling texts that produced no chunks.
///
/// The empty-string embedding is fetched at most once per top-level call and
/// reused for every empty text in that call.
#[derive(Debug, Default)]
pub struct AggregationContext {
    empty_embedding: Option<Vec<f32>>,
}

impl AggregationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_empty_embedding(&self) -> Option<&[f32]> {
        self.empty_embedding.as_deref()
    }

    /// Replace every sentinel, calling `fetch` on first demand only.
    pub async fn fill_empty<F, Fut>(
        &mut self,
        aggregated: Vec<Option<Vec<f32>>>,
        mut fetch: F,
    ) -> Result<Vec<Vec<f32>>, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Vec<f32>, LlmError>>,
    {
        let mut filled = Vec::with_capacity(aggregated.len());
        for embedding in aggregated {
            match embedding {
                Some(embedding) => filled.push(embedding),
                None => {
                    if self.empty_embedding.is_none() {
                        tracing::debug!("fetching empty-string embedding");
                        self.empty_embedding = Some(fetch().await?);
                    }
                    if let Some(empty) = &self.empty_embedding {
                        filled.push(empty.clone());
                    }
                }
            }
        }
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-4)
    }

    #[test]
    fn weighted_average_is_normalized() {
        let result = aggregate(1, &[3, 1], &[vec![1.0, 0.0], vec![0.0, 1.0]], &[0, 0], false)
            .unwrap();
        let embedding = result[0].as_ref().unwrap();
        assert!(approx_eq(embedding, &[0.9487, 0.3162]));
    }

    #[test]
    fn single_chunk_is_verbatim() {
        let raw = vec![3.0, 4.0];
        let result = aggregate(1, &[5], &[raw.clone()], &[0], false).unwrap();
        assert_eq!(result[0].as_ref().unwrap(), &raw);
    }

    #[test]
    fn no_chunks_yields_sentinel() {
        let result = aggregate(3, &[2], &[vec![1.0]], &[1], false).unwrap();
        assert_eq!(result.len(), 3);
        assert!(result[0].is_none());
        assert!(result[1].is_some());
        assert!(result[2].is_none());
    }

    #[test]
    fn zero_norm_is_degenerate() {
        let err = aggregate(
            1,
            &[1, 1],
            &[vec![1.0, 0.0], vec![-1.0, 0.0]],
            &[0, 0],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, LlmError::DegenerateAggregation { index: 0, .. }));
    }

    #[test]
    fn zero_weight_is_degenerate() {
        let err = aggregate(2, &[1, 0, 0], &[vec![1.0], vec![1.0], vec![2.0]], &[0, 1, 1], false)
            .unwrap_err();
        assert!(matches!(err, LlmError::DegenerateAggregation { index: 1, .. }));
    }

    #[test]
    fn skip_empty_drops_zero_weight_chunks() {
        let result = aggregate(
            1,
            &[2, 0],
            &[vec![0.5, 0.5], vec![9.0, 9.0]],
            &[0, 0],
            true,
        )
        .unwrap();
        // One chunk left, so it passes through untouched.
        assert_eq!(result[0].as_ref().unwrap(), &vec![0.5, 0.5]);
    }

    #[test]
    fn mismatched_lengths_rejected() {
        assert!(aggregate(1, &[1], &[], &[0], false).is_err());
    }

    #[tokio::test]
    async fn empty_embedding_fetched_once() {
        let mut ctx = AggregationContext::new();
        let mut calls = 0;
        let filled = ctx
            .fill_empty(vec![None, Some(vec![1.0]), None], || {
                calls += 1;
                async { Ok(vec![0.0]) }
            })
            .await
            .unwrap();
        assert_eq!(filled, vec![vec![0.0], vec![1.0], vec![0.0]]);
        assert_eq!(calls, 1);
        assert_eq!(ctx.cached_empty_embedding(), Some(&[0.0][..]));
    }

    #[tokio::test]
    async fn empty_embedding_not_fetched_without_sentinels() {
        let mut ctx = AggregationContext::new();
        let filled = ctx
            .fill_empty(vec![Some(vec![1.0])], || async {
                Err(LlmError::InternalError("unexpected".into()))
            })
            .await
            .unwrap();
        assert_eq!(filled, vec![vec![1.0]]);
    }
}
