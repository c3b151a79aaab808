//! Local token-pooling embedder.
//!
//! No model download, no network: each token is hashed into a slot of a
//! fixed-dimension vector and the result is L2-normalized. Deterministic for
//! identical input, which is all the classifier's similarity refinement
//! requires when a real sentence-embedding endpoint is not configured.

use crate::{EmbedResponse, EmbeddingProvider, ProviderError};

#[derive(Debug, Clone)]
pub struct PoolingProvider {
    dimension: usize,
}

impl PoolingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(8),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let digest = blake3::hash(token.as_bytes());
            let bytes = digest.as_bytes();
            let slot = u64::from_le_bytes(bytes[..8].try_into().unwrap_or_default()) as usize
                % self.dimension;
            // A second hash lane gives each token a sign so common tokens
            // do not all pile up positive.
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
            tokens += 1;
        }
        if tokens == 0 {
            return vector;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for PoolingProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: texts.iter().map(|t| self.embed_one(t)).collect(),
        })
    }
}
