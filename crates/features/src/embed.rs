//! Embedding service used by the semantic evaluators.
//!
//! The engine only needs `embed(text) -> vector`; the model behind it is a
//! collaborator. Implementations must be deterministic for identical text
//! and safe to query concurrently.

use crate::similarity::cosine_similarity;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Embedding vector type.
pub type Embedding = Vec<f32>;

/// Errors from embedding collaborators.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding service unavailable: {0}")]
    Unavailable(String),

    #[error("No vector for text: {0:?}")]
    MissingVector(String),

    #[error("Invalid embedding table: {0}")]
    InvalidTable(#[from] serde_json::Error),
}

/// Trait for text embedding services.
pub trait Embedder: Send + Sync {
    /// Generate embedding for text
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Model identifier for logging
    fn model_name(&self) -> &str;

    /// Cosine similarity between the embeddings of two texts.
    fn similarity(&self, text1: &str, text2: &str) -> Result<f32, EmbeddingError> {
        let a = self.embed(text1)?;
        let b = self.embed(text2)?;
        Ok(cosine_similarity(&a, &b))
    }
}

/// Shared embedder, loaded once and queried from every comparison.
pub type SharedEmbedder = Arc<dyn Embedder>;

/// Deterministic offline embedder.
///
/// Hashes whole words and padded character trigrams into a fixed number of
/// signed buckets and L2-normalizes the result. Texts sharing words or
/// spelling fragments land close together; it has no notion of synonyms.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimension: 256 }
    }
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let index = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for word in lowered.split_whitespace() {
            self.add_feature(&mut vector, &format!("w:{word}"), 2.0);

            let padded: Vec<char> = format!("#{word}#").chars().collect();
            for trigram in padded.windows(3) {
                let trigram: String = trigram.iter().collect();
                self.add_feature(&mut vector, &trigram, 1.0);
            }
        }

        Ok(l2_normalize(vector))
    }

    fn model_name(&self) -> &str {
        "hashing-trigram"
    }
}

/// Vectors produced ahead of time by an external sentence-embedding model.
///
/// Texts missing from the table go to the fallback embedder when one is set.
pub struct PrecomputedEmbedder {
    vectors: HashMap<String, Embedding>,
    fallback: Option<SharedEmbedder>,
}

impl PrecomputedEmbedder {
    pub fn new(vectors: HashMap<String, Embedding>) -> Self {
        Self {
            vectors,
            fallback: None,
        }
    }

    /// Load a JSON object of `text -> [f32, ...]`.
    pub fn from_json(json: &str) -> Result<Self, EmbeddingError> {
        let vectors: HashMap<String, Embedding> = serde_json::from_str(json)?;
        Ok(Self::new(vectors))
    }

    pub fn with_fallback(mut self, fallback: SharedEmbedder) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl Embedder for PrecomputedEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if let Some(vector) = self.vectors.get(text) {
            return Ok(vector.clone());
        }
        match &self.fallback {
            Some(fallback) => fallback.embed(text),
            None => Err(EmbeddingError::MissingVector(text.to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "precomputed"
    }
}

/// 64-bit FNV-1a; stable across processes and platforms.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn l2_normalize(v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.into_iter().map(|x| x / norm).collect()
    } else {
        v
    }
}
