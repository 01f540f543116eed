//! Local deterministic embedding provider.
//!
//! Real semantic embedding models are out of scope. Instead, text is hashed into a PRNG seed and that seed drives a
//! fixed-width Gaussian-ish draw, L2-normalized. Identical text always yields the
//! identical vector within one process, and unrelated texts
//! land at a near-zero expected cosine similarity, which is enough for the ingestion
//! pipeline and compounding engine to exercise real similarity-ranking logic in tests
//! without bundling a model runtime.

use std::hash::{Hash, Hasher};

use rand::Rng;
use rand_pcg::Pcg64Mcg;

use crate::error::Result;
use crate::embeddings::EmbeddingProvider;

/// Generates deterministic embeddings from a seeded PRNG, keyed on the input text.
pub struct LocalEmbeddingProvider {
    dimensions: usize,
}

impl LocalEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for LocalEmbeddingProvider {
    fn default() -> Self {
        Self::new(512)
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let seed = seed_from_text(text);
        let mut rng = Pcg64Mcg::new(seed as u128);
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|_| rng.random_range(-1.0_f32..1.0_f32))
            .collect();
        normalize(&mut vector);
        Ok(vector)
    }
}

fn seed_from_text(text: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity between two equal-length vectors; 0.0 on length mismatch or
/// zero-magnitude input.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_is_deterministic() {
        let provider = LocalEmbeddingProvider::new(64);
        let a = provider.embed("hello world").unwrap();
        let b = provider.embed("hello world").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_text_diverges() {
        let provider = LocalEmbeddingProvider::new(64);
        let a = provider.embed("hello world").unwrap();
        let b = provider.embed("goodbye world").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn vectors_are_unit_length() {
        let provider = LocalEmbeddingProvider::new(64);
        let v = provider.embed("normalize me").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let provider = LocalEmbeddingProvider::new(32);
        let v = provider.embed("same text").unwrap();
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_similarity_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }
}
