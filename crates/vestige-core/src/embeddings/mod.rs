//! Embedding generation.
//!
//! The engine needs a capability boundary between "text" and "vector", not a
//! particular model. This module provides that boundary as a trait plus a local,
//! dependency-free implementation that is deterministic for identical input within
//! a process lifetime, mirroring the reference system's local development provider.

mod local;

pub use local::{cosine_similarity, LocalEmbeddingProvider};

use crate::error::Result;

/// A fixed-width semantic embedding for one piece of text.
pub trait EmbeddingProvider: Send + Sync {
    /// Vector width this provider produces.
    fn dimensions(&self) -> usize;

    /// Embed a single piece of text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
