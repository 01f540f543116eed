//! Per-user brute-force vector index.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::embeddings::cosine_similarity;
use crate::memory::ContentType;

/// One scored hit from [`VectorIndex::search`].
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub key: String,
    pub score: f32,
}

struct Entry {
    vector: Vec<f32>,
    content_type: ContentType,
}

/// Holds every user's embeddings in memory, keyed by `(user_id, entry_id)`. Rebuilt
/// from the record store at startup.
#[derive(Default)]
pub struct VectorIndex {
    by_user: RwLock<HashMap<String, HashMap<String, Entry>>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the vector for `key` under `user_id`.
    pub fn upsert(&self, user_id: &str, key: &str, vector: Vec<f32>, content_type: ContentType) {
        let mut guard = self.by_user.write().unwrap_or_else(|p| p.into_inner());
        guard
            .entry(user_id.to_string())
            .or_default()
            .insert(key.to_string(), Entry { vector, content_type });
    }

    pub fn remove(&self, user_id: &str, key: &str) -> bool {
        let mut guard = self.by_user.write().unwrap_or_else(|p| p.into_inner());
        guard
            .get_mut(user_id)
            .map(|m| m.remove(key).is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, user_id: &str, key: &str) -> Option<Vec<f32>> {
        let guard = self.by_user.read().unwrap_or_else(|p| p.into_inner());
        guard.get(user_id)?.get(key).map(|e| e.vector.clone())
    }

    pub fn len_for_user(&self, user_id: &str) -> usize {
        let guard = self.by_user.read().unwrap_or_else(|p| p.into_inner());
        guard.get(user_id).map(|m| m.len()).unwrap_or(0)
    }

    /// Rank every vector belonging to `user_id` against `query` by cosine similarity,
    /// optionally restricted to `content_types`, keeping scores at or above
    /// `min_similarity`, returning at most `limit` matches sorted descending by score.
    pub fn search(
        &self,
        user_id: &str,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
        content_types: Option<&[ContentType]>,
    ) -> Vec<VectorMatch> {
        let guard = self.by_user.read().unwrap_or_else(|p| p.into_inner());
        let Some(entries) = guard.get(user_id) else {
            return Vec::new();
        };

        let mut scored: Vec<VectorMatch> = entries
            .iter()
            .filter(|(_, entry)| {
                content_types
                    .map(|types| types.contains(&entry.content_type))
                    .unwrap_or(true)
            })
            .map(|(key, entry)| VectorMatch {
                key: key.clone(),
                score: cosine_similarity(query, &entry.vector),
            })
            .filter(|m| m.score >= min_similarity)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_respects_threshold_and_limit() {
        let index = VectorIndex::new();
        index.upsert("u1", "a", vec![1.0, 0.0], ContentType::Document);
        index.upsert("u1", "b", vec![0.0, 1.0], ContentType::Document);
        index.upsert("u1", "c", vec![0.9, 0.1], ContentType::Document);

        let results = index.search("u1", &[1.0, 0.0], 10, 0.5, None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].key, "a");
    }

    #[test]
    fn search_is_isolated_per_user() {
        let index = VectorIndex::new();
        index.upsert("u1", "a", vec![1.0, 0.0], ContentType::Document);
        let results = index.search("u2", &[1.0, 0.0], 10, 0.0, None);
        assert!(results.is_empty());
    }

    #[test]
    fn content_type_filter_excludes_non_matching_entries() {
        let index = VectorIndex::new();
        index.upsert("u1", "a", vec![1.0, 0.0], ContentType::Document);
        index.upsert("u1", "b", vec![1.0, 0.0], ContentType::Video);
        let results = index.search("u1", &[1.0, 0.0], 10, 0.0, Some(&[ContentType::Video]));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, "b");
    }

    #[test]
    fn remove_drops_the_entry() {
        let index = VectorIndex::new();
        index.upsert("u1", "a", vec![1.0, 0.0], ContentType::Document);
        assert!(index.remove("u1", "a"));
        assert!(!index.remove("u1", "a"));
        assert!(index.get("u1", "a").is_none());
    }
}
