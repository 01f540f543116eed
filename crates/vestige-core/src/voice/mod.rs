//! Voice profile capability.
//!
//! An in-memory, per-user writing-style fingerprint built incrementally as
//! document-like content is ingested. Not persisted — it's a session-scoped
//! capability the compounding engine and context builder consult, the same
//! way the reference system's demo voice analyzer behaves.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MAX_KEYWORDS: usize = 10;
const MIN_KEYWORD_LEN: usize = 5;
const MAX_CONFIDENCE: f32 = 0.95;
const CONFIDENCE_STEP: f32 = 0.1;

/// Vocabulary buckets derived from the union of a user's tone keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyPatterns {
    pub common_words: Vec<String>,
    pub preferred_phrases: Vec<String>,
    pub words_to_avoid: Vec<String>,
}

/// A user's accumulated writing-style fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceProfile {
    pub user_id: String,
    pub tone_keywords: Vec<String>,
    pub vocabulary_patterns: VocabularyPatterns,
    pub sample_size: i64,
    pub confidence: f32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl VoiceProfile {
    fn built(user_id: &str, content: &str, sample_size: i64, confidence: f32) -> Self {
        let keywords = extract_keywords(content);
        Self {
            user_id: user_id.to_string(),
            vocabulary_patterns: vocabulary_from(&keywords),
            tone_keywords: keywords,
            sample_size,
            confidence,
            version: sample_size,
            created_at: Utc::now(),
        }
    }

    fn merged(existing: &VoiceProfile, content: &str, sample_size: i64, confidence: f32) -> Self {
        let mut merged_keywords = existing.tone_keywords.clone();
        for kw in extract_keywords(content) {
            if !merged_keywords.contains(&kw) {
                merged_keywords.push(kw);
            }
        }
        merged_keywords.truncate(MAX_KEYWORDS);
        Self {
            user_id: existing.user_id.clone(),
            vocabulary_patterns: vocabulary_from(&merged_keywords),
            tone_keywords: merged_keywords,
            sample_size,
            confidence,
            version: sample_size,
            created_at: existing.created_at,
        }
    }
}

fn vocabulary_from(keywords: &[String]) -> VocabularyPatterns {
    VocabularyPatterns {
        common_words: keywords.iter().take(5).cloned().collect(),
        preferred_phrases: keywords.iter().skip(5).take(3).cloned().collect(),
        words_to_avoid: Vec::new(),
    }
}

/// Words longer than [`MIN_KEYWORD_LEN`]-1 characters, ranked by frequency then by
/// first appearance, capped at [`MAX_KEYWORDS`].
fn extract_keywords(content: &str) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for raw in content.split_whitespace() {
        let word = raw
            .trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
            .to_lowercase();
        if word.chars().count() < MIN_KEYWORD_LEN {
            continue;
        }
        if !counts.contains_key(&word) {
            order.push(word.clone());
        }
        *counts.entry(word).or_insert(0) += 1;
    }
    let mut ranked = order;
    ranked.sort_by(|a, b| counts[b].cmp(&counts[a]));
    ranked.truncate(MAX_KEYWORDS);
    ranked
}

/// Owns every user's [`VoiceProfile`], mutated as content is ingested.
#[derive(Default)]
pub struct VoiceProfileStore {
    profiles: Mutex<BTreeMap<String, VoiceProfile>>,
}

impl VoiceProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// First sample for a user builds a fresh profile at confidence 0.8; later
    /// samples delegate to [`Self::update_profile`].
    pub fn analyze_content(&self, user_id: &str, content: &str) -> VoiceProfile {
        let mut guard = self.profiles.lock().unwrap_or_else(|p| p.into_inner());
        if guard.contains_key(user_id) {
            drop(guard);
            return self.update_profile(user_id, content);
        }
        let profile = VoiceProfile::built(user_id, content, 1, 0.8);
        guard.insert(user_id.to_string(), profile.clone());
        profile
    }

    /// Confidence climbs by 0.1 per sample, capped at 0.95.
    pub fn update_profile(&self, user_id: &str, content: &str) -> VoiceProfile {
        let mut guard = self.profiles.lock().unwrap_or_else(|p| p.into_inner());
        let Some(existing) = guard.get(user_id).cloned() else {
            drop(guard);
            return self.analyze_content(user_id, content);
        };
        let sample_size = existing.sample_size + 1;
        let confidence = (existing.confidence + CONFIDENCE_STEP).min(MAX_CONFIDENCE);
        let merged = VoiceProfile::merged(&existing, content, sample_size, confidence);
        guard.insert(user_id.to_string(), merged.clone());
        merged
    }

    pub fn get_profile(&self, user_id: &str) -> Option<VoiceProfile> {
        let guard = self.profiles.lock().unwrap_or_else(|p| p.into_inner());
        guard.get(user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_confidence_at_point_eight() {
        let store = VoiceProfileStore::new();
        let profile = store.analyze_content("u1", "Mountains mountains everywhere beautiful scenery");
        assert_eq!(profile.sample_size, 1);
        assert!((profile.confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn confidence_climbs_and_caps_at_ninety_five() {
        let store = VoiceProfileStore::new();
        store.analyze_content("u1", "writing writing writing sample content");
        for _ in 0..10 {
            store.update_profile("u1", "additional writing sample content here");
        }
        let profile = store.get_profile("u1").unwrap();
        assert!(profile.confidence <= MAX_CONFIDENCE);
    }

    #[test]
    fn keywords_merge_without_duplicates() {
        let store = VoiceProfileStore::new();
        store.analyze_content("u1", "wonderful wonderful scenery");
        let updated = store.update_profile("u1", "wonderful amazing scenery");
        let unique: std::collections::HashSet<_> = updated.tone_keywords.iter().collect();
        assert_eq!(unique.len(), updated.tone_keywords.len());
    }

    #[test]
    fn short_words_are_excluded_from_keywords() {
        let profile = VoiceProfile::built("u1", "a an to of it is be", 1, 0.8);
        assert!(profile.tone_keywords.is_empty());
    }
}
