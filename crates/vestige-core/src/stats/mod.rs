//! Memory statistics and health reporting.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::memory::{MemoryHealthReport, MemoryStats};
use crate::storage::RecordStore;

const STALE_RECOMMENDATION_THRESHOLD: usize = 5;
const STALE_AFTER_DAYS: i64 = 30;
const SPARSE_ENTRY_THRESHOLD: i64 = 5;
const LOW_DIVERSITY_TYPE_COUNT: usize = 2;
const DIVERSITY_TARGET_TYPES: f64 = 5.0;

pub struct StatsService<'a> {
    store: &'a RecordStore,
}

impl<'a> StatsService<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    /// Aggregate counts plus the health score.
    pub fn get_stats(
        &self,
        user_id: &str,
        voice_profile_confidence: f32,
        last_compounding_run: Option<DateTime<Utc>>,
    ) -> Result<MemoryStats> {
        let raw = self.store.stats(user_id)?;
        let score = health_score(raw.entries_by_type.len(), raw.total_entries, raw.newest.is_some());
        Ok(MemoryStats {
            user_id: user_id.to_string(),
            total_entries: raw.total_entries,
            entries_by_type: raw.entries_by_type,
            total_tokens_indexed: raw.total_tokens,
            memory_health_score: score,
            oldest_entry: raw.oldest,
            newest_entry: raw.newest,
            voice_profile_confidence,
            last_compounding_run,
        })
    }

    /// Stats plus recommendations and the stale-entry list. `duplicate_candidates`
    /// is always empty — the reference system never populates it either.
    pub fn get_health_report(
        &self,
        user_id: &str,
        voice_profile_confidence: f32,
        last_compounding_run: Option<DateTime<Utc>>,
    ) -> Result<MemoryHealthReport> {
        let stats = self.get_stats(user_id, voice_profile_confidence, last_compounding_run)?;
        let records = self.store.list_all(user_id)?;
        let threshold = Utc::now() - chrono::Duration::days(STALE_AFTER_DAYS);
        let stale_entries: Vec<String> = records
            .iter()
            .filter(|r| r.last_touched() < threshold)
            .map(|r| r.id.clone())
            .collect();

        let mut recommendations = Vec::new();
        if stale_entries.len() > STALE_RECOMMENDATION_THRESHOLD {
            recommendations
                .push("Consider pruning stale entries to keep memory fresh.".to_string());
        }
        if stats.total_entries < SPARSE_ENTRY_THRESHOLD {
            recommendations.push("Add more content to improve retrieval quality.".to_string());
        }
        if stats.entries_by_type.len() < LOW_DIVERSITY_TYPE_COUNT {
            recommendations.push("Diversity is low; add more content types.".to_string());
        }

        Ok(MemoryHealthReport {
            stats,
            recommendations,
            stale_entries,
            duplicate_candidates: Vec::new(),
        })
    }
}

/// `round((0.6 * min(type_count/5, 1) + 0.4 * (1 if any entry exists else 0.5)) * 100, 2)`
fn health_score(type_count: usize, total_entries: i64, has_newest: bool) -> f64 {
    if total_entries == 0 {
        return 0.0;
    }
    let diversity = (type_count as f64 / DIVERSITY_TARGET_TYPES).min(1.0);
    let recency = if has_newest { 1.0 } else { 0.5 };
    ((0.6 * diversity + 0.4 * recency) * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{estimate_token_count, ContentType, MemoryEntry};

    fn entry(id: &str, ct: ContentType) -> MemoryEntry {
        MemoryEntry {
            id: id.to_string(),
            user_id: "u1".to_string(),
            content_type: ct,
            title: "t".to_string(),
            content_preview: "p".to_string(),
            token_count: estimate_token_count("p"),
            content: "p".to_string(),
            embedding_id: id.to_string(),
            indexed_at: Utc::now(),
            last_accessed_at: None,
            access_count: 0,
            relevance_decay: 1.0,
            source_url: None,
            source_metadata: None,
            related_entries: vec![],
            tags: vec![],
        }
    }

    #[test]
    fn empty_memory_has_zero_health() {
        let store = RecordStore::in_memory().unwrap();
        let service = StatsService::new(&store);
        let stats = service.get_stats("u1", 0.0, None).unwrap();
        assert_eq!(stats.memory_health_score, 0.0);
    }

    #[test]
    fn single_type_caps_diversity_contribution() {
        let store = RecordStore::in_memory().unwrap();
        store.upsert(&entry("e1", ContentType::Document)).unwrap();
        let service = StatsService::new(&store);
        let stats = service.get_stats("u1", 0.0, None).unwrap();
        // diversity = 1/5 = 0.2, recency = 1.0 -> (0.6*0.2 + 0.4*1.0)*100 = 52.0
        assert!((stats.memory_health_score - 52.0).abs() < 1e-6);
    }

    #[test]
    fn sparse_memory_recommends_adding_content() {
        let store = RecordStore::in_memory().unwrap();
        store.upsert(&entry("e1", ContentType::Document)).unwrap();
        let service = StatsService::new(&store);
        let report = service.get_health_report("u1", 0.0, None).unwrap();
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("Add more content")));
    }

    #[test]
    fn stale_entries_are_listed_but_duplicates_stay_empty() {
        let store = RecordStore::in_memory().unwrap();
        let mut stale = entry("old", ContentType::Document);
        stale.indexed_at = Utc::now() - chrono::Duration::days(90);
        stale.last_accessed_at = Some(stale.indexed_at);
        store.upsert(&stale).unwrap();
        let service = StatsService::new(&store);
        let report = service.get_health_report("u1", 0.0, None).unwrap();
        assert_eq!(report.stale_entries, vec!["old".to_string()]);
        assert!(report.duplicate_candidates.is_empty());
    }
}
