//! Compounding engine.
//!
//! Everything that makes stored memory get more useful over time: linking new
//! entries to related ones, decaying what's gone stale, and merging near-duplicates.
//! Grounded on the reference system's `MemoryCompoundingService` — the Rust port
//! keeps the same five operations and the same event log.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::config::CompoundingDefaults;
use crate::error::Result;
use crate::memory::{CompoundingEvent, CompoundingResult, ContentType, MemoryEntry};
use crate::search::VectorIndex;
use crate::storage::RecordStore;
use crate::voice::VoiceProfileStore;

/// Per-entry link threshold used during ingestion.
const LINK_THRESHOLD: f32 = 0.8;
/// Neighbor fan-out searched when looking for related/duplicate entries.
const NEIGHBOR_LIMIT: usize = 10;
/// Entries untouched for this long are eligible for removal by `remove_stale_entries`.
const STALE_AFTER_DAYS: i64 = 90;

pub struct CompoundingEngine<'a> {
    store: &'a RecordStore,
    vector_index: &'a VectorIndex,
    voice: &'a VoiceProfileStore,
    defaults: CompoundingDefaults,
}

impl<'a> CompoundingEngine<'a> {
    pub fn new(
        store: &'a RecordStore,
        vector_index: &'a VectorIndex,
        voice: &'a VoiceProfileStore,
        defaults: CompoundingDefaults,
    ) -> Self {
        Self {
            store,
            vector_index,
            voice,
            defaults,
        }
    }

    /// Run after a new entry is indexed: link it to its neighbors and, for
    /// document-like content, fold it into the user's voice profile.
    pub fn on_content_added(
        &self,
        user_id: &str,
        entry_id: &str,
        content: &str,
        content_type: ContentType,
    ) -> Result<CompoundingResult> {
        let start = std::time::Instant::now();
        let new_connections = self.update_related_entries(user_id, entry_id)?;

        let mut voice_profile_updated = false;
        let mut confidence_delta = 0.0_f32;
        if content_type.feeds_voice_profile() {
            let before = self.voice.get_profile(user_id).map(|p| p.confidence);
            let after = self.voice.update_profile(user_id, content);
            voice_profile_updated = true;
            confidence_delta = match before {
                Some(prior) => after.confidence - prior,
                None => after.confidence,
            };
        }

        let mut details = BTreeMap::new();
        details.insert("entry_id".to_string(), serde_json::json!(entry_id));
        details.insert(
            "new_connections".to_string(),
            serde_json::json!(new_connections),
        );
        self.store
            .add_compounding_event(user_id, "content_added", &details)?;

        Ok(CompoundingResult {
            voice_profile_updated,
            new_connections_found: new_connections,
            stale_entries_decayed: 0,
            confidence_delta,
            processing_time_ms: start.elapsed().as_millis() as i64,
        })
    }

    /// Bump access bookkeeping and log the touch.
    pub fn on_content_accessed(
        &self,
        user_id: &str,
        entry_id: &str,
        access_context: Option<&str>,
    ) -> Result<()> {
        self.store
            .update_access(user_id, entry_id, Utc::now(), 1, true)?;
        let mut details = BTreeMap::new();
        details.insert("entry_id".to_string(), serde_json::json!(entry_id));
        details.insert("context".to_string(), serde_json::json!(access_context));
        self.store
            .add_compounding_event(user_id, "content_accessed", &details)?;
        Ok(())
    }

    /// Multiply decay by `decay_rate` (floored at [`crate::memory::DECAY_FLOOR`]) for
    /// every entry untouched since `decay_after_days` ago.
    pub fn decay_stale_entries(&self, user_id: &str) -> Result<i64> {
        let records = self.store.list_all(user_id)?;
        let threshold =
            Utc::now() - chrono::Duration::days(self.defaults.decay_after_days);
        let mut decayed = 0_i64;
        for record in &records {
            if record.last_touched() < threshold {
                let new_decay =
                    MemoryEntry::clamp_decay(record.relevance_decay * self.defaults.decay_rate);
                self.store.update_decay(user_id, &record.id, new_decay)?;
                decayed += 1;
            }
        }
        if decayed > 0 {
            let mut details = BTreeMap::new();
            details.insert("decayed".to_string(), serde_json::json!(decayed));
            details.insert(
                "decay_rate".to_string(),
                serde_json::json!(self.defaults.decay_rate),
            );
            self.store.add_compounding_event(user_id, "decay", &details)?;
        }
        Ok(decayed)
    }

    /// Delete every entry untouched for [`STALE_AFTER_DAYS`] from both the record
    /// store and the vector index, returning the removed ids.
    pub fn remove_stale_entries(&self, user_id: &str) -> Result<Vec<String>> {
        let records = self.store.list_all(user_id)?;
        let threshold = Utc::now() - chrono::Duration::days(STALE_AFTER_DAYS);
        let mut removed = Vec::new();
        for record in &records {
            if record.last_touched() < threshold {
                self.store.delete(user_id, &record.id)?;
                self.vector_index.remove(user_id, &record.id);
                removed.push(record.id.clone());
            }
        }
        if !removed.is_empty() {
            let mut details = BTreeMap::new();
            details.insert("removed".to_string(), serde_json::json!(removed));
            self.store
                .add_compounding_event(user_id, "remove_stale", &details)?;
        }
        Ok(removed)
    }

    /// Re-scan every entry for neighbors above `similarity_threshold`, adding any
    /// newly discovered link without ever dropping an existing one.
    pub fn find_new_connections(&self, user_id: &str, similarity_threshold: f32) -> Result<usize> {
        let records = self.store.list_all(user_id)?;
        let mut new_links = 0_usize;
        for record in &records {
            let before: std::collections::HashSet<&String> = record.related_entries.iter().collect();
            let after = self.find_related(user_id, &record.id, similarity_threshold)?;
            let after_set: std::collections::HashSet<&String> = after.iter().collect();
            let freshly_added = after_set.difference(&before).count();
            if freshly_added > 0 {
                self.store
                    .update_related_entries(user_id, &record.id, &after)?;
                new_links += freshly_added;
            }
        }
        if new_links > 0 {
            let mut details = BTreeMap::new();
            details.insert("new_links".to_string(), serde_json::json!(new_links));
            self.store
                .add_compounding_event(user_id, "recluster", &details)?;
        }
        Ok(new_links)
    }

    /// Find entries whose vectors are within `similarity_threshold` of one another,
    /// keep the newer one as survivor (union of tags, survivor's title/preview), and
    /// delete the older one from both stores.
    pub fn merge_near_duplicates(
        &self,
        user_id: &str,
        similarity_threshold: f32,
    ) -> Result<Vec<(String, String)>> {
        let records = self.store.list_all(user_id)?;
        let by_id: BTreeMap<&str, &MemoryEntry> =
            records.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut merged = Vec::new();
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();

        for record in &records {
            if seen.contains(&record.id) {
                continue;
            }
            let Some(query_vec) = self.vector_index.get(user_id, &record.id) else {
                continue;
            };
            let neighbors = self.vector_index.search(
                user_id,
                &query_vec,
                NEIGHBOR_LIMIT,
                similarity_threshold,
                None,
            );
            for neighbor in neighbors {
                if neighbor.key == record.id || seen.contains(&neighbor.key) {
                    continue;
                }
                let Some(&other) = by_id.get(neighbor.key.as_str()) else {
                    continue;
                };
                let (newer, older) = if other.indexed_at > record.indexed_at {
                    (other, record)
                } else {
                    (record, other)
                };
                let mut merged_tags = newer.tags.clone();
                for tag in &older.tags {
                    if !merged_tags.contains(tag) {
                        merged_tags.push(tag.clone());
                    }
                }
                self.store.update_content_fields(
                    user_id,
                    &newer.id,
                    &newer.title,
                    &newer.content_preview,
                    &merged_tags,
                )?;
                self.store.delete(user_id, &older.id)?;
                self.vector_index.remove(user_id, &older.id);
                merged.push((newer.id.clone(), older.id.clone()));
                seen.insert(older.id.clone());
            }
            seen.insert(record.id.clone());
        }

        if !merged.is_empty() {
            let mut details = BTreeMap::new();
            details.insert("merged".to_string(), serde_json::json!(merged));
            self.store
                .add_compounding_event(user_id, "merge_duplicates", &details)?;
        }
        Ok(merged)
    }

    pub fn get_compounding_history(&self, user_id: &str, limit: i64) -> Result<Vec<CompoundingEvent>> {
        self.store.get_compounding_events(user_id, limit)
    }

    fn update_related_entries(&self, user_id: &str, entry_id: &str) -> Result<usize> {
        let related = self.find_related(user_id, entry_id, LINK_THRESHOLD)?;
        self.store
            .update_related_entries(user_id, entry_id, &related)?;
        for other_id in &related {
            if let Some(other) = self.store.get(user_id, other_id)? {
                if !other.related_entries.iter().any(|id| id == entry_id) {
                    let mut updated = other.related_entries.clone();
                    updated.push(entry_id.to_string());
                    self.store.update_related_entries(user_id, other_id, &updated)?;
                }
            }
        }
        Ok(related.len())
    }

    fn find_related(&self, user_id: &str, entry_id: &str, threshold: f32) -> Result<Vec<String>> {
        let Some(query_vec) = self.vector_index.get(user_id, entry_id) else {
            return Ok(Vec::new());
        };
        let matches = self
            .vector_index
            .search(user_id, &query_vec, NEIGHBOR_LIMIT, threshold, None);
        Ok(matches
            .into_iter()
            .filter(|m| m.key != entry_id)
            .map(|m| m.key)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::estimate_token_count;

    fn engine_fixture() -> (RecordStore, VectorIndex, VoiceProfileStore) {
        (
            RecordStore::in_memory().unwrap(),
            VectorIndex::new(),
            VoiceProfileStore::new(),
        )
    }

    fn entry(user: &str, id: &str, content: &str, ct: ContentType) -> MemoryEntry {
        MemoryEntry {
            id: id.to_string(),
            user_id: user.to_string(),
            content_type: ct,
            title: id.to_string(),
            content_preview: MemoryEntry::preview_of(content),
            token_count: estimate_token_count(content),
            content: content.to_string(),
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
    fn on_content_added_links_similar_neighbors_symmetrically() {
        let (store, vectors, voice) = engine_fixture();
        let e1 = entry("u1", "e1", "rust programming language", ContentType::Document);
        let e2 = entry("u1", "e2", "rust programming language basics", ContentType::Document);
        store.upsert(&e1).unwrap();
        store.upsert(&e2).unwrap();
        vectors.upsert("u1", "e1", vec![1.0, 0.0], ContentType::Document);
        vectors.upsert("u1", "e2", vec![0.99, 0.01], ContentType::Document);

        let engine = CompoundingEngine::new(&store, &vectors, &voice, CompoundingDefaults::default());
        let result = engine
            .on_content_added("u1", "e2", &e2.content, ContentType::Document)
            .unwrap();
        assert_eq!(result.new_connections_found, 1);
        assert!(result.voice_profile_updated);

        let e1_after = store.get("u1", "e1").unwrap().unwrap();
        assert!(e1_after.related_entries.contains(&"e2".to_string()));
    }

    #[test]
    fn decay_stale_entries_applies_floor() {
        let (store, vectors, voice) = engine_fixture();
        let mut stale = entry("u1", "old", "stale content", ContentType::Document);
        stale.last_accessed_at = Some(Utc::now() - chrono::Duration::days(60));
        stale.relevance_decay = 0.11;
        store.upsert(&stale).unwrap();

        let mut defaults = CompoundingDefaults::default();
        defaults.decay_after_days = 30;
        defaults.decay_rate = 0.5;
        let engine = CompoundingEngine::new(&store, &vectors, &voice, defaults);
        let decayed = engine.decay_stale_entries("u1").unwrap();
        assert_eq!(decayed, 1);
        let after = store.get("u1", "old").unwrap().unwrap();
        assert!((after.relevance_decay - 0.1).abs() < 1e-6);
    }

    #[test]
    fn merge_near_duplicates_keeps_newer_and_unions_tags() {
        let (store, vectors, voice) = engine_fixture();
        let mut older = entry("u1", "older", "same idea twice", ContentType::Document);
        older.tags = vec!["a".into()];
        older.indexed_at = Utc::now() - chrono::Duration::days(1);
        let mut newer = entry("u1", "newer", "same idea twice", ContentType::Document);
        newer.tags = vec!["b".into()];
        store.upsert(&older).unwrap();
        store.upsert(&newer).unwrap();
        vectors.upsert("u1", "older", vec![1.0, 0.0], ContentType::Document);
        vectors.upsert("u1", "newer", vec![1.0, 0.0], ContentType::Document);

        let engine = CompoundingEngine::new(&store, &vectors, &voice, CompoundingDefaults::default());
        let merged = engine.merge_near_duplicates("u1", 0.95).unwrap();
        assert_eq!(merged, vec![("newer".to_string(), "older".to_string())]);
        assert!(store.get("u1", "older").unwrap().is_none());
        let survivor = store.get("u1", "newer").unwrap().unwrap();
        assert_eq!(survivor.tags, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn remove_stale_entries_deletes_from_both_stores() {
        let (store, vectors, voice) = engine_fixture();
        let mut stale = entry("u1", "stale", "old content", ContentType::Document);
        stale.indexed_at = Utc::now() - chrono::Duration::days(91);
        let fresh = entry("u1", "fresh", "new content", ContentType::Document);
        store.upsert(&stale).unwrap();
        store.upsert(&fresh).unwrap();
        vectors.upsert("u1", "stale", vec![1.0, 0.0], ContentType::Document);
        vectors.upsert("u1", "fresh", vec![0.0, 1.0], ContentType::Document);

        let engine = CompoundingEngine::new(&store, &vectors, &voice, CompoundingDefaults::default());
        let removed = engine.remove_stale_entries("u1").unwrap();
        assert_eq!(removed, vec!["stale".to_string()]);
        assert!(store.get("u1", "stale").unwrap().is_none());
        assert!(vectors.get("u1", "stale").is_none());
        assert!(store.get("u1", "fresh").unwrap().is_some());
    }
}
