//! Ingestion pipeline.
//!
//! Turns an [`IngestRequest`] into a stored, embedded, linked [`MemoryEntry`],
//! running the compounding engine afterward so new content is connected and
//! voice-learned immediately. Grounded on the reference system's ingestion route,
//! which does the same four steps synchronously per entry.

use uuid::Uuid;

use crate::compounding::CompoundingEngine;
use crate::embeddings::EmbeddingProvider;
use crate::error::{EngineError, Result};
use crate::memory::{
    estimate_token_count, BulkIngestRequest, BulkIngestResponse, FailedEntry, IngestRequest,
    IngestResponse, MemoryEntry,
};
use crate::search::VectorIndex;
use crate::storage::RecordStore;

/// Bulk ingestion is capped at this many entries per call.
pub const MAX_BULK_ENTRIES: usize = 50;
const MAX_TITLE_LEN: usize = 200;
const MAX_CONTENT_LEN: usize = 100_000;

pub struct IngestionPipeline<'a> {
    store: &'a RecordStore,
    vector_index: &'a VectorIndex,
    embeddings: &'a dyn EmbeddingProvider,
    compounding: &'a CompoundingEngine<'a>,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        store: &'a RecordStore,
        vector_index: &'a VectorIndex,
        embeddings: &'a dyn EmbeddingProvider,
        compounding: &'a CompoundingEngine<'a>,
    ) -> Self {
        Self {
            store,
            vector_index,
            embeddings,
            compounding,
        }
    }

    /// Validate, embed, persist, index, and link a single entry.
    pub fn ingest(&self, user_id: &str, request: &IngestRequest) -> Result<IngestResponse> {
        let start = std::time::Instant::now();
        validate(request)?;

        let entry_id = Uuid::new_v4().to_string();
        let embedding_id = entry_id.clone();
        let vector = self.embeddings.embed(&request.content)?;

        let entry = MemoryEntry {
            id: entry_id.clone(),
            user_id: user_id.to_string(),
            content_type: request.content_type,
            title: request.title.clone(),
            content_preview: MemoryEntry::preview_of(&request.content),
            token_count: estimate_token_count(&request.content),
            content: request.content.clone(),
            embedding_id: embedding_id.clone(),
            indexed_at: chrono::Utc::now(),
            last_accessed_at: None,
            access_count: 0,
            relevance_decay: 1.0,
            source_url: request.source_url.clone(),
            source_metadata: request.metadata.clone(),
            related_entries: Vec::new(),
            tags: request.tags.clone(),
        };

        self.store.upsert(&entry)?;
        self.vector_index
            .upsert(user_id, &entry_id, vector, request.content_type);

        self.compounding.on_content_added(
            user_id,
            &entry_id,
            &request.content,
            request.content_type,
        )?;

        let related_entries = self
            .store
            .get(user_id, &entry_id)?
            .map(|e| e.related_entries)
            .unwrap_or_default();

        Ok(IngestResponse {
            entry_id,
            indexed: true,
            embedding_id,
            token_count: entry.token_count,
            related_entries,
            processing_time_ms: start.elapsed().as_millis() as i64,
        })
    }

    /// Ingest up to [`MAX_BULK_ENTRIES`] entries, capturing per-entry failures
    /// instead of aborting the whole batch.
    pub fn ingest_bulk(&self, user_id: &str, request: &BulkIngestRequest) -> Result<BulkIngestResponse> {
        if request.entries.len() > MAX_BULK_ENTRIES {
            return Err(EngineError::Validation(format!(
                "bulk ingest accepts at most {MAX_BULK_ENTRIES} entries, got {}",
                request.entries.len()
            )));
        }
        let start = std::time::Instant::now();
        let mut successful = Vec::new();
        let mut failed = Vec::new();
        for (index, entry_request) in request.entries.iter().enumerate() {
            match self.ingest(user_id, entry_request) {
                Ok(response) => successful.push(response),
                Err(err) => failed.push(FailedEntry {
                    index,
                    error: err.to_string(),
                }),
            }
        }
        Ok(BulkIngestResponse {
            successful,
            failed,
            total_processing_time_ms: start.elapsed().as_millis() as i64,
        })
    }
}

fn validate(request: &IngestRequest) -> Result<()> {
    if request.title.trim().is_empty() {
        return Err(EngineError::Validation("title must not be empty".into()));
    }
    if request.title.chars().count() > MAX_TITLE_LEN {
        return Err(EngineError::Validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    if request.content.trim().is_empty() {
        return Err(EngineError::Validation("content must not be empty".into()));
    }
    if request.content.chars().count() > MAX_CONTENT_LEN {
        return Err(EngineError::Validation(format!(
            "content must be at most {MAX_CONTENT_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompoundingDefaults;
    use crate::embeddings::LocalEmbeddingProvider;
    use crate::memory::ContentType;
    use crate::voice::VoiceProfileStore;

    fn fixture() -> (RecordStore, VectorIndex, LocalEmbeddingProvider, VoiceProfileStore) {
        (
            RecordStore::in_memory().unwrap(),
            VectorIndex::new(),
            LocalEmbeddingProvider::new(32),
            VoiceProfileStore::new(),
        )
    }

    fn sample_request() -> IngestRequest {
        IngestRequest {
            content_type: ContentType::Document,
            title: "My Note".to_string(),
            content: "Some meaningful content about Rust programming.".to_string(),
            source_url: None,
            metadata: None,
            tags: vec!["rust".to_string()],
        }
    }

    #[test]
    fn ingest_persists_and_indexes_the_entry() {
        let (store, vectors, embeddings, voice) = fixture();
        let compounding =
            CompoundingEngine::new(&store, &vectors, &voice, CompoundingDefaults::default());
        let pipeline = IngestionPipeline::new(&store, &vectors, &embeddings, &compounding);

        let response = pipeline.ingest("u1", &sample_request()).unwrap();
        assert!(response.indexed);
        assert!(vectors.get("u1", &response.entry_id).is_some());
        assert!(store.get("u1", &response.entry_id).unwrap().is_some());
    }

    #[test]
    fn ingest_rejects_empty_title() {
        let (store, vectors, embeddings, voice) = fixture();
        let compounding =
            CompoundingEngine::new(&store, &vectors, &voice, CompoundingDefaults::default());
        let pipeline = IngestionPipeline::new(&store, &vectors, &embeddings, &compounding);

        let mut request = sample_request();
        request.title = "   ".to_string();
        let result = pipeline.ingest("u1", &request);
        assert!(result.is_err());
    }

    #[test]
    fn ingest_rejects_title_over_two_hundred_chars() {
        let (store, vectors, embeddings, voice) = fixture();
        let compounding =
            CompoundingEngine::new(&store, &vectors, &voice, CompoundingDefaults::default());
        let pipeline = IngestionPipeline::new(&store, &vectors, &embeddings, &compounding);

        let mut request = sample_request();
        request.title = "a".repeat(250);
        let result = pipeline.ingest("u1", &request);
        assert!(result.is_err());
    }

    #[test]
    fn bulk_ingest_captures_individual_failures() {
        let (store, vectors, embeddings, voice) = fixture();
        let compounding =
            CompoundingEngine::new(&store, &vectors, &voice, CompoundingDefaults::default());
        let pipeline = IngestionPipeline::new(&store, &vectors, &embeddings, &compounding);

        let mut bad_request = sample_request();
        bad_request.content = String::new();
        let bulk = BulkIngestRequest {
            entries: vec![sample_request(), bad_request],
        };
        let response = pipeline.ingest_bulk("u1", &bulk).unwrap();
        assert_eq!(response.successful.len(), 1);
        assert_eq!(response.failed.len(), 1);
        assert_eq!(response.failed[0].index, 1);
    }

    #[test]
    fn bulk_ingest_rejects_over_fifty_entries() {
        let (store, vectors, embeddings, voice) = fixture();
        let compounding =
            CompoundingEngine::new(&store, &vectors, &voice, CompoundingDefaults::default());
        let pipeline = IngestionPipeline::new(&store, &vectors, &embeddings, &compounding);

        let bulk = BulkIngestRequest {
            entries: (0..51).map(|_| sample_request()).collect(),
        };
        assert!(pipeline.ingest_bulk("u1", &bulk).is_err());
    }
}
