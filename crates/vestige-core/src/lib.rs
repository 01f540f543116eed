//! # Vestige Core
//!
//! A compounding personal memory engine: ingest content, embed and index it,
//! link it to related memory, let a voice profile emerge from what's written,
//! and retrieve token-budgeted context for a query.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use vestige_core::{Engine, VestigeConfig};
//! use vestige_core::memory::{ContentType, IngestRequest};
//!
//! let engine = Engine::new(VestigeConfig::default())?;
//! let response = engine.ingest("user-1".into(), IngestRequest {
//!     content_type: ContentType::Document,
//!     title: "First note".into(),
//!     content: "The mitochondria is the powerhouse of the cell".into(),
//!     source_url: None,
//!     metadata: None,
//!     tags: vec![],
//! }).await?;
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod compounding;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod ingestion;
pub mod memory;
pub mod search;
pub mod stats;
pub mod storage;
pub mod voice;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use compounding::CompoundingEngine;
pub use config::VestigeConfig;
use context::ContextBuilder;
use embeddings::{EmbeddingProvider, LocalEmbeddingProvider};
use error::{EngineError, Result};
use ingestion::IngestionPipeline;
use memory::{
    BulkIngestRequest, BulkIngestResponse, CompoundingEvent, ContentType, ContextRequest,
    IngestRequest, IngestResponse, MemoryEntry, MemoryHealthReport, MemoryStats, RetrievedContext,
    VoiceContext,
};
use search::VectorIndex;
use stats::StatsService;
use storage::RecordStore;
use voice::VoiceProfileStore;

/// The top-level handle applications hold. Aggregates durable storage, the
/// in-memory vector index, the embedding provider, and the voice-profile
/// capability, then exposes every operation as an async method that runs the
/// underlying (synchronous, `Mutex`-serialized) work on the blocking threadpool
/// so it never stalls the async runtime.
#[derive(Clone)]
pub struct Engine {
    store: Arc<RecordStore>,
    vector_index: Arc<VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
    voice: Arc<VoiceProfileStore>,
    config: VestigeConfig,
}

impl Engine {
    /// Build an engine, opening (or creating) the configured SQLite store and
    /// rebuilding the in-memory vector index from its contents.
    pub fn new(config: VestigeConfig) -> Result<Self> {
        let store = RecordStore::new(config.storage_path.clone())?;
        let vector_index = VectorIndex::new();
        let embeddings = LocalEmbeddingProvider::new(config.embedding_dimension);
        rebuild_vector_index(&store, &vector_index, &embeddings)?;
        Ok(Self {
            store: Arc::new(store),
            vector_index: Arc::new(vector_index),
            embeddings: Arc::new(embeddings),
            voice: Arc::new(VoiceProfileStore::new()),
            config,
        })
    }

    /// Build an engine over an in-memory database, for tests and short-lived tooling.
    pub fn in_memory(config: VestigeConfig) -> Result<Self> {
        let store = RecordStore::in_memory()?;
        let embeddings = LocalEmbeddingProvider::new(config.embedding_dimension);
        Ok(Self {
            store: Arc::new(store),
            vector_index: Arc::new(VectorIndex::new()),
            embeddings: Arc::new(embeddings),
            voice: Arc::new(VoiceProfileStore::new()),
            config,
        })
    }

    pub fn config(&self) -> &VestigeConfig {
        &self.config
    }

    pub async fn ingest(&self, user_id: String, request: IngestRequest) -> Result<IngestResponse> {
        let engine = self.clone();
        run_blocking(move || {
            let compounding = CompoundingEngine::new(
                &engine.store,
                &engine.vector_index,
                &engine.voice,
                engine.config.compounding,
            );
            let pipeline = IngestionPipeline::new(
                &engine.store,
                &engine.vector_index,
                engine.embeddings.as_ref(),
                &compounding,
            );
            pipeline.ingest(&user_id, &request)
        })
        .await
    }

    pub async fn ingest_bulk(
        &self,
        user_id: String,
        request: BulkIngestRequest,
    ) -> Result<BulkIngestResponse> {
        let engine = self.clone();
        run_blocking(move || {
            let compounding = CompoundingEngine::new(
                &engine.store,
                &engine.vector_index,
                &engine.voice,
                engine.config.compounding,
            );
            let pipeline = IngestionPipeline::new(
                &engine.store,
                &engine.vector_index,
                engine.embeddings.as_ref(),
                &compounding,
            );
            pipeline.ingest_bulk(&user_id, &request)
        })
        .await
    }

    /// Fetch a single entry, recording an access event on a hit (bumps
    /// `access_count`, resets `last_accessed_at` and decay).
    pub async fn get_entry(&self, user_id: String, entry_id: String) -> Result<Option<MemoryEntry>> {
        let engine = self.clone();
        run_blocking(move || {
            let Some(entry) = engine.store.get(&user_id, &entry_id)? else {
                return Ok(None);
            };
            let compounding = CompoundingEngine::new(
                &engine.store,
                &engine.vector_index,
                &engine.voice,
                engine.config.compounding,
            );
            compounding.on_content_accessed(&user_id, &entry_id, None)?;
            Ok(Some(entry))
        })
        .await
    }

    pub async fn list_entries(
        &self,
        user_id: String,
        content_type: Option<ContentType>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MemoryEntry>> {
        let engine = self.clone();
        run_blocking(move || {
            engine
                .store
                .list(&user_id, content_type, limit, offset, "indexed_at")
        })
        .await
    }

    /// Whether `entry_id` still has a vector indexed for `user_id` (index parity checks).
    pub async fn has_vector(&self, user_id: String, entry_id: String) -> bool {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.vector_index.get(&user_id, &entry_id).is_some())
            .await
            .unwrap_or(false)
    }

    pub async fn delete_entry(&self, user_id: String, entry_id: String) -> Result<bool> {
        let engine = self.clone();
        run_blocking(move || {
            let removed = engine.store.delete(&user_id, &entry_id)?;
            engine.vector_index.remove(&user_id, &entry_id);
            Ok(removed)
        })
        .await
    }

    pub async fn retrieve_context(
        &self,
        user_id: String,
        request: ContextRequest,
    ) -> Result<RetrievedContext> {
        let engine = self.clone();
        run_blocking(move || {
            let builder = ContextBuilder::new(
                &engine.store,
                &engine.vector_index,
                engine.embeddings.as_ref(),
                &engine.voice,
            );
            builder.retrieve_context(&user_id, &request)
        })
        .await
    }

    /// The raw voice-profile fingerprint for a user, if any content has fed it yet.
    pub async fn voice_profile(&self, user_id: String) -> Result<Option<voice::VoiceProfile>> {
        let engine = self.clone();
        run_blocking(move || Ok(engine.voice.get_profile(&user_id))).await
    }

    pub async fn voice_context(&self, user_id: String) -> Result<Option<VoiceContext>> {
        let engine = self.clone();
        run_blocking(move || {
            let builder = ContextBuilder::new(
                &engine.store,
                &engine.vector_index,
                engine.embeddings.as_ref(),
                &engine.voice,
            );
            Ok(builder.build_voice_context(&user_id))
        })
        .await
    }

    /// Sources related to `entry_id` above a fixed 0.5 similarity threshold,
    /// excluding the entry itself. `limit` is clamped to `[1, 20]`.
    pub async fn suggest_related(
        &self,
        user_id: String,
        entry_id: String,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        const SUGGEST_THRESHOLD: f32 = 0.5;
        const SUGGEST_LIMIT_MIN: usize = 1;
        const SUGGEST_LIMIT_MAX: usize = 20;
        let limit = limit.clamp(SUGGEST_LIMIT_MIN, SUGGEST_LIMIT_MAX);
        let engine = self.clone();
        run_blocking(move || {
            let Some(query_vec) = engine.vector_index.get(&user_id, &entry_id) else {
                return Ok(Vec::new());
            };
            let matches = engine.vector_index.search(
                &user_id,
                &query_vec,
                limit,
                SUGGEST_THRESHOLD,
                None,
            );
            let mut entries = Vec::new();
            for m in matches {
                if m.key == entry_id {
                    continue;
                }
                if let Some(entry) = engine.store.get(&user_id, &m.key)? {
                    entries.push(entry);
                }
            }
            Ok(entries)
        })
        .await
    }

    pub async fn stats(&self, user_id: String) -> Result<MemoryStats> {
        let engine = self.clone();
        run_blocking(move || {
            let confidence = engine
                .voice
                .get_profile(&user_id)
                .map(|p| p.confidence)
                .unwrap_or(0.0);
            let last_run = last_compounding_timestamp(&engine.store, &user_id)?;
            StatsService::new(&engine.store).get_stats(&user_id, confidence, last_run)
        })
        .await
    }

    pub async fn health_report(&self, user_id: String) -> Result<MemoryHealthReport> {
        let engine = self.clone();
        run_blocking(move || {
            let confidence = engine
                .voice
                .get_profile(&user_id)
                .map(|p| p.confidence)
                .unwrap_or(0.0);
            let last_run = last_compounding_timestamp(&engine.store, &user_id)?;
            StatsService::new(&engine.store).get_health_report(&user_id, confidence, last_run)
        })
        .await
    }

    /// Run the maintenance cycle: decay always runs; stale removal and duplicate
    /// merge are gated behind their respective flags, matching the original
    /// maintenance job's `remove_stale`/`merge_duplicates` query parameters.
    pub async fn compact(
        &self,
        user_id: String,
        remove_stale: bool,
        merge_duplicates: bool,
    ) -> Result<CompactionSummary> {
        let engine = self.clone();
        run_blocking(move || {
            let compounding = CompoundingEngine::new(
                &engine.store,
                &engine.vector_index,
                &engine.voice,
                engine.config.compounding,
            );
            let decayed = compounding.decay_stale_entries(&user_id)?;
            let removed = if remove_stale {
                compounding.remove_stale_entries(&user_id)?
            } else {
                Vec::new()
            };
            let merged = if merge_duplicates {
                compounding
                    .merge_near_duplicates(&user_id, engine.config.compounding.merge_threshold)?
            } else {
                Vec::new()
            };
            let new_links = compounding
                .find_new_connections(&user_id, engine.config.compounding.link_threshold)?;
            Ok(CompactionSummary {
                decayed_entries: decayed,
                removed_entries: removed,
                new_links,
                merged_pairs: merged,
            })
        })
        .await
    }

    pub async fn compounding_history(
        &self,
        user_id: String,
        limit: i64,
    ) -> Result<Vec<CompoundingEvent>> {
        let engine = self.clone();
        run_blocking(move || engine.store.get_compounding_events(&user_id, limit)).await
    }
}

/// Result of a full maintenance cycle.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionSummary {
    pub decayed_entries: i64,
    pub removed_entries: Vec<String>,
    pub new_links: usize,
    pub merged_pairs: Vec<(String, String)>,
}

fn last_compounding_timestamp(store: &RecordStore, user_id: &str) -> Result<Option<DateTime<Utc>>> {
    Ok(store
        .get_compounding_events(user_id, 1)?
        .into_iter()
        .next()
        .map(|event| event.timestamp))
}

fn rebuild_vector_index(
    store: &RecordStore,
    vector_index: &VectorIndex,
    embeddings: &dyn EmbeddingProvider,
) -> Result<()> {
    for entry in store.list_all_entries()? {
        let vector = embeddings.embed(&entry.content)?;
        vector_index.upsert(&entry.user_id, &entry.id, vector, entry.content_type);
    }
    Ok(())
}

/// Runs a synchronous closure on the blocking threadpool.
async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EngineError::Capability(format!("blocking task panicked: {e}")))?
}
