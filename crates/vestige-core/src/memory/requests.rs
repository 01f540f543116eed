//! Request/response shapes for ingestion, context retrieval, and stats.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::ContentType;

/// Inbound ingestion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub content_type: ContentType,
    pub title: String,
    pub content: String,
    pub source_url: Option<String>,
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Result of one ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub entry_id: String,
    pub indexed: bool,
    pub embedding_id: String,
    pub token_count: i64,
    pub related_entries: Vec<String>,
    pub processing_time_ms: i64,
}

/// Bulk ingestion request, capped at 50 entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkIngestRequest {
    pub entries: Vec<IngestRequest>,
}

/// One failed entry in a bulk ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEntry {
    pub index: usize,
    pub error: String,
}

/// Result of a bulk ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkIngestResponse {
    pub successful: Vec<IngestResponse>,
    pub failed: Vec<FailedEntry>,
    pub total_processing_time_ms: i64,
}

/// One compounding-event-log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundingEvent {
    pub user_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub details: BTreeMap<String, serde_json::Value>,
}

/// Result of `on_content_added`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundingResult {
    pub voice_profile_updated: bool,
    pub new_connections_found: usize,
    pub stale_entries_decayed: i64,
    pub confidence_delta: f32,
    pub processing_time_ms: i64,
}

/// Output format for formatted context text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContextFormat {
    #[default]
    Markdown,
    Plain,
    Xml,
}

/// Context retrieval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRequest {
    pub query: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,
    pub content_types: Option<Vec<ContentType>>,
    pub recency_days: Option<i64>,
    #[serde(default)]
    pub format: ContextFormat,
    #[serde(default)]
    pub include_voice_profile: bool,
}

fn default_max_tokens() -> i64 {
    2000
}
fn default_max_sources() -> usize {
    5
}
fn default_min_relevance() -> f32 {
    0.5
}

/// A single retrieved source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSource {
    pub entry_id: String,
    pub title: String,
    pub content_type: ContentType,
    pub relevance_score: f32,
    pub excerpt: String,
    pub source_url: Option<String>,
}

/// Retrieved, formatted, token-budgeted context bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedContext {
    pub query: String,
    pub sources: Vec<ContextSource>,
    pub context_text: String,
    pub token_count: i64,
    pub voice_summary: Option<String>,
    pub retrieval_time_ms: i64,
    pub sources_considered: usize,
    pub sources_included: usize,
}

/// Request for `/api/context/voice` (body is currently unused but kept as a
/// distinct type in case the route grows parameters later).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoiceContextRequest {}

/// Synthesized view over a user's voice profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceContext {
    pub profile_summary: String,
    pub tone_guidance: String,
    pub vocabulary_hints: Vec<String>,
    pub phrases_to_use: Vec<String>,
    pub things_to_avoid: Vec<String>,
    pub example_excerpts: Vec<String>,
    pub confidence: f32,
}

/// Aggregate stats over a user's memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub user_id: String,
    pub total_entries: i64,
    pub entries_by_type: BTreeMap<String, i64>,
    pub total_tokens_indexed: i64,
    pub memory_health_score: f64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub voice_profile_confidence: f32,
    pub last_compounding_run: Option<DateTime<Utc>>,
}

/// Health report over a user's memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryHealthReport {
    pub stats: MemoryStats,
    pub recommendations: Vec<String>,
    pub stale_entries: Vec<String>,
    pub duplicate_candidates: Vec<(String, String, f32)>,
}
