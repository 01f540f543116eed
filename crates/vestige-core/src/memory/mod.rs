//! Memory data model.
//!
//! `MemoryEntry` is the durable unit. This module also carries the request/response
//! shapes used by the ingestion pipeline, context builder, and stats service so they
//! stay next to the type they describe.

mod entry;
mod requests;

pub use entry::{ContentType, MemoryEntry};
pub use requests::{
    BulkIngestRequest, BulkIngestResponse, CompoundingEvent, CompoundingResult, ContextFormat,
    ContextRequest, ContextSource, FailedEntry, IngestRequest, IngestResponse, MemoryHealthReport,
    MemoryStats, RetrievedContext, VoiceContext, VoiceContextRequest,
};

/// Heuristic token count: ~4 characters per token, floor of 1 for non-empty text.
///
/// Matches the reference system's token estimator exactly; this is explicitly a
/// cheap heuristic, not an authoritative tokenizer.
pub fn estimate_token_count(text: &str) -> i64 {
    if text.is_empty() {
        return 0;
    }
    std::cmp::max(1, (text.chars().count() / 4) as i64)
}

/// Recency score with a 14-day half-life.
pub fn recency_score(
    at: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
) -> f32 {
    let delta_seconds = (now - at).num_seconds().max(0) as f64;
    let half_life_seconds = 14.0 * 86_400.0;
    0.5_f64.powf(delta_seconds / half_life_seconds) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_estimate_floors_at_one_for_nonempty() {
        assert_eq!(estimate_token_count(""), 0);
        assert_eq!(estimate_token_count("hi"), 1);
        assert_eq!(estimate_token_count(&"a".repeat(400)), 100);
    }

    #[test]
    fn recency_half_life_is_fourteen_days() {
        let now = chrono::Utc::now();
        let two_weeks_ago = now - Duration::days(14);
        let score = recency_score(two_weeks_ago, now);
        assert!((score - 0.5).abs() < 0.01);
    }
}
