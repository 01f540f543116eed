//! Context builder.
//!
//! Turns a natural-language query into a token-budgeted bundle of the user's own
//! memory, formatted for injection into a prompt. Grounded on the reference
//! system's `ContextBuilder`, including its empty-results fallback to
//! recency-only ranking.

use chrono::Utc;

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::memory::{
    estimate_token_count, recency_score, ContextFormat, ContextRequest, ContextSource,
    RetrievedContext, VoiceContext,
};
use crate::search::VectorIndex;
use crate::storage::RecordStore;
use crate::voice::VoiceProfileStore;

/// Neighbors fetched before ranking and filtering narrow them down to `max_sources`.
const CANDIDATE_FANOUT_MULTIPLIER: usize = 3;
const MIN_CANDIDATE_FANOUT: usize = 20;

/// Relative weight of semantic similarity vs. recency in the combined score.
const SIMILARITY_WEIGHT: f32 = 0.7;
const RECENCY_WEIGHT: f32 = 0.3;

const VOICE_SUMMARY_KEYWORD_COUNT: usize = 5;

pub struct ContextBuilder<'a> {
    store: &'a RecordStore,
    vector_index: &'a VectorIndex,
    embeddings: &'a dyn EmbeddingProvider,
    voice: &'a VoiceProfileStore,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(
        store: &'a RecordStore,
        vector_index: &'a VectorIndex,
        embeddings: &'a dyn EmbeddingProvider,
        voice: &'a VoiceProfileStore,
    ) -> Self {
        Self {
            store,
            vector_index,
            embeddings,
            voice,
        }
    }

    /// Rank the user's memory against `request.query`, apply the content-type and
    /// recency filters, fit as many sources as fit `max_tokens`, and format the
    /// result.
    pub fn retrieve_context(&self, user_id: &str, request: &ContextRequest) -> Result<RetrievedContext> {
        let start = std::time::Instant::now();
        let query_vec = self.embeddings.embed(&request.query)?;
        let fanout = std::cmp::max(
            MIN_CANDIDATE_FANOUT,
            request.max_sources * CANDIDATE_FANOUT_MULTIPLIER,
        );
        let candidates =
            self.vector_index
                .search(user_id, &query_vec, fanout, request.min_relevance, None);
        let sources_considered = candidates.len();

        let now = Utc::now();
        let mut ranked: Vec<(f32, ContextSource)> = Vec::new();
        for candidate in &candidates {
            let Some(entry) = self.store.get(user_id, &candidate.key)? else {
                continue;
            };
            if let Some(types) = &request.content_types {
                if !types.contains(&entry.content_type) {
                    continue;
                }
            }
            if let Some(days) = request.recency_days {
                if entry.indexed_at < now - chrono::Duration::days(days) {
                    continue;
                }
            }
            let recency = recency_score(entry.indexed_at, now);
            let combined = SIMILARITY_WEIGHT * candidate.score + RECENCY_WEIGHT * recency;
            ranked.push((
                combined,
                ContextSource {
                    entry_id: entry.id.clone(),
                    title: entry.title.clone(),
                    content_type: entry.content_type,
                    relevance_score: combined,
                    excerpt: entry.content_preview.clone(),
                    source_url: entry.source_url.clone(),
                },
            ));
        }

        if ranked.is_empty() {
            return self.recency_fallback(user_id, request, sources_considered, start);
        }

        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let mut sources = Vec::new();
        let mut total_tokens = 0_i64;
        for (_, source) in ranked {
            let cost = estimate_token_count(&source.excerpt);
            if total_tokens + cost > request.max_tokens {
                continue;
            }
            total_tokens += cost;
            sources.push(source);
            if sources.len() >= request.max_sources {
                break;
            }
        }

        Ok(self.finish(request, sources, total_tokens, sources_considered, user_id, start))
    }

    /// When nothing clears `min_relevance`, fall back to the most recent entries,
    /// scored by recency alone and ignoring `content_types`/`recency_days`.
    fn recency_fallback(
        &self,
        user_id: &str,
        request: &ContextRequest,
        sources_considered: usize,
        start: std::time::Instant,
    ) -> Result<RetrievedContext> {
        let now = Utc::now();
        let records = self
            .store
            .list(user_id, None, request.max_sources as i64, 0, "indexed_at")?;
        let mut sources = Vec::new();
        let mut total_tokens = 0_i64;
        for entry in records {
            let excerpt = entry.content_preview.clone();
            let cost = estimate_token_count(&excerpt);
            if total_tokens + cost > request.max_tokens {
                continue;
            }
            total_tokens += cost;
            let recency = recency_score(entry.indexed_at, now);
            sources.push(ContextSource {
                entry_id: entry.id,
                title: entry.title,
                content_type: entry.content_type,
                relevance_score: recency,
                excerpt,
                source_url: entry.source_url,
            });
        }
        Ok(self.finish(request, sources, total_tokens, sources_considered, user_id, start))
    }

    fn finish(
        &self,
        request: &ContextRequest,
        sources: Vec<ContextSource>,
        token_count: i64,
        sources_considered: usize,
        user_id: &str,
        start: std::time::Instant,
    ) -> RetrievedContext {
        let context_text = Self::format_context(request.format, &sources);
        let voice_summary = if request.include_voice_profile {
            self.voice.get_profile(user_id).map(|profile| {
                let keywords = profile
                    .tone_keywords
                    .iter()
                    .take(VOICE_SUMMARY_KEYWORD_COUNT)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Tone: {keywords}. Confidence: {:.2}", profile.confidence)
            })
        } else {
            None
        };
        RetrievedContext {
            query: request.query.clone(),
            sources_included: sources.len(),
            sources,
            context_text,
            token_count,
            voice_summary,
            retrieval_time_ms: start.elapsed().as_millis() as i64,
            sources_considered,
        }
    }

    /// Render sources as markdown, plain text, or XML.
    fn format_context(format: ContextFormat, sources: &[ContextSource]) -> String {
        match format {
            ContextFormat::Xml => {
                let mut parts = vec!["<context>".to_string()];
                for source in sources {
                    parts.push(format!(
                        "  <source id=\"{}\" type=\"{}\">\n    <title>{}</title>\n    <excerpt>{}</excerpt>\n  </source>",
                        source.entry_id, source.content_type, source.title, source.excerpt
                    ));
                }
                parts.push("</context>".to_string());
                parts.join("\n")
            }
            ContextFormat::Plain => sources
                .iter()
                .enumerate()
                .map(|(idx, s)| format!("[{}] {} — {}", idx + 1, s.title, s.excerpt))
                .collect::<Vec<_>>()
                .join("\n\n"),
            ContextFormat::Markdown => sources
                .iter()
                .map(|s| format!("### {}\n{}", s.title, s.excerpt))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }

    /// Summarize the user's voice profile for prompt injection, or `None` if no
    /// profile exists yet.
    pub fn build_voice_context(&self, user_id: &str) -> Option<VoiceContext> {
        let profile = self.voice.get_profile(user_id)?;
        Some(VoiceContext {
            profile_summary: format!("User voice profile with {} samples.", profile.sample_size),
            tone_guidance: profile
                .tone_keywords
                .iter()
                .take(VOICE_SUMMARY_KEYWORD_COUNT)
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            vocabulary_hints: profile.vocabulary_patterns.common_words.clone(),
            phrases_to_use: profile.vocabulary_patterns.preferred_phrases.clone(),
            things_to_avoid: profile.vocabulary_patterns.words_to_avoid.clone(),
            example_excerpts: Vec::new(),
            confidence: profile.confidence,
        })
    }
}
