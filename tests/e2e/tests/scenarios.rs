//! End-to-end scenarios driven purely through `vestige_core::Engine`'s public API.

use std::time::Duration;

use vestige_core::config::CompoundingDefaults;
use vestige_core::memory::{ContentType, ContextRequest, IngestRequest};
use vestige_core::{Engine, VestigeConfig};

fn ingest_request(content_type: ContentType, title: &str, content: &str) -> IngestRequest {
    IngestRequest {
        content_type,
        title: title.to_string(),
        content: content.to_string(),
        source_url: None,
        metadata: None,
        tags: vec![],
    }
}

fn default_context_request(query: &str, max_tokens: i64, max_sources: usize) -> ContextRequest {
    ContextRequest {
        query: query.to_string(),
        max_tokens,
        max_sources,
        min_relevance: 0.5,
        content_types: None,
        recency_days: None,
        format: Default::default(),
        include_voice_profile: false,
    }
}

#[tokio::test]
async fn single_ingest_then_retrieve() {
    let engine = Engine::in_memory(VestigeConfig::default()).unwrap();
    engine
        .ingest(
            "u1".to_string(),
            ingest_request(
                ContentType::Document,
                "Marketing Playbook",
                "This document covers retention, positioning, and storytelling.",
            ),
        )
        .await
        .unwrap();

    let context = engine
        .retrieve_context(
            "u1".to_string(),
            default_context_request("How do I improve positioning?", 500, 3),
        )
        .await
        .unwrap();

    assert_eq!(context.sources[0].title, "Marketing Playbook");
    assert!(context.token_count > 0);
}

#[tokio::test]
async fn decay_with_zero_days() {
    let mut config = VestigeConfig::default();
    config.compounding = CompoundingDefaults {
        decay_after_days: 0,
        decay_rate: 0.5,
        ..CompoundingDefaults::default()
    };
    let engine = Engine::in_memory(config).unwrap();
    let response = engine
        .ingest(
            "u1".to_string(),
            ingest_request(ContentType::TextSnippet, "Quick note", "a short text snippet"),
        )
        .await
        .unwrap();

    let summary = engine.compact("u1".to_string(), false, false).await.unwrap();
    assert_eq!(summary.decayed_entries, 1);

    let entry = engine
        .get_entry("u1".to_string(), response.entry_id)
        .await
        .unwrap()
        .unwrap();
    assert!((entry.relevance_decay - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn voice_update_on_article() {
    let engine = Engine::in_memory(VestigeConfig::default()).unwrap();
    engine
        .ingest(
            "u1".to_string(),
            ingest_request(
                ContentType::Article,
                "An Article",
                "This article discusses writing style, vocabulary, and tone at length.",
            ),
        )
        .await
        .unwrap();

    let profile = engine
        .voice_profile("u1".to_string())
        .await
        .unwrap()
        .expect("voice profile should exist after ingesting an article");
    assert_eq!(profile.sample_size, 1);
    assert!(profile.confidence > 0.0);
}

#[tokio::test]
async fn empty_fallback_returns_recent_entries_by_recency() {
    let engine = Engine::in_memory(VestigeConfig::default()).unwrap();
    engine
        .ingest(
            "u1".to_string(),
            ingest_request(ContentType::Document, "Old Note", "completely unrelated filler text"),
        )
        .await
        .unwrap();

    let mut request = default_context_request("some query that matches nothing", 2000, 5);
    request.min_relevance = 1.01; // impossible to clear — forces the recency fallback
    let context = engine.retrieve_context("u1".to_string(), request).await.unwrap();

    assert_eq!(context.sources.len(), 1);
    assert_eq!(context.sources[0].title, "Old Note");
}

#[tokio::test]
async fn duplicate_merge_keeps_the_later_entry() {
    let engine = Engine::in_memory(VestigeConfig::default()).unwrap();
    let identical = "Identical article body about compounding memory systems.";

    let mut first = ingest_request(ContentType::Article, "Draft One", identical);
    first.tags = vec!["draft".to_string()];
    let r1 = engine.ingest("u1".to_string(), first).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;

    let mut second = ingest_request(ContentType::Article, "Draft Two", identical);
    second.tags = vec!["final".to_string()];
    let r2 = engine.ingest("u1".to_string(), second).await.unwrap();

    let summary = engine.compact("u1".to_string(), false, true).await.unwrap();
    assert_eq!(summary.merged_pairs, vec![(r2.entry_id.clone(), r1.entry_id.clone())]);

    let entries = engine
        .list_entries("u1".to_string(), None, 100, 0)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);

    let survivor = engine
        .get_entry("u1".to_string(), r2.entry_id.clone())
        .await
        .unwrap()
        .unwrap();
    assert!(survivor.tags.contains(&"draft".to_string()));
    assert!(survivor.tags.contains(&"final".to_string()));

    assert!(!engine.has_vector("u1".to_string(), r1.entry_id).await);
    assert!(engine.has_vector("u1".to_string(), r2.entry_id).await);
}

#[tokio::test]
async fn delete_parity_between_storage_and_vector_index() {
    let engine = Engine::in_memory(VestigeConfig::default()).unwrap();
    let response = engine
        .ingest(
            "u1".to_string(),
            ingest_request(ContentType::Document, "To Delete", "content bound for deletion"),
        )
        .await
        .unwrap();

    let removed = engine
        .delete_entry("u1".to_string(), response.entry_id.clone())
        .await
        .unwrap();
    assert!(removed);

    assert!(engine
        .get_entry("u1".to_string(), response.entry_id.clone())
        .await
        .unwrap()
        .is_none());
    assert!(!engine.has_vector("u1".to_string(), response.entry_id.clone()).await);

    let removed_again = engine
        .delete_entry("u1".to_string(), response.entry_id)
        .await
        .unwrap();
    assert!(!removed_again);
}
