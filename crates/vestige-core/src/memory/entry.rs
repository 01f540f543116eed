//! `MemoryEntry` — the durable unit of memory.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed enum of content kinds a memory entry can hold.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Document,
    Video,
    Audio,
    Link,
    TextSnippet,
    YoutubeVideo,
    InstagramPost,
    NotionPage,
    Article,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Document => "document",
            ContentType::Video => "video",
            ContentType::Audio => "audio",
            ContentType::Link => "link",
            ContentType::TextSnippet => "text_snippet",
            ContentType::YoutubeVideo => "youtube_video",
            ContentType::InstagramPost => "instagram_post",
            ContentType::NotionPage => "notion_page",
            ContentType::Article => "article",
        }
    }

    /// Content types whose text is representative enough of the user's own
    /// writing to feed the voice profile.
    pub fn feeds_voice_profile(&self) -> bool {
        matches!(
            self,
            ContentType::Document
                | ContentType::TextSnippet
                | ContentType::Article
                | ContentType::NotionPage
        )
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(ContentType::Document),
            "video" => Ok(ContentType::Video),
            "audio" => Ok(ContentType::Audio),
            "link" => Ok(ContentType::Link),
            "text_snippet" => Ok(ContentType::TextSnippet),
            "youtube_video" => Ok(ContentType::YoutubeVideo),
            "instagram_post" => Ok(ContentType::InstagramPost),
            "notion_page" => Ok(ContentType::NotionPage),
            "article" => Ok(ContentType::Article),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}

/// The floor `relevance_decay` may never drop below.
pub const DECAY_FLOOR: f32 = 0.1;

/// The maximum length of `content_preview`, and the prefix length it is built from.
pub const PREVIEW_LEN: usize = 500;

/// The durable unit of memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub id: String,
    pub user_id: String,
    pub content_type: ContentType,
    pub title: String,
    pub content_preview: String,
    pub content: String,
    pub embedding_id: String,
    pub indexed_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub access_count: i64,
    pub relevance_decay: f32,
    pub source_url: Option<String>,
    pub source_metadata: Option<BTreeMap<String, serde_json::Value>>,
    pub related_entries: Vec<String>,
    pub tags: Vec<String>,
    pub token_count: i64,
}

impl MemoryEntry {
    /// Build the `content_preview` for a piece of content: a prefix of at most
    /// [`PREVIEW_LEN`] characters.
    pub fn preview_of(content: &str) -> String {
        content.chars().take(PREVIEW_LEN).collect()
    }

    /// Clamp a decay value to the floor.
    pub fn clamp_decay(value: f32) -> f32 {
        value.max(DECAY_FLOOR)
    }

    /// `last_accessed_at` if set, else `indexed_at` — the timestamp staleness
    /// checks (decay, compaction, health) measure age against.
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.last_accessed_at.unwrap_or(self.indexed_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_prefix_respects_cap() {
        let short = "hello world";
        assert_eq!(MemoryEntry::preview_of(short), short);

        let long = "x".repeat(1000);
        let preview = MemoryEntry::preview_of(&long);
        assert_eq!(preview.chars().count(), PREVIEW_LEN);
        assert!(long.starts_with(&preview));
    }

    #[test]
    fn decay_never_drops_below_floor() {
        assert_eq!(MemoryEntry::clamp_decay(0.0), DECAY_FLOOR);
        assert_eq!(MemoryEntry::clamp_decay(0.05), DECAY_FLOOR);
        assert_eq!(MemoryEntry::clamp_decay(0.5), 0.5);
    }

    #[test]
    fn content_type_round_trips_through_str() {
        for ct in [
            ContentType::Document,
            ContentType::Video,
            ContentType::Audio,
            ContentType::Link,
            ContentType::TextSnippet,
            ContentType::YoutubeVideo,
            ContentType::InstagramPost,
            ContentType::NotionPage,
            ContentType::Article,
        ] {
            let parsed: ContentType = ct.as_str().parse().unwrap();
            assert_eq!(parsed, ct);
        }
    }
}
