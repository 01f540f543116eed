//! SQLite-backed record store.
//!
//! A single `rusqlite::Connection` behind a `Mutex` — operations serialize through
//! the lock, which is coarser than "per row" but gives well-defined last-writer-wins
//! semantics with no mixed-field state, without requiring a connection pool. Callers
//! on the async side run these blocking calls via `tokio::task::spawn_blocking`
//! (see `crate::ingestion`).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{EngineError, Result};
use crate::memory::{CompoundingEvent, ContentType, MemoryEntry};

/// Aggregate counts for a user's memory, grouped by content type.
#[derive(Debug, Clone, Default)]
pub struct RecordStats {
    pub total_entries: i64,
    pub total_tokens: i64,
    pub entries_by_type: BTreeMap<String, i64>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Durable, per-user-scoped storage for memory entries and the compounding event log.
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Open (or create) a record store at `path`, falling back to a platform data
    /// directory when `None`.
    pub fn new(path: Option<PathBuf>) -> Result<Self> {
        let resolved = match path {
            Some(p) => p,
            None => {
                let dirs = ProjectDirs::from("com", "vestige", "core")
                    .ok_or_else(|| EngineError::Validation("no platform data dir".into()))?;
                let data_dir = dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                data_dir.join("vestige.db")
            }
        };
        tracing::info!(path = %resolved.display(), "opening record store");
        let conn = Connection::open(resolved)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store, used by tests and short-lived tooling.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .or_else(|_| conn.execute_batch("PRAGMA foreign_keys = ON;"))?;
        conn.execute_batch(super::migrations::MIGRATIONS)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a new entry, or replace it wholesale if `entry.id` already exists.
    pub fn upsert(&self, entry: &MemoryEntry) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO memory_entries (
                id, user_id, content_type, title, content_preview, content, embedding_id,
                indexed_at, last_accessed_at, access_count, relevance_decay, source_url,
                source_metadata, related_entries, tags, token_count
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)
            ON CONFLICT(id) DO UPDATE SET
                title=excluded.title,
                content_preview=excluded.content_preview,
                content=excluded.content,
                embedding_id=excluded.embedding_id,
                indexed_at=excluded.indexed_at,
                last_accessed_at=excluded.last_accessed_at,
                access_count=excluded.access_count,
                relevance_decay=excluded.relevance_decay,
                source_url=excluded.source_url,
                source_metadata=excluded.source_metadata,
                related_entries=excluded.related_entries,
                tags=excluded.tags,
                token_count=excluded.token_count",
            params![
                entry.id,
                entry.user_id,
                entry.content_type.as_str(),
                entry.title,
                entry.content_preview,
                entry.content,
                entry.embedding_id,
                entry.indexed_at.to_rfc3339(),
                entry.last_accessed_at.map(|t| t.to_rfc3339()),
                entry.access_count,
                entry.relevance_decay,
                entry.source_url,
                entry
                    .source_metadata
                    .as_ref()
                    .map(|m| serde_json::to_string(m))
                    .transpose()
                    .map_err(|e| EngineError::Validation(e.to_string()))?,
                serde_json::to_string(&entry.related_entries)
                    .map_err(|e| EngineError::Validation(e.to_string()))?,
                serde_json::to_string(&entry.tags)
                    .map_err(|e| EngineError::Validation(e.to_string()))?,
                entry.token_count,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, user_id: &str, id: &str) -> Result<Option<MemoryEntry>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM memory_entries WHERE user_id = ?1 AND id = ?2",
            params![user_id, id],
            row_to_entry,
        )
        .optional()
        .map_err(EngineError::from)
    }

    /// Typed, paginated list. `sort_by` outside the declared set falls back to
    /// `indexed_at`.
    pub fn list(
        &self,
        user_id: &str,
        content_type: Option<ContentType>,
        limit: i64,
        offset: i64,
        sort_by: &str,
    ) -> Result<Vec<MemoryEntry>> {
        let sort_column = match sort_by {
            "indexed_at" | "last_accessed_at" | "relevance_decay" => sort_by,
            _ => "indexed_at",
        };
        let conn = self.lock();
        let sql = format!(
            "SELECT * FROM memory_entries WHERE user_id = ?1 {} ORDER BY {} DESC LIMIT ?2 OFFSET ?3",
            if content_type.is_some() {
                "AND content_type = ?4"
            } else {
                ""
            },
            sort_column,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = if let Some(ct) = content_type {
            stmt.query_map(params![user_id, limit, offset, ct.as_str()], row_to_entry)?
        } else {
            stmt.query_map(params![user_id, limit, offset], row_to_entry)?
        };
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(EngineError::from)
    }

    /// Unpaginated enumeration for maintenance scans.
    pub fn list_all(&self, user_id: &str) -> Result<Vec<MemoryEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT * FROM memory_entries WHERE user_id = ?1")?;
        let rows = stmt.query_map(params![user_id], row_to_entry)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(EngineError::from)
    }

    /// Every entry across every user, used once at startup to rebuild the
    /// in-memory vector index from durable storage.
    pub fn list_all_entries(&self) -> Result<Vec<MemoryEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT * FROM memory_entries")?;
        let rows = stmt.query_map([], row_to_entry)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(EngineError::from)
    }

    pub fn delete(&self, user_id: &str, id: &str) -> Result<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            "DELETE FROM memory_entries WHERE user_id = ?1 AND id = ?2",
            params![user_id, id],
        )?;
        Ok(changed > 0)
    }

    /// `update_access(user_id, id, at=now, inc=1, reset_decay=true)`.
    pub fn update_access(
        &self,
        user_id: &str,
        id: &str,
        at: DateTime<Utc>,
        inc: i64,
        reset_decay: bool,
    ) -> Result<()> {
        let conn = self.lock();
        if reset_decay {
            conn.execute(
                "UPDATE memory_entries
                 SET last_accessed_at = ?1, access_count = access_count + ?2, relevance_decay = 1.0
                 WHERE user_id = ?3 AND id = ?4",
                params![at.to_rfc3339(), inc, user_id, id],
            )?;
        } else {
            conn.execute(
                "UPDATE memory_entries
                 SET last_accessed_at = ?1, access_count = access_count + ?2
                 WHERE user_id = ?3 AND id = ?4",
                params![at.to_rfc3339(), inc, user_id, id],
            )?;
        }
        Ok(())
    }

    pub fn update_related_entries(&self, user_id: &str, id: &str, related: &[String]) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE memory_entries SET related_entries = ?1 WHERE user_id = ?2 AND id = ?3",
            params![
                serde_json::to_string(related).map_err(|e| EngineError::Validation(e.to_string()))?,
                user_id,
                id
            ],
        )?;
        Ok(())
    }

    /// Sets decay verbatim; the floor is enforced by the caller.
    pub fn update_decay(&self, user_id: &str, id: &str, value: f32) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE memory_entries SET relevance_decay = ?1 WHERE user_id = ?2 AND id = ?3",
            params![value, user_id, id],
        )?;
        Ok(())
    }

    /// Used by duplicate merge to fold tags/title/preview into the survivor.
    pub fn update_content_fields(
        &self,
        user_id: &str,
        id: &str,
        title: &str,
        preview: &str,
        tags: &[String],
    ) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE memory_entries SET title = ?1, content_preview = ?2, tags = ?3
             WHERE user_id = ?4 AND id = ?5",
            params![
                title,
                preview,
                serde_json::to_string(tags).map_err(|e| EngineError::Validation(e.to_string()))?,
                user_id,
                id
            ],
        )?;
        Ok(())
    }

    pub fn add_compounding_event(
        &self,
        user_id: &str,
        event_type: &str,
        details: &BTreeMap<String, serde_json::Value>,
    ) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO compounding_events (user_id, event_type, timestamp, details)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user_id,
                event_type,
                Utc::now().to_rfc3339(),
                serde_json::to_string(details).map_err(|e| EngineError::Validation(e.to_string()))?,
            ],
        )?;
        Ok(())
    }

    pub fn get_compounding_events(&self, user_id: &str, limit: i64) -> Result<Vec<CompoundingEvent>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, event_type, timestamp, details FROM compounding_events
             WHERE user_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit], |row| {
            let details_raw: String = row.get(3)?;
            let timestamp_raw: String = row.get(2)?;
            Ok(CompoundingEvent {
                user_id: row.get(0)?,
                event_type: row.get(1)?,
                timestamp: parse_timestamp(&timestamp_raw)?,
                details: serde_json::from_str(&details_raw).unwrap_or_default(),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(EngineError::from)
    }

    /// Grouped-by-content-type aggregate for stats & health.
    pub fn stats(&self, user_id: &str) -> Result<RecordStats> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT content_type, COUNT(*) AS count, SUM(token_count) AS tokens,
                    MIN(indexed_at) AS oldest, MAX(indexed_at) AS newest
             FROM memory_entries WHERE user_id = ?1 GROUP BY content_type",
        )?;
        let mut stats = RecordStats::default();
        let rows = stmt.query_map(params![user_id], |row| {
            let content_type: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let tokens: Option<i64> = row.get(2)?;
            let oldest: Option<String> = row.get(3)?;
            let newest: Option<String> = row.get(4)?;
            Ok((content_type, count, tokens.unwrap_or(0), oldest, newest))
        })?;
        for row in rows {
            let (content_type, count, tokens, oldest, newest) = row?;
            stats.total_entries += count;
            stats.total_tokens += tokens;
            stats.entries_by_type.insert(content_type, count);
            if let Some(raw) = oldest {
                let ts = parse_timestamp(&raw)?;
                stats.oldest = Some(match stats.oldest {
                    Some(existing) if existing < ts => existing,
                    _ => ts,
                });
            }
            if let Some(raw) = newest {
                let ts = parse_timestamp(&raw)?;
                stats.newest = Some(match stats.newest {
                    Some(existing) if existing > ts => existing,
                    _ => ts,
                });
            }
        }
        Ok(stats)
    }
}

fn parse_timestamp(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryEntry> {
    let content_type_raw: String = row.get("content_type")?;
    let indexed_at_raw: String = row.get("indexed_at")?;
    let last_accessed_raw: Option<String> = row.get("last_accessed_at")?;
    let source_metadata_raw: Option<String> = row.get("source_metadata")?;
    let related_raw: String = row.get("related_entries")?;
    let tags_raw: String = row.get("tags")?;

    Ok(MemoryEntry {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        content_type: content_type_raw.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                0,
                "content_type".into(),
                rusqlite::types::Type::Text,
            )
        })?,
        title: row.get("title")?,
        content_preview: row.get("content_preview")?,
        content: row.get("content")?,
        embedding_id: row.get("embedding_id")?,
        indexed_at: parse_timestamp(&indexed_at_raw)?,
        last_accessed_at: last_accessed_raw
            .map(|raw| parse_timestamp(&raw))
            .transpose()?,
        access_count: row.get("access_count")?,
        relevance_decay: row.get("relevance_decay")?,
        source_url: row.get("source_url")?,
        source_metadata: source_metadata_raw
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .unwrap_or(None),
        related_entries: serde_json::from_str(&related_raw).unwrap_or_default(),
        tags: serde_json::from_str(&tags_raw).unwrap_or_default(),
        token_count: row.get("token_count")?,
    })
}
