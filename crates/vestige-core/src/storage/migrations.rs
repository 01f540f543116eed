//! Schema definition for the record store.
//!
//! Two logical tables: `memory_entries` keyed by `id` with a secondary index on
//! `(user_id, content_type)` and on `indexed_at`; append-only `compounding_events`
//! indexed by `(user_id, timestamp desc)`.

/// SQL statements applied once when a store is opened. Idempotent (`IF NOT EXISTS`)
/// so opening an existing database is a no-op migration.
pub const MIGRATIONS: &str = "
CREATE TABLE IF NOT EXISTS memory_entries (
    id                  TEXT PRIMARY KEY,
    user_id             TEXT NOT NULL,
    content_type        TEXT NOT NULL,
    title               TEXT NOT NULL,
    content_preview     TEXT NOT NULL,
    content             TEXT NOT NULL,
    embedding_id        TEXT NOT NULL,
    indexed_at          TEXT NOT NULL,
    last_accessed_at    TEXT,
    access_count        INTEGER NOT NULL,
    relevance_decay     REAL NOT NULL,
    source_url          TEXT,
    source_metadata     TEXT,
    related_entries     TEXT NOT NULL,
    tags                TEXT NOT NULL,
    token_count         INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memory_user ON memory_entries(user_id);
CREATE INDEX IF NOT EXISTS idx_memory_user_type ON memory_entries(user_id, content_type);
CREATE INDEX IF NOT EXISTS idx_memory_indexed_at ON memory_entries(indexed_at);

CREATE TABLE IF NOT EXISTS compounding_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     TEXT NOT NULL,
    event_type  TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    details     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_user_ts ON compounding_events(user_id, timestamp DESC);
";
