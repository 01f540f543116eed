//! Record Store module.
//!
//! SQLite-backed durable storage for `MemoryEntry` rows and the append-only
//! compounding-event log, strictly scoped per `user_id`.

mod migrations;
mod sqlite;

pub use migrations::MIGRATIONS;
pub use sqlite::{RecordStats, RecordStore};
