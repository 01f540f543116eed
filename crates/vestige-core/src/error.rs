//! Error types for the memory engine.
//!
//! Closed taxonomy: `NotFound`, `ValidationFailed`, `StorageUnavailable`,
//! `CapabilityFailure`. HTTP status mapping lives at the edge (`vestige-mcp`),
//! not here — the core only classifies failures.

use thiserror::Error;

/// Errors raised by any engine component (storage, vector index, compounding,
/// context building).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested entry, profile, or collection does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Input failed a declared bound (title length, content length, limit range, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The durable record store could not complete the operation.
    #[error("storage unavailable: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The embedding provider or voice profile store failed.
    #[error("capability failure: {0}")]
    Capability(String),

    /// Filesystem error opening or preparing the database.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// True when the caller asked for something that doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }

    /// True when the failure is a capability (embedding/voice-profile) failure,
    /// which bulk ingestion captures per-entry instead of aborting.
    pub fn is_capability(&self) -> bool {
        matches!(self, EngineError::Capability(_))
    }
}
