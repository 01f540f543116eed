//! Engine configuration.
//!
//! No environment variable is mandatory; every knob has a default that
//! reproduces the original system's behavior.

use std::path::PathBuf;

/// Tunable parameters for the compounding engine's maintenance jobs.
#[derive(Debug, Clone, Copy)]
pub struct CompoundingDefaults {
    pub decay_after_days: i64,
    pub decay_rate: f32,
    pub link_threshold: f32,
    pub merge_threshold: f32,
}

impl Default for CompoundingDefaults {
    fn default() -> Self {
        Self {
            decay_after_days: 30,
            decay_rate: 0.95,
            link_threshold: 0.8,
            merge_threshold: 0.95,
        }
    }
}

/// Top-level engine configuration, assembled once at startup and handed down to
/// components as an explicit dependency.
#[derive(Debug, Clone)]
pub struct VestigeConfig {
    /// Path to the SQLite database file. `None` falls back to a platform data dir.
    pub storage_path: Option<PathBuf>,
    /// Embedding vector width.
    pub embedding_dimension: usize,
    /// Allowed CORS origins for the HTTP edge.
    pub cors_allow_origins: Vec<String>,
    pub compounding: CompoundingDefaults,
}

impl Default for VestigeConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            embedding_dimension: 512,
            cors_allow_origins: vec!["http://localhost:3000".to_string()],
            compounding: CompoundingDefaults::default(),
        }
    }
}

impl VestigeConfig {
    /// Build a config from environment variables, falling back to defaults for
    /// anything unset. None of these variables are required.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("VESTIGE_STORAGE_PATH") {
            if !path.is_empty() {
                config.storage_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(dim) = std::env::var("VESTIGE_EMBEDDING_DIMENSION") {
            if let Ok(parsed) = dim.parse::<usize>() {
                config.embedding_dimension = parsed;
            }
        }

        if let Ok(origins) = std::env::var("VESTIGE_CORS_ORIGINS") {
            let parsed: Vec<String> = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.cors_allow_origins = parsed;
            }
        }

        config
    }
}
