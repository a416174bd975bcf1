//! Job-Harvester: a polite, resumable job-posting harvester
//!
//! This crate schedules crawls of several job sites, one at a time, with
//! per-site cadency, error cooldowns and resumable keyword/page progress.
//! Postings are stored in SQLite and near-duplicates are merged as they
//! are inserted.

pub mod config;
pub mod dedup;
pub mod executor;
pub mod scheduler;
pub mod sites;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Job-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cadency override error: {0}")]
    Cadency(#[from] CadencyError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Unknown site: {0}")]
    UnknownSite(String),

    #[error("No implementation registered as '{kind}' (site '{site}')")]
    UnknownImplementation { site: String, kind: String },

    #[error("Site '{site}' could not be built: {message}")]
    SiteSetup { site: String, message: String },

    #[error("Session pool closed: {0}")]
    Session(#[from] tokio::sync::AcquireError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while resolving time-of-day cadency overrides
///
/// These are never defaulted away: a broken override stops the scheduler
/// at evaluation time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CadencyError {
    #[error("Override '{key}': hour range must look like 'H1-H2'")]
    MalformedRange { key: String },

    #[error("Override '{key}': invalid hour '{value}'")]
    InvalidHour { key: String, value: String },

    #[error("Override '{key}': range {start}-{end} wraps past midnight")]
    InvertedRange { key: String, start: u32, end: u32 },

    #[error("Override '{key}': invalid duration '{value}'")]
    InvalidDuration { key: String, value: String },
}

/// Result type alias for Job-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use dedup::DedupMerger;
pub use executor::{CancelToken, SiteRegistry};
pub use scheduler::{Scheduler, StateCalculator};
pub use state::{PersistenceStore, SiteRuntimeState};
pub use storage::{JobStore, SqliteStorage};
