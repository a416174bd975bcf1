//! Storage traits and error types
//!
//! This module defines the trait interface for posting storage backends and
//! associated error types.

use crate::storage::{CandidateFilter, DuplicateGroup, JobRecord, NewJob, SqlStatement, UserAction};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Malformed duplicate group: {0}")]
    MalformedGroup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for posting storage implementations
///
/// Only the scheduler's control task uses a store, so implementations need
/// to be `Send` but not `Sync`.
pub trait JobStore: Send {
    // ===== Postings =====

    /// Inserts a new posting and returns its id
    fn insert(&mut self, job: &NewJob) -> StorageResult<i64>;

    /// Checks whether a posting with this natural key is already stored
    fn exists(&self, site: &str, external_id: &str) -> StorageResult<bool>;

    /// Gets a posting by id
    fn get_job(&self, id: i64) -> StorageResult<Option<JobRecord>>;

    /// Gets the postings with the given ids, ordered by id
    ///
    /// Ids that do not exist are silently absent from the result.
    fn get_jobs(&self, ids: &[i64]) -> StorageResult<Vec<JobRecord>>;

    /// Records that a person acted on a posting
    fn mark_user_action(&mut self, id: i64, action: UserAction) -> StorageResult<()>;

    // ===== Deduplication =====

    /// Groups candidate postings by `(title, company)`, keeping groups of 2 or more
    fn find_duplicate_groups(&self, filter: CandidateFilter) -> StorageResult<Vec<DuplicateGroup>>;

    /// Executes all statements in one transaction: all apply or none do
    fn execute_transaction(&mut self, statements: &[SqlStatement]) -> StorageResult<()>;

    // ===== Statistics =====

    fn count_jobs(&self) -> StorageResult<u64>;

    /// Posting counts per site, sorted by site name
    fn count_jobs_by_site(&self) -> StorageResult<Vec<(String, u64)>>;
}
