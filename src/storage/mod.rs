//! Storage module for persisting harvested postings
//!
//! This module handles all database operations for postings, including:
//! - SQLite database initialization and schema management
//! - Insert-if-absent by natural key `(site, external_id)`
//! - The duplicate-discovery query used by the dedup merger
//! - Multi-statement transactional batches

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{JobStore, StorageError, StorageResult};

use rusqlite::types::Value;

/// A posting scraped from a site, not yet stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewJob {
    pub site: String,
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub keyword: Option<String>,
}

impl NewJob {
    /// Checks the fields every stored posting must carry
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.external_id.trim().is_empty() {
            return Err("missing posting id".to_string());
        }
        if self.title.trim().is_empty() {
            return Err(format!("posting {} has no title", self.external_id));
        }
        if self.company.trim().is_empty() {
            return Err(format!("posting {} has no company", self.external_id));
        }
        Ok(())
    }
}

/// A stored posting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub id: i64,
    pub site: String,
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub keyword: Option<String>,
    pub seen: bool,
    pub applied: bool,
    pub discarded: bool,
    pub merged: bool,
    pub created_at: String,
}

impl JobRecord {
    /// Returns true if a person has acted on this posting
    pub fn has_user_action(&self) -> bool {
        self.seen || self.applied || self.discarded
    }
}

/// Things a person can do to a posting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Seen,
    Applied,
    Discarded,
}

impl UserAction {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Seen => "seen",
            Self::Applied => "applied",
            Self::Discarded => "discarded",
        }
    }
}

/// Which rows may take part in duplicate discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateFilter {
    /// Only rows nobody has acted on yet
    Untouched,
    All,
}

impl CandidateFilter {
    pub fn predicate(&self) -> &'static str {
        match self {
            Self::Untouched => "seen = 0 AND applied = 0 AND discarded = 0",
            Self::All => "1 = 1",
        }
    }
}

/// Postings sharing the same title and company
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub count: usize,
    /// Member ids, ascending
    pub ids: Vec<i64>,
    pub title: String,
    pub company: String,
}

impl DuplicateGroup {
    /// Builds a group from one row of the discovery query
    ///
    /// `ids` is the comma-separated id list; it is sorted numerically here
    /// because the database gives no ordering guarantee.
    pub fn from_row(count: i64, ids: &str, title: String, company: String) -> StorageResult<Self> {
        let mut parsed = ids
            .split(',')
            .map(|id| id.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| StorageError::MalformedGroup(format!("bad id list '{}'", ids)))?;
        parsed.sort_unstable();
        parsed.dedup();

        if parsed.len() < 2 || parsed.len() as i64 != count {
            return Err(StorageError::MalformedGroup(format!(
                "group '{}' / '{}' reports {} rows but lists {:?}",
                title, company, count, parsed
            )));
        }

        Ok(Self {
            count: parsed.len(),
            ids: parsed,
            title,
            company,
        })
    }
}

/// One SQL statement with positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Builds `?, ?, ?` for an `IN (...)` clause
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
