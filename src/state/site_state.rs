use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Persisted runtime state for one site
///
/// Field names are the on-disk JSON keys. The entry for a site is created
/// lazily and never removed; individual fields are reset instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRuntimeState {
    /// Search term currently in progress
    #[serde(default)]
    pub keyword: Option<String>,

    /// Page within `keyword`; at least 1 whenever `keyword` is set
    #[serde(default)]
    pub page: Option<u32>,

    /// Keywords whose last attempt failed and must be retried
    #[serde(default)]
    pub failed_keywords: BTreeSet<String>,

    #[serde(default)]
    pub last_error: Option<String>,

    #[serde(default)]
    pub last_error_time: Option<DateTime<Utc>>,

    /// Time of the last successful execution
    #[serde(default)]
    pub last_execution: Option<DateTime<Utc>>,
}

impl SiteRuntimeState {
    /// Restores the field invariants after loading from disk
    ///
    /// The error message and its timestamp are kept only as a pair, and a
    /// page cursor only exists alongside a keyword.
    pub fn normalize(&mut self) {
        if self.last_error.is_some() != self.last_error_time.is_some() {
            self.last_error = None;
            self.last_error_time = None;
        }

        match self.keyword {
            Some(_) => {
                if self.page.map_or(true, |p| p == 0) {
                    self.page = Some(1);
                }
            }
            None => self.page = None,
        }
    }

    /// Returns true if a crawl is part-way through a keyword
    pub fn has_cursor(&self) -> bool {
        self.keyword.is_some()
    }

    pub fn has_error(&self) -> bool {
        self.last_error_time.is_some()
    }
}
