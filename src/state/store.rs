//! File-backed store for per-site runtime state
//!
//! The whole file is loaded once, mutated in place and written back after
//! every mutation. Only the scheduler's control task touches it, so there
//! is no locking.

use crate::state::{ResumeCursor, SiteRuntimeState};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading or writing the state file
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable per-site resumable state
#[derive(Debug)]
pub struct PersistenceStore {
    path: PathBuf,
    sites: BTreeMap<String, SiteRuntimeState>,
    resume: Option<ResumeCursor>,
}

impl PersistenceStore {
    /// Opens the store at `path`, loading whatever state is already there
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            path: path.into(),
            sites: BTreeMap::new(),
            resume: None,
        };
        store.load();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// (Re)loads the state file
    ///
    /// A missing or unreadable file leaves the store empty; it is never an error.
    pub fn load(&mut self) {
        self.sites = match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                match serde_json::from_str::<BTreeMap<String, SiteRuntimeState>>(&content) {
                    Ok(mut sites) => {
                        sites.values_mut().for_each(SiteRuntimeState::normalize);
                        tracing::debug!(
                            "Loaded state for {} sites from {}",
                            sites.len(),
                            self.path.display()
                        );
                        sites
                    }
                    Err(e) => {
                        tracing::warn!(
                            "State file {} is corrupt ({}), starting from empty state",
                            self.path.display(),
                            e
                        );
                        BTreeMap::new()
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "No state file at {}, starting from empty state",
                    self.path.display()
                );
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!(
                    "Cannot read state file {} ({}), starting from empty state",
                    self.path.display(),
                    e
                );
                BTreeMap::new()
            }
        };
    }

    /// Writes the state file, replacing it atomically
    pub fn save(&self) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.sites)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            tracing::error!("Failed to write state file {}: {}", self.path.display(), e);
        }
    }

    fn entry(&mut self, site: &str) -> &mut SiteRuntimeState {
        self.sites.entry(site.to_string()).or_default()
    }

    /// Returns a copy of the site's state, or an empty state if none exists yet
    pub fn get(&self, site: &str) -> SiteRuntimeState {
        self.sites.get(site).cloned().unwrap_or_default()
    }

    /// Names of every site with persisted state
    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }

    /// Records the keyword/page cursor of an in-progress crawl
    pub fn update(&mut self, site: &str, keyword: &str, page: u32) {
        let state = self.entry(site);
        state.keyword = Some(keyword.to_string());
        state.page = Some(page.max(1));
        self.persist();
    }

    /// Drops the keyword/page cursor
    pub fn clear(&mut self, site: &str) {
        let state = self.entry(site);
        state.keyword = None;
        state.page = None;
        self.persist();
    }

    /// Sets or clears the last execution timestamp
    pub fn record_execution(&mut self, site: &str, at: Option<DateTime<Utc>>) {
        self.entry(site).last_execution = at;
        self.persist();
    }

    pub fn get_execution(&self, site: &str) -> Option<DateTime<Utc>> {
        self.sites.get(site).and_then(|s| s.last_execution)
    }

    /// Records an error, stamped with the current time
    pub fn record_error(&mut self, site: &str, message: &str) {
        self.record_error_at(site, message, Utc::now());
    }

    pub fn record_error_at(&mut self, site: &str, message: &str, at: DateTime<Utc>) {
        let state = self.entry(site);
        state.last_error = Some(message.to_string());
        state.last_error_time = Some(at);
        self.persist();
    }

    pub fn get_failed_keywords(&self, site: &str) -> BTreeSet<String> {
        self.sites
            .get(site)
            .map(|s| s.failed_keywords.clone())
            .unwrap_or_default()
    }

    pub fn add_failed_keyword(&mut self, site: &str, keyword: &str) {
        self.entry(site).failed_keywords.insert(keyword.to_string());
        self.persist();
    }

    pub fn remove_failed_keyword(&mut self, site: &str, keyword: &str) {
        self.entry(site).failed_keywords.remove(keyword);
        self.persist();
    }

    /// Closes a crawl pass
    ///
    /// The cursor is dropped only when no keyword is waiting for a retry.
    /// The error marker is cleared either way.
    pub fn finalize(&mut self, site: &str) {
        let state = self.entry(site);
        if state.failed_keywords.is_empty() {
            state.keyword = None;
            state.page = None;
        }
        state.last_error = None;
        state.last_error_time = None;
        self.persist();
    }

    /// Snapshots the site's cursor so its next crawl resumes where it stopped
    pub fn prepare_resume(&mut self, site: &str) {
        let state = self.get(site);
        let cursor = ResumeCursor::new(site, state.keyword, state.page);
        tracing::info!(
            "Resume cursor for {}: keyword={:?} page={}",
            site,
            cursor.resume_keyword,
            cursor.resume_page
        );
        self.resume = Some(cursor);
    }

    /// Returns `(skip, start_page)` for a keyword of `site`
    pub fn should_skip(&mut self, site: &str, keyword: &str) -> (bool, u32) {
        match self.resume.as_mut() {
            Some(cursor) if cursor.site == site => cursor.should_skip(keyword),
            _ => (false, 1),
        }
    }

    /// Drops the resume cursor once the site it was prepared for has crawled
    pub fn finish_resume(&mut self, site: &str) {
        if self.resume.as_ref().is_some_and(|c| c.site == site) {
            self.resume = None;
        }
    }

    pub fn resume_cursor(&self) -> Option<&ResumeCursor> {
        self.resume.as_ref()
    }
}
