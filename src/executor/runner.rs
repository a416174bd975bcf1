//! Two-phase site executor
//!
//! Wraps one [`Site`] and turns whatever its phases do into an [`Outcome`],
//! updating the persisted state on the way. Errors never leave this module.

use crate::dedup::DedupMerger;
use crate::executor::cancel::CancelToken;
use crate::executor::site::{CrawlContext, Site};
use crate::state::PersistenceStore;
use crate::storage::JobStore;
use chrono::Utc;
use std::time::Duration;

/// How a phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    /// The phase failed; the error is recorded and the cooldown applies
    Failed,
    /// A single interrupt cancelled this site only
    Interrupted,
    /// The operator confirmed a second interrupt; stop everything
    AbortAll,
}

/// Drives one site through preload and execute
pub struct SiteExecutor {
    name: String,
    site: Box<dyn Site>,
    preloaded: bool,
    cancel: CancelToken,
    grace: Duration,
}

impl SiteExecutor {
    pub fn new(site: Box<dyn Site>, cancel: CancelToken, grace: Duration) -> Self {
        Self {
            name: site.name().to_string(),
            site,
            preloaded: false,
            cancel,
            grace,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_preloaded(&self) -> bool {
        self.preloaded
    }

    /// Warms up the site's session
    pub async fn execute_preload(&mut self, state: &mut PersistenceStore) -> Outcome {
        tracing::info!("Preloading {}", self.name);
        let seen = self.cancel.count();

        let result = tokio::select! {
            result = self.site.preload() => Some(result),
            _ = self.cancel.interrupted_after(seen) => None,
        };

        match result {
            Some(Ok(())) => {
                self.preloaded = true;
                Outcome::Succeeded
            }
            Some(Err(e)) => {
                self.preloaded = false;
                tracing::warn!("Preload of {} failed: {:#}", self.name, e);
                state.record_error(&self.name, &format!("preload: {:#}", e));
                Outcome::Failed
            }
            None => {
                self.preloaded = false;
                self.interrupted(state, seen).await
            }
        }
    }

    /// Runs the site's crawl
    ///
    /// Success stamps the execution time. Failure records the error and
    /// clears the execution time so the cooldown decides when to retry.
    pub async fn execute(
        &mut self,
        state: &mut PersistenceStore,
        jobs: &mut dyn JobStore,
        merger: &DedupMerger,
    ) -> Outcome {
        tracing::info!("Executing {}", self.name);
        let seen = self.cancel.count();

        let result = {
            let mut ctx = CrawlContext {
                state: &mut *state,
                jobs,
                merger,
            };
            tokio::select! {
                result = self.site.crawl(&mut ctx) => Some(result),
                _ = self.cancel.interrupted_after(seen) => None,
            }
        };

        match result {
            Some(Ok(())) => {
                tracing::info!("{} finished", self.name);
                state.record_execution(&self.name, Some(Utc::now()));
                Outcome::Succeeded
            }
            Some(Err(e)) => {
                tracing::warn!("{} failed: {:#}", self.name, e);
                state.record_error(&self.name, &format!("{:#}", e));
                state.record_execution(&self.name, None);
                Outcome::Failed
            }
            None => self.interrupted(state, seen).await,
        }
    }

    /// Closes the site's session; the next run preloads again
    pub async fn close_session(&mut self) {
        tracing::debug!("Closing session of {}", self.name);
        self.site.close_session().await;
        self.preloaded = false;
    }

    async fn interrupted(&self, state: &mut PersistenceStore, seen: u32) -> Outcome {
        state.record_execution(&self.name, None);
        tracing::warn!(
            "{} interrupted; press Ctrl+C again within {}ms to stop the scheduler",
            self.name,
            self.grace.as_millis()
        );

        // the interrupt that cancelled us is seen + 1
        if self.cancel.confirm_abort(seen + 1, self.grace).await {
            tracing::warn!("Second interrupt received, aborting");
            Outcome::AbortAll
        } else {
            tracing::info!("Continuing with the next site");
            Outcome::Interrupted
        }
    }
}
