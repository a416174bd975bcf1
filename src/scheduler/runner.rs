//! The scheduler control loop
//!
//! Each tick evaluates every schedulable site, prints the status table and
//! runs the due sites one by one in declaration order. When nothing is due
//! the loop sleeps until the nearest site becomes due.

use crate::config::Config;
use crate::dedup::DedupMerger;
use crate::executor::{CancelToken, Outcome, SessionPool, SiteExecutor, SiteRegistry};
use crate::scheduler::calculator::{humanize, Decision, Moment, StateCalculator};
use crate::scheduler::report::{print_status_table, StatusRow};
use crate::state::PersistenceStore;
use crate::storage::JobStore;
use crate::{CadencyError, HarvestError};
use chrono::Utc;
use std::time::Duration;

/// Sleep used when no site reports a finite wait
const FALLBACK_IDLE_SECS: u64 = 60;

/// Drives all configured sites
pub struct Scheduler {
    config: Config,
    calculator: StateCalculator,
    state: PersistenceStore,
    jobs: Box<dyn JobStore>,
    merger: DedupMerger,
    sessions: SessionPool,
    cancel: CancelToken,
    /// One per configured site, in declaration order
    executors: Vec<SiteExecutor>,
}

impl Scheduler {
    /// Creates a scheduler, building every configured site from the registry
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `state` - The per-site runtime state store
    /// * `jobs` - Posting storage
    /// * `registry` - Site implementations by `kind`
    /// * `cancel` - Interrupt counter shared with the Ctrl+C listener
    ///
    /// # Returns
    ///
    /// * `Ok(Scheduler)` - Every site was built
    /// * `Err(HarvestError)` - A site's `kind` is unknown or its factory failed
    pub fn new(
        config: Config,
        state: PersistenceStore,
        jobs: Box<dyn JobStore>,
        registry: &SiteRegistry,
        cancel: CancelToken,
    ) -> Result<Self, HarvestError> {
        let grace = Duration::from_millis(config.scheduler.interrupt_grace_ms);
        let executors = config
            .sites
            .iter()
            .map(|site| {
                registry
                    .build(site, &config)
                    .map(|built| SiteExecutor::new(built, cancel.clone(), grace))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            calculator: StateCalculator::new(config.cadency_overrides.clone()),
            config,
            state,
            jobs,
            merger: DedupMerger::new(),
            sessions: SessionPool::new(),
            cancel,
            executors,
        })
    }

    /// Replaces the session pool
    pub fn with_sessions(mut self, sessions: SessionPool) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn state(&self) -> &PersistenceStore {
        &self.state
    }

    pub fn jobs(&self) -> &dyn JobStore {
        &*self.jobs
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.config.sites.iter().position(|s| s.name == name)
    }

    /// Evaluates the given sites
    fn evaluate(
        &self,
        indices: &[usize],
        moment: &Moment,
        starting_at: Option<&str>,
    ) -> Result<Vec<(usize, Decision)>, CadencyError> {
        indices
            .iter()
            .map(|&idx| {
                let site = &self.config.sites[idx];
                let state = self.state.get(&site.name);
                self.calculator
                    .decide(site, &state, moment, starting_at)
                    .map(|decision| (idx, decision))
            })
            .collect()
    }

    fn status_rows(&self, decisions: &[(usize, Decision)]) -> Vec<StatusRow> {
        decisions
            .iter()
            .map(|(idx, decision)| {
                let site = &self.config.sites[*idx];
                StatusRow {
                    site: site.name.clone(),
                    decision: decision.clone(),
                    ignored: site.ignore_autoscheduling,
                }
            })
            .collect()
    }

    /// Prints the status of every configured site without running anything
    pub fn status(&self) -> Result<Vec<StatusRow>, HarvestError> {
        let indices: Vec<usize> = (0..self.config.sites.len()).collect();
        let decisions = self.evaluate(&indices, &Moment::now(), None)?;
        let rows = self.status_rows(&decisions);
        print_status_table(&rows);
        Ok(rows)
    }

    /// Runs the scheduled loop until interrupted
    ///
    /// # Arguments
    ///
    /// * `wait_before_first_runs` - Treat every never-run site as having just run
    /// * `starting_at` - Run this site first and defer all others until it has run
    pub async fn run_all(
        &mut self,
        wait_before_first_runs: bool,
        starting_at: Option<String>,
    ) -> Result<(), HarvestError> {
        if let Some(target) = &starting_at {
            if self.index_of(target).is_none() {
                return Err(HarvestError::UnknownSite(target.clone()));
            }
            self.state.prepare_resume(target);
        }
        let mut starting_at = starting_at;

        let schedulable: Vec<usize> = self
            .config
            .sites
            .iter()
            .enumerate()
            .filter(|(_, site)| {
                !site.ignore_autoscheduling || starting_at.as_deref() == Some(site.name.as_str())
            })
            .map(|(idx, _)| idx)
            .collect();

        if schedulable.is_empty() {
            tracing::info!("No site is eligible for automatic scheduling");
            return Ok(());
        }

        let now = Utc::now();
        for &idx in &schedulable {
            let site = &self.config.sites[idx];
            if (wait_before_first_runs || site.wait_before_first_run)
                && self.state.get_execution(&site.name).is_none()
            {
                tracing::info!("{} waits a full cadency before its first run", site.name);
                self.state.record_execution(&site.name, Some(now));
            }
        }

        loop {
            let moment = Moment::now();
            let decisions = self.evaluate(&schedulable, &moment, starting_at.as_deref())?;
            print_status_table(&self.status_rows(&decisions));

            let due: Vec<usize> = decisions
                .iter()
                .filter(|(_, d)| d.is_due())
                .map(|(idx, _)| *idx)
                .collect();

            if due.is_empty() {
                let wait = decisions
                    .iter()
                    .filter(|(_, d)| !d.is_force_skipped())
                    .map(|(_, d)| d.seconds_remaining.max(1) as u64)
                    .min()
                    .unwrap_or(FALLBACK_IDLE_SECS);
                tracing::info!("Nothing due, next check in {}", humanize(wait as i64));

                let seen = self.cancel.count();
                let interrupted = tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(wait)) => false,
                    _ = self.cancel.interrupted_after(seen) => true,
                };
                if interrupted {
                    let grace = Duration::from_millis(self.config.scheduler.interrupt_grace_ms);
                    tracing::warn!(
                        "Interrupted while idle; press Ctrl+C again within {}ms to stop the scheduler",
                        grace.as_millis()
                    );
                    if self.cancel.confirm_abort(seen + 1, grace).await {
                        tracing::warn!("Scheduler aborted by operator");
                        return Ok(());
                    }
                    tracing::info!("Continuing");
                }
                continue;
            }

            for idx in due {
                let outcome = self.run_site(idx, false).await?;

                let name = self.config.sites[idx].name.clone();
                if starting_at.as_deref() == Some(name.as_str()) {
                    match outcome {
                        Outcome::Succeeded | Outcome::Failed => {
                            tracing::info!(
                                "Starting target {} has run, resuming normal schedule",
                                name
                            );
                            self.state.finish_resume(&name);
                            starting_at = None;
                        }
                        Outcome::Interrupted | Outcome::AbortAll => {
                            // pick up from the progress saved before the interrupt
                            self.state.prepare_resume(&name);
                        }
                    }
                }

                if outcome == Outcome::AbortAll {
                    tracing::warn!("Scheduler aborted by operator");
                    return Ok(());
                }
            }
        }
    }

    /// Runs the named sites once each, in order, ignoring all timers
    ///
    /// Unknown names are reported and skipped. A confirmed double interrupt
    /// stops the batch.
    pub async fn run_specified(&mut self, names: &[String]) -> Result<(), HarvestError> {
        for name in names {
            let Some(idx) = self.index_of(name) else {
                tracing::warn!("Unknown site '{}', skipping", name);
                continue;
            };

            if self.run_site(idx, true).await? == Outcome::AbortAll {
                tracing::warn!("Batch aborted by operator");
                break;
            }
        }
        Ok(())
    }

    /// Runs Preload (when the session needs it) then Execute for one site
    async fn run_site(&mut self, idx: usize, force_preload: bool) -> Result<Outcome, HarvestError> {
        let site = &self.config.sites[idx];
        let close_after = site.close_session_after_run;
        let fresh = force_preload || self.config.scheduler.fresh_session_each_run || close_after;

        let _slot = self.sessions.acquire(&site.name).await?;
        let executor = &mut self.executors[idx];

        if fresh || !executor.is_preloaded() {
            match executor.execute_preload(&mut self.state).await {
                Outcome::Succeeded => {}
                Outcome::Failed => {
                    tracing::info!("Skipping {} this tick, preload failed", executor.name());
                    return Ok(Outcome::Failed);
                }
                other => return Ok(other),
            }
        }

        let outcome = executor
            .execute(&mut self.state, &mut *self.jobs, &self.merger)
            .await;

        if close_after {
            executor.close_session().await;
        }

        Ok(outcome)
    }
}
