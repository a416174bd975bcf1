//! Per-site timing decisions
//!
//! Everything here is a pure function of a site's persisted state, its
//! configuration and a [`Moment`]. Nothing is mutated.

use crate::config::{CadencyOverrides, SiteConfig};
use crate::scheduler::cadency::resolve_cadency;
use crate::state::SiteRuntimeState;
use crate::CadencyError;
use chrono::{DateTime, Local, Timelike, Utc};
use std::fmt;

/// Cooldown applied after a recorded failure (seconds)
pub const ERROR_COOLDOWN_SECS: i64 = 1800;

/// Cadency used while failed keywords wait for a retry (seconds)
pub const RETRY_CADENCY_SECS: u64 = 900;

/// Remaining time reported for sites deferred by starting-at mode
pub const SKIPPED_SENTINEL: i64 = 999_999_999;

/// The instant a decision is made for
///
/// The wall-clock hour used for cadency overrides is carried separately so
/// it can be pinned in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moment {
    pub now: DateTime<Utc>,
    /// Local hour of day, 0..=23
    pub hour: u32,
}

impl Moment {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            now,
            hour: now.with_timezone(&Local).hour(),
        }
    }

    pub fn at(now: DateTime<Utc>, hour: u32) -> Self {
        Self { now, hour }
    }

    /// Whole seconds since `then`, never negative
    fn elapsed_since(&self, then: DateTime<Utc>) -> i64 {
        (self.now - then).num_seconds().max(0)
    }
}

/// Scheduling status of one site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    StartingTarget,
    SkippedStart,
    ErrorWait,
    Ready,
    Pending,
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::StartingTarget => "STARTING TARGET",
            Self::SkippedStart => "Skipped (Start)",
            Self::ErrorWait => "Error Wait",
            Self::Ready => "Ready",
            Self::Pending => "Pending",
        };
        f.write_str(label)
    }
}

/// An active error cooldown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPenalty {
    pub cooldown_secs: i64,
    pub remaining_secs: i64,
}

/// The regular cadency wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardWait {
    pub cadency_secs: u64,
    /// `"Default"`, the matching override range, or `"Retry(n)"`
    pub label: String,
    pub remaining_secs: i64,
}

/// The result of evaluating one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub seconds_remaining: i64,
    pub status: SiteStatus,
    pub display: String,
    pub cadency_label: String,
    pub cadency_duration: String,
}

impl Decision {
    pub fn is_due(&self) -> bool {
        self.seconds_remaining <= 0
    }

    /// True for sites deferred until the starting target has run
    pub fn is_force_skipped(&self) -> bool {
        self.status == SiteStatus::SkippedStart
    }
}

/// Returns the remaining cooldown if an error was recorded less than
/// [`ERROR_COOLDOWN_SECS`] ago
pub fn compute_error_penalty(state: &SiteRuntimeState, now: DateTime<Utc>) -> Option<ErrorPenalty> {
    let error_time = state.last_error_time?;
    let elapsed = (now - error_time).num_seconds().max(0);
    if elapsed < ERROR_COOLDOWN_SECS {
        Some(ErrorPenalty {
            cooldown_secs: ERROR_COOLDOWN_SECS,
            remaining_secs: ERROR_COOLDOWN_SECS - elapsed,
        })
    } else {
        None
    }
}

/// Decides when each site is due
#[derive(Debug, Clone, Default)]
pub struct StateCalculator {
    overrides: CadencyOverrides,
}

impl StateCalculator {
    pub fn new(overrides: CadencyOverrides) -> Self {
        Self { overrides }
    }

    /// Resolves the site's cadency for the moment's hour
    pub fn resolve_cadency(
        &self,
        site: &str,
        default_seconds: u64,
        moment: &Moment,
    ) -> Result<(u64, String), CadencyError> {
        resolve_cadency(&self.overrides, site, default_seconds, moment.hour)
    }

    /// Computes the regular wait from cadency and last execution
    ///
    /// A site with failed keywords is retried on a shorter fixed cadency.
    pub fn compute_standard_wait(
        &self,
        site: &SiteConfig,
        state: &SiteRuntimeState,
        moment: &Moment,
    ) -> Result<StandardWait, CadencyError> {
        let (cadency_secs, label) = if state.failed_keywords.is_empty() {
            self.resolve_cadency(&site.name, site.cadency, moment)?
        } else {
            (
                RETRY_CADENCY_SECS,
                format!("Retry({})", state.failed_keywords.len()),
            )
        };

        let remaining_secs = match state.last_execution {
            Some(last) => {
                let elapsed = moment.elapsed_since(last);
                (cadency_secs as i64 - elapsed).max(0)
            }
            None => 0,
        };

        Ok(StandardWait {
            cadency_secs,
            label,
            remaining_secs,
        })
    }

    /// Evaluates one site
    ///
    /// # Arguments
    ///
    /// * `site` - The site's configuration
    /// * `state` - The site's persisted runtime state
    /// * `moment` - The instant to decide for
    /// * `starting_at` - The starting-at target, while that mode is active
    ///
    /// # Returns
    ///
    /// * `Ok(Decision)` - How long until the site is due, and why
    /// * `Err(CadencyError)` - A cadency override for this site is malformed
    pub fn decide(
        &self,
        site: &SiteConfig,
        state: &SiteRuntimeState,
        moment: &Moment,
        starting_at: Option<&str>,
    ) -> Result<Decision, CadencyError> {
        let mut decision = match compute_error_penalty(state, moment.now) {
            Some(penalty) => Decision {
                seconds_remaining: penalty.remaining_secs,
                status: SiteStatus::ErrorWait,
                display: humanize(penalty.remaining_secs),
                cadency_label: SiteStatus::ErrorWait.to_string(),
                cadency_duration: humanize(penalty.cooldown_secs),
            },
            None => {
                let wait = self.compute_standard_wait(site, state, moment)?;
                let status = if wait.remaining_secs <= 0 {
                    SiteStatus::Ready
                } else {
                    SiteStatus::Pending
                };
                Decision {
                    seconds_remaining: wait.remaining_secs,
                    status,
                    display: humanize(wait.remaining_secs),
                    cadency_label: wait.label,
                    cadency_duration: humanize(wait.cadency_secs as i64),
                }
            }
        };

        if let Some(target) = starting_at {
            if site.name == target {
                decision.seconds_remaining = 0;
                decision.status = SiteStatus::StartingTarget;
                decision.display = humanize(0);
            } else {
                decision.seconds_remaining = SKIPPED_SENTINEL;
                decision.status = SiteStatus::SkippedStart;
                decision.display = "deferred".to_string();
            }
        }

        Ok(decision)
    }
}

/// Formats seconds as `1h 05m`, `4m 10s`, `12s` or `now`
pub fn humanize(seconds: i64) -> String {
    if seconds <= 0 {
        return "now".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
