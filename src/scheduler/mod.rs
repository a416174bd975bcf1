//! Scheduler module: when each site runs
//!
//! # Components
//!
//! - `cadency`: time-of-day override parsing and resolution
//! - `StateCalculator`: pure due/wait decisions per site
//! - `Scheduler`: the control loop and explicit-run mode
//! - `report`: the status table

pub mod cadency;
mod calculator;
mod report;
mod runner;

pub use calculator::{
    compute_error_penalty, humanize, Decision, ErrorPenalty, Moment, SiteStatus, StandardWait,
    StateCalculator, ERROR_COOLDOWN_SECS, RETRY_CADENCY_SECS, SKIPPED_SENTINEL,
};
pub use report::{format_status_table, print_status_table, StatusRow};
pub use runner::Scheduler;
