//! Configuration module for Job-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use job_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvester.toml")).unwrap();
//! for site in &config.sites {
//!     println!("{} every {}s", site.name, site.cadency);
//! }
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    CadencyOverrides, Config, CrawlerConfig, OutputConfig, SchedulerConfig, SelectorConfig,
    SiteConfig, UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
