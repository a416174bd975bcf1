//! Executor module for running individual sites
//!
//! # Components
//!
//! - `Site` / `SiteCrawler`: capability traits implemented per site
//! - `KeywordSite`: the keyword × page crawl routine shared by all crawlers
//! - `SiteRegistry`: maps a site's `kind` to the code that builds it
//! - `SiteExecutor`: the Preload / Execute protocol around one site
//! - `SessionPool`: the single automation-session slot
//! - `CancelToken`: counted Ctrl+C cancellation

mod cancel;
mod registry;
mod runner;
mod session;
mod site;

pub use cancel::CancelToken;
pub use registry::{SiteFactory, SiteRegistry};
pub use runner::{Outcome, SiteExecutor};
pub use session::{SessionPool, SessionSlot};
pub use site::{CrawlContext, KeywordSite, KeywordStats, SearchPage, Site, SiteCrawler};
