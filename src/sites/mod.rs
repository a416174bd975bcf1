//! Site implementations shipped with the crate
//!
//! Sites driven by browser automation live outside this crate and are added
//! with [`crate::SiteRegistry::register`].

mod listing;

pub use listing::{build_http_client, ListingCrawler};

/// Registry key of the HTML listing crawler
pub const LISTING_KIND: &str = "listing";
