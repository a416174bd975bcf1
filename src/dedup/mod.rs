//! Duplicate posting reconciliation
//!
//! The same posting often shows up again under another keyword or on another
//! site. After every insert the crawl routine runs a [`DedupMerger`] pass which
//! collapses each `(title, company)` group into its lowest-id row.

mod merger;

pub use merger::{plan_merge, DedupMerger, MergeField, MergeReport, MergedRecord};
