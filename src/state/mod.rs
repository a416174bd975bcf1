//! State module for resumable per-site crawl progress
//!
//! # Components
//!
//! - `SiteRuntimeState`: the persisted record for one site
//! - `PersistenceStore`: the JSON file holding every site's record
//! - `ResumeCursor`: transient snapshot used to skip already-crawled keywords

mod resume;
mod site_state;
mod store;

pub use resume::ResumeCursor;
pub use site_state::SiteRuntimeState;
pub use store::{PersistenceStore, StateError};
