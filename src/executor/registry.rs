//! Name → implementation registry for sites

use crate::config::{Config, SiteConfig};
use crate::executor::site::{KeywordSite, Site};
use crate::sites::{ListingCrawler, LISTING_KIND};
use crate::HarvestError;
use std::collections::HashMap;
use std::time::Duration;

/// Builds a site from its configuration
pub type SiteFactory =
    Box<dyn Fn(&SiteConfig, &Config) -> anyhow::Result<Box<dyn Site>> + Send + Sync>;

/// Maps implementation names (`kind`) to site factories
#[derive(Default)]
pub struct SiteRegistry {
    factories: HashMap<String, SiteFactory>,
}

impl SiteRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the implementations shipped in this crate
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(LISTING_KIND, |site, config| {
            let crawler = ListingCrawler::from_config(site, config)?;
            let delay = Duration::from_millis(config.crawler.minimum_time_on_page);
            Ok(Box::new(KeywordSite::new(site, crawler, delay)) as Box<dyn Site>)
        });
        registry
    }

    /// Registers (or replaces) the factory for `kind`
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&SiteConfig, &Config) -> anyhow::Result<Box<dyn Site>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered implementation names, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Builds the implementation for one configured site
    pub fn build(&self, site: &SiteConfig, config: &Config) -> Result<Box<dyn Site>, HarvestError> {
        let factory =
            self.factories
                .get(site.kind())
                .ok_or_else(|| HarvestError::UnknownImplementation {
                    site: site.name.clone(),
                    kind: site.kind().to_string(),
                })?;

        factory(site, config).map_err(|e| HarvestError::SiteSetup {
            site: site.name.clone(),
            message: format!("{:#}", e),
        })
    }
}
