//! Shared helpers for the integration tests

use async_trait::async_trait;
use job_harvester::config::{
    CadencyOverrides, Config, CrawlerConfig, OutputConfig, SchedulerConfig, SiteConfig,
    UserAgentConfig,
};
use job_harvester::executor::{CrawlContext, Site, SiteRegistry};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Creates a test configuration writing its state and database into `dir`
pub fn create_test_config(sites: Vec<SiteConfig>, dir: &Path) -> Config {
    Config {
        scheduler: SchedulerConfig {
            state_path: dir.join("state.json").display().to_string(),
            fresh_session_each_run: false,
            interrupt_grace_ms: 3000,
        },
        crawler: CrawlerConfig {
            minimum_time_on_page: 0,
            request_timeout: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: dir.join("jobs.db").display().to_string(),
        },
        sites,
        cadency_overrides: CadencyOverrides::default(),
    }
}

/// A site of the scripted `fake` kind
pub fn fake_site(name: &str, cadency: u64) -> SiteConfig {
    SiteConfig {
        name: name.to_string(),
        kind: Some("fake".to_string()),
        cadency,
        close_session_after_run: false,
        ignore_autoscheduling: false,
        wait_before_first_run: false,
        keywords: vec![],
        max_pages: 1,
        search_url: None,
        login_url: None,
        selectors: None,
    }
}

/// What a fake site's phase does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Succeed,
    Fail,
    /// Never completes; only an interrupt ends it
    Hang,
}

/// Shared log of every phase any fake site ran, as `"<site>:<phase>"`
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct FakeSite {
    name: String,
    preload: Behaviour,
    crawl: Behaviour,
    log: CallLog,
}

async fn act(behaviour: Behaviour, what: &str) -> anyhow::Result<()> {
    match behaviour {
        Behaviour::Succeed => Ok(()),
        Behaviour::Fail => anyhow::bail!("{} failed", what),
        Behaviour::Hang => {
            std::future::pending::<()>().await;
            Ok(())
        }
    }
}

#[async_trait]
impl Site for FakeSite {
    fn name(&self) -> &str {
        &self.name
    }

    async fn preload(&mut self) -> anyhow::Result<()> {
        self.log.push(format!("{}:preload", self.name));
        act(self.preload, "preload").await
    }

    async fn crawl(&mut self, _ctx: &mut CrawlContext<'_>) -> anyhow::Result<()> {
        self.log.push(format!("{}:crawl", self.name));
        act(self.crawl, "crawl").await
    }

    async fn close_session(&mut self) {
        self.log.push(format!("{}:close", self.name));
    }
}

/// Registry whose `fake` kind follows `script` (site → preload, crawl);
/// unscripted sites succeed
pub fn fake_registry(script: HashMap<String, (Behaviour, Behaviour)>, log: &CallLog) -> SiteRegistry {
    let log = log.clone();
    let mut registry = SiteRegistry::new();
    registry.register("fake", move |site, _config| {
        let (preload, crawl) = script
            .get(&site.name)
            .copied()
            .unwrap_or((Behaviour::Succeed, Behaviour::Succeed));
        Ok(Box::new(FakeSite {
            name: site.name.clone(),
            preload,
            crawl,
            log: log.clone(),
        }) as Box<dyn Site>)
    });
    registry
}
