//! Site capability traits and the generic keyword crawl routine

use crate::config::SiteConfig;
use crate::dedup::DedupMerger;
use crate::state::PersistenceStore;
use crate::storage::{JobStore, NewJob};
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;

/// Mutable collaborators handed to a site for one crawl
pub struct CrawlContext<'a> {
    pub state: &'a mut PersistenceStore,
    pub jobs: &'a mut dyn JobStore,
    pub merger: &'a DedupMerger,
}

/// A harvestable site, as driven by the executor
#[async_trait]
pub trait Site: Send {
    fn name(&self) -> &str;

    /// Warms up the session (login, consent pages, cookies)
    async fn preload(&mut self) -> anyhow::Result<()>;

    /// Runs one full crawl pass
    async fn crawl(&mut self, ctx: &mut CrawlContext<'_>) -> anyhow::Result<()>;

    /// Tears down the session; the next run preloads again
    async fn close_session(&mut self);
}

/// One page of search results
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub postings: Vec<NewJob>,
    /// False once the site has no further result pages for the keyword
    pub has_more: bool,
}

/// Page navigation for one site
///
/// Implementations only fetch and extract. Cursor bookkeeping, storage and
/// dedup are done by [`KeywordSite`].
#[async_trait]
pub trait SiteCrawler: Send {
    /// Returns `Ok(false)` when the site rejected the login
    async fn login(&mut self) -> anyhow::Result<bool>;

    async fn search(&mut self, keyword: &str, page: u32) -> anyhow::Result<SearchPage>;

    async fn close(&mut self) {}
}

/// Counters for one keyword
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeywordStats {
    pub pages: u32,
    pub inserted: u32,
    pub already_stored: u32,
    pub invalid: u32,
}

/// Adapts a [`SiteCrawler`] into a [`Site`] running the keyword × page loop
pub struct KeywordSite<C> {
    name: String,
    keywords: Vec<String>,
    max_pages: u32,
    page_delay: Duration,
    crawler: C,
}

impl<C: SiteCrawler> KeywordSite<C> {
    pub fn new(site: &SiteConfig, crawler: C, page_delay: Duration) -> Self {
        Self {
            name: site.name.clone(),
            keywords: site.keywords.clone(),
            max_pages: site.max_pages.max(1),
            page_delay,
            crawler,
        }
    }

    pub fn crawler(&self) -> &C {
        &self.crawler
    }

    async fn crawl_keyword(
        &mut self,
        ctx: &mut CrawlContext<'_>,
        keyword: &str,
        start_page: u32,
    ) -> anyhow::Result<KeywordStats> {
        let mut stats = KeywordStats::default();
        let mut page = start_page.max(1);

        while page <= self.max_pages {
            ctx.state.update(&self.name, keyword, page);

            let results = self
                .crawler
                .search(keyword, page)
                .await
                .with_context(|| format!("keyword '{}' page {}", keyword, page))?;
            stats.pages += 1;

            for posting in results.postings {
                self.store_posting(ctx, keyword, posting, &mut stats)?;
            }

            if !results.has_more {
                break;
            }
            page += 1;
            if page <= self.max_pages {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        Ok(stats)
    }

    fn store_posting(
        &self,
        ctx: &mut CrawlContext<'_>,
        keyword: &str,
        mut posting: NewJob,
        stats: &mut KeywordStats,
    ) -> anyhow::Result<()> {
        posting.site = self.name.clone();
        if posting.keyword.is_none() {
            posting.keyword = Some(keyword.to_string());
        }

        if let Err(reason) = posting.validate() {
            tracing::warn!("Skipping invalid posting on {}: {}", self.name, reason);
            stats.invalid += 1;
            return Ok(());
        }

        if ctx.jobs.exists(&self.name, &posting.external_id)? {
            stats.already_stored += 1;
            return Ok(());
        }

        let id = ctx.jobs.insert(&posting)?;
        tracing::debug!("Stored posting #{} '{}' from {}", id, posting.title, self.name);
        stats.inserted += 1;

        ctx.merger.merge_duplicates(&mut *ctx.jobs)?;
        Ok(())
    }
}

#[async_trait]
impl<C: SiteCrawler> Site for KeywordSite<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn preload(&mut self) -> anyhow::Result<()> {
        if self.crawler.login().await? {
            Ok(())
        } else {
            anyhow::bail!("login to {} was rejected", self.name)
        }
    }

    async fn crawl(&mut self, ctx: &mut CrawlContext<'_>) -> anyhow::Result<()> {
        let keywords = self.keywords.clone();

        for keyword in &keywords {
            let (skip, start_page) = ctx.state.should_skip(&self.name, keyword);
            if skip {
                tracing::debug!("{}: skipping '{}' (already crawled)", self.name, keyword);
                continue;
            }

            match self.crawl_keyword(ctx, keyword, start_page).await {
                Ok(stats) => {
                    tracing::info!(
                        "{}: '{}' done, {} pages, {} new, {} known, {} invalid",
                        self.name,
                        keyword,
                        stats.pages,
                        stats.inserted,
                        stats.already_stored,
                        stats.invalid
                    );
                    ctx.state.remove_failed_keyword(&self.name, keyword);
                }
                Err(e) => {
                    tracing::warn!("{}: {:#}", self.name, e);
                    ctx.state.add_failed_keyword(&self.name, keyword);
                }
            }
        }

        ctx.state.finalize(&self.name);
        ctx.state.finish_resume(&self.name);
        Ok(())
    }

    async fn close_session(&mut self) {
        self.crawler.close().await;
    }
}
