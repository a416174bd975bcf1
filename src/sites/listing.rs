//! HTML job-board crawler
//!
//! Fetches a search URL per keyword and page, and extracts postings with the
//! CSS selectors from the site's configuration. A page without postings ends
//! the keyword.

use crate::config::{Config, SelectorConfig, SiteConfig, UserAgentConfig};
use crate::executor::{SearchPage, SiteCrawler};
use crate::storage::NewJob;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

/// Builds the HTTP client used by listing crawlers
///
/// The user agent follows `CrawlerName/Version (+ContactURL; ContactEmail)`.
pub fn build_http_client(
    config: &UserAgentConfig,
    request_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(request_timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Selectors compiled once per crawler
#[derive(Debug, Clone)]
struct Selectors {
    posting: Selector,
    id_attribute: Option<String>,
    title: Selector,
    company: Selector,
    location: Option<Selector>,
    salary: Option<Selector>,
    description: Option<Selector>,
    link: Option<Selector>,
}

fn compile(selector: &str) -> anyhow::Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector '{}': {:?}", selector, e))
}

fn compile_opt(selector: &Option<String>) -> anyhow::Result<Option<Selector>> {
    selector.as_deref().map(compile).transpose()
}

impl Selectors {
    fn new(config: &SelectorConfig) -> anyhow::Result<Self> {
        Ok(Self {
            posting: compile(&config.posting)?,
            id_attribute: config.id_attribute.clone(),
            title: compile(&config.title)?,
            company: compile(&config.company)?,
            location: compile_opt(&config.location)?,
            salary: compile_opt(&config.salary)?,
            description: compile_opt(&config.description)?,
            link: compile_opt(&config.link)?,
        })
    }
}

/// Crawls a configurable HTML job board
pub struct ListingCrawler {
    site: String,
    client: Client,
    search_url: String,
    login_url: Option<Url>,
    selectors: Selectors,
}

impl ListingCrawler {
    pub fn from_config(site: &SiteConfig, config: &Config) -> anyhow::Result<Self> {
        let search_url = site
            .search_url
            .clone()
            .ok_or_else(|| anyhow!("site '{}' has no search-url", site.name))?;
        let selectors = site
            .selectors
            .as_ref()
            .ok_or_else(|| anyhow!("site '{}' has no selectors", site.name))?;
        let login_url = site
            .login_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("invalid login-url")?;

        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout),
        )?;

        Ok(Self {
            site: site.name.clone(),
            client,
            search_url,
            login_url,
            selectors: Selectors::new(selectors)?,
        })
    }

    /// Fills the search URL template for one keyword and page
    pub fn search_url(&self, keyword: &str, page: u32) -> anyhow::Result<Url> {
        let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
        let filled = self
            .search_url
            .replace("{keyword}", &encoded)
            .replace("{page}", &page.to_string());
        Url::parse(&filled).with_context(|| format!("invalid search URL '{}'", filled))
    }

    async fn fetch(&self, url: &Url) -> anyhow::Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {}", url))?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl SiteCrawler for ListingCrawler {
    async fn login(&mut self) -> anyhow::Result<bool> {
        let Some(url) = self.login_url.clone() else {
            return Ok(true);
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("{}: login page answered {}", self.site, status);
        }
        Ok(status.is_success())
    }

    async fn search(&mut self, keyword: &str, page: u32) -> anyhow::Result<SearchPage> {
        let url = self.search_url(keyword, page)?;
        tracing::debug!("{}: fetching {}", self.site, url);

        let body = self.fetch(&url).await?;
        let postings = parse_listing(&body, &url, &self.selectors);

        Ok(SearchPage {
            has_more: !postings.is_empty(),
            postings,
        })
    }
}

/// Extracts postings from a result page
///
/// Postings are returned as scraped; the caller validates them. The posting
/// id comes from the configured attribute, falling back to the detail link.
fn parse_listing(html: &str, page_url: &Url, selectors: &Selectors) -> Vec<NewJob> {
    let document = Html::parse_document(html);

    document
        .select(&selectors.posting)
        .map(|element| {
            let link = selectors
                .link
                .as_ref()
                .and_then(|s| element.select(s).next())
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| page_url.join(href).ok())
                .map(|u| u.to_string());

            let external_id = selectors
                .id_attribute
                .as_deref()
                .and_then(|attr| element.value().attr(attr))
                .map(|id| id.trim().to_string())
                .or_else(|| link.clone())
                .unwrap_or_default();

            NewJob {
                site: String::new(),
                external_id,
                title: text_of(&element, &selectors.title).unwrap_or_default(),
                company: text_of(&element, &selectors.company).unwrap_or_default(),
                location: selectors.location.as_ref().and_then(|s| text_of(&element, s)),
                salary: selectors.salary.as_ref().and_then(|s| text_of(&element, s)),
                url: link,
                description: selectors
                    .description
                    .as_ref()
                    .and_then(|s| text_of(&element, s)),
                keyword: None,
            }
        })
        .collect()
}

/// Whitespace-normalized text of the first match, if not blank
fn text_of(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|e| e.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
}
