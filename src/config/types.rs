use serde::Deserialize;

/// Main configuration structure for Job-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteConfig>,
    #[serde(default, rename = "cadency-overrides")]
    pub cadency_overrides: CadencyOverrides,
}

impl Config {
    /// Looks up a configured site by name
    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.name == name)
    }
}

/// Scheduler loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Path to the JSON file holding per-site runtime state
    #[serde(rename = "state-path", default = "default_state_path")]
    pub state_path: String,

    /// Re-run preload before every execution, for every site
    #[serde(rename = "fresh-session-each-run", default)]
    pub fresh_session_each_run: bool,

    /// How long a second Ctrl+C may take to abort the whole loop (milliseconds)
    #[serde(rename = "interrupt-grace-ms", default = "default_interrupt_grace_ms")]
    pub interrupt_grace_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            fresh_session_each_run: false,
            interrupt_grace_ms: default_interrupt_grace_ms(),
        }
    }
}

fn default_state_path() -> String {
    "./harvest_state.json".to_string()
}

fn default_interrupt_grace_ms() -> u64 {
    3000
}

/// Politeness settings shared by every site crawler
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Minimum time between two page fetches on the same site (milliseconds)
    #[serde(rename = "minimum-time-on-page", default = "default_minimum_time_on_page")]
    pub minimum_time_on_page: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            minimum_time_on_page: default_minimum_time_on_page(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_minimum_time_on_page() -> u64 {
    1500
}

fn default_request_timeout() -> u64 {
    30
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file holding postings
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// One harvested site
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub name: String,

    /// Registry key of the implementation; defaults to the site name
    #[serde(default)]
    pub kind: Option<String>,

    /// Default cadency in seconds
    pub cadency: u64,

    #[serde(rename = "close-session-after-run", default)]
    pub close_session_after_run: bool,

    #[serde(rename = "ignore-autoscheduling", default)]
    pub ignore_autoscheduling: bool,

    #[serde(rename = "wait-before-first-run", default)]
    pub wait_before_first_run: bool,

    /// Search terms, crawled in this order
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Search URL template with `{keyword}` and `{page}` placeholders
    #[serde(rename = "search-url", default)]
    pub search_url: Option<String>,

    /// Page fetched once during preload to open the session
    #[serde(rename = "login-url", default)]
    pub login_url: Option<String>,

    #[serde(default)]
    pub selectors: Option<SelectorConfig>,
}

impl SiteConfig {
    /// The registry key used to build this site's implementation
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.name)
    }
}

fn default_max_pages() -> u32 {
    5
}

/// CSS selectors used by the listing crawler
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Selects one element per posting
    pub posting: String,

    /// Attribute on the posting element holding the site's posting id
    #[serde(rename = "id-attribute", default)]
    pub id_attribute: Option<String>,

    pub title: String,
    pub company: String,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub salary: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Selects the `<a>` pointing to the posting detail page
    #[serde(default)]
    pub link: Option<String>,
}

/// Time-of-day cadency overrides, in declaration order
///
/// Keys are `"<site>.H1-H2"`, values are duration strings such as `"30m"`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "toml::Table")]
pub struct CadencyOverrides {
    entries: Vec<(String, String)>,
}

impl CadencyOverrides {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// Returns the `(hour range, duration)` pairs for one site, in declaration order
    pub fn for_site<'a>(&'a self, site: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.entries.iter().filter_map(move |(key, value)| {
            key.strip_prefix(site)
                .and_then(|rest| rest.strip_prefix('.'))
                .map(|range| (range, value.as_str()))
        })
    }

    /// Site prefixes referenced by the override keys
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .map(|(key, _)| key.split_once('.').map(|(site, _)| site).unwrap_or(key))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl TryFrom<toml::Table> for CadencyOverrides {
    type Error = String;

    fn try_from(table: toml::Table) -> Result<Self, Self::Error> {
        let mut entries = Vec::with_capacity(table.len());
        for (key, value) in table {
            match value {
                toml::Value::String(s) => entries.push((key, s)),
                toml::Value::Integer(secs) => entries.push((key, secs.to_string())),
                other => {
                    return Err(format!(
                        "cadency override '{}' must be a duration string, got {}",
                        key,
                        other.type_str()
                    ))
                }
            }
        }
        Ok(Self { entries })
    }
}
