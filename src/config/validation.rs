use crate::config::types::{Config, CrawlerConfig, OutputConfig, SiteConfig, UserAgentConfig};
use crate::sites::LISTING_KIND;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
///
/// Hour ranges inside cadency override keys are deliberately not checked
/// here; they are parsed when a site's cadency is resolved.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_sites(&config.sites)?;
    validate_override_prefixes(config)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be >= 1s, got {}s",
            config.request_timeout
        )));
    }
    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_sites(sites: &[SiteConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for site in sites {
        validate_site_name(&site.name)?;

        if !seen.insert(site.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Site '{}' is configured more than once",
                site.name
            )));
        }

        if site.cadency < 1 {
            return Err(ConfigError::Validation(format!(
                "Site '{}': cadency must be >= 1 second",
                site.name
            )));
        }

        if site.max_pages < 1 {
            return Err(ConfigError::Validation(format!(
                "Site '{}': max-pages must be >= 1",
                site.name
            )));
        }

        if site.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "Site '{}': keywords cannot be blank",
                site.name
            )));
        }

        if site.kind() == LISTING_KIND {
            validate_listing_site(site)?;
        }
    }

    Ok(())
}

/// Site names double as state-file keys and override prefixes
fn validate_site_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "Site name cannot be empty".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "Site name '{}' must contain only ASCII letters, digits, '-' or '_'",
            name
        )));
    }

    Ok(())
}

fn validate_listing_site(site: &SiteConfig) -> Result<(), ConfigError> {
    let template = site.search_url.as_deref().ok_or_else(|| {
        ConfigError::Validation(format!("Site '{}': search-url is required", site.name))
    })?;

    if !template.contains("{keyword}") {
        return Err(ConfigError::Validation(format!(
            "Site '{}': search-url must contain a {{keyword}} placeholder",
            site.name
        )));
    }

    let probe = template.replace("{keyword}", "probe").replace("{page}", "1");
    Url::parse(&probe).map_err(|e| {
        ConfigError::InvalidUrl(format!("Site '{}': invalid search-url: {}", site.name, e))
    })?;

    if let Some(login) = &site.login_url {
        Url::parse(login).map_err(|e| {
            ConfigError::InvalidUrl(format!("Site '{}': invalid login-url: {}", site.name, e))
        })?;
    }

    let selectors = site.selectors.as_ref().ok_or_else(|| {
        ConfigError::Validation(format!(
            "Site '{}': a [site.selectors] table is required",
            site.name
        ))
    })?;

    for (label, value) in [
        ("posting", &selectors.posting),
        ("title", &selectors.title),
        ("company", &selectors.company),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Site '{}': selector '{}' cannot be empty",
                site.name, label
            )));
        }
    }

    Ok(())
}

/// Every override must belong to a configured site
fn validate_override_prefixes(config: &Config) -> Result<(), ConfigError> {
    for prefix in config.cadency_overrides.prefixes() {
        if config.site(prefix).is_none() {
            return Err(ConfigError::Validation(format!(
                "Cadency override refers to unknown site '{}'",
                prefix
            )));
        }
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
