//!
//! src/scrape.rs  Andrew Belles  Oct 16th, 2026
//!
//! Discovers the public api client id by walking the site's html and
//! the script bundles it links, applying an ordered pattern table
//!

use std::collections::HashSet;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{ScrapeConfig, SiteConfig};
use crate::errors::ScdlError;
use crate::types::Credential;

/// Where the token has been seen across site deployments, tried in order.
/// New layouts only need a row here
pub const CLIENT_ID_PATTERNS: &[(&str, &str)] = &[
    ("js-property", r#"client_id\s*:\s*"([0-9a-zA-Z]{32})""#),
    ("js-assign",   r#"client_id\s*=\s*"([0-9a-zA-Z]{32})""#),
    ("json-key",    r#""client_id"\s*:\s*"([0-9a-zA-Z]{32})""#),
    ("query-param", r#"client_id=([0-9a-zA-Z]{32})"#),
];

pub struct PatternSet {
    patterns: Vec<(&'static str, Regex)>
}

impl PatternSet {
    pub fn compile(table: &[(&'static str, &str)]) -> Result<Self, ScdlError> {
        let patterns = table.iter()
            .map(|(name, pattern)| {
                Regex::new(pattern)
                    .map(|re| (*name, re))
                    .map_err(|e| ScdlError::Config(format!("pattern {name}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok( Self { patterns } )
    }

    /// First pattern (in table order) that matches anywhere in text
    pub fn find(&self, text: &str) -> Option<(&'static str, Credential)> {
        self.patterns.iter().find_map(|(name, re)| {
            re.captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| (*name, Credential::new(m.as_str())))
        })
    }
}

/// Every `<script src>` on a page, resolved against base.
/// Handles `//host/x.js`, absolute, and root-relative sources
pub fn script_sources(html: &str, base: &Url) -> Result<Vec<Url>, ScdlError> {
    let selector = Selector::parse("script[src]")
        .map_err(|e| ScdlError::Parse(format!("script selector: {e:?}")))?;
    let document = Html::parse_document(html);

    let urls = document.select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .filter_map(|src| match base.join(src.trim()) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!(src, error = %e, "scrape.script.skip");
                None
            }
        })
        .collect();
    Ok(urls)
}

/// Drops repeats, first occurrence wins
pub fn dedupe(urls: Vec<Url>) -> Vec<Url> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// A candidate client id, not yet validated
    async fn scrape(&self) -> Result<Credential, ScdlError>;
}

pub struct SiteScraper {
    http: Client,
    home: Url,
    secondary_pages: Vec<String>,
    max_scripts: usize,
    patterns: PatternSet
}

impl SiteScraper {
    pub fn new(http: Client, site: &SiteConfig, scrape: &ScrapeConfig) ->
        Result<Self, ScdlError> {
        Ok( Self {
            http,
            home: site.home_url.clone(),
            secondary_pages: scrape.secondary_pages.clone(),
            max_scripts: scrape.max_scripts,
            patterns: PatternSet::compile(CLIENT_ID_PATTERNS)?
        })
    }

    async fn fetch_page(&self, url: &Url) -> Result<String, ScdlError> {
        let response = self.http.get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        Ok( response.text().await? )
    }

    /// Root page scripts followed by those of the secondary pages.
    /// Secondary pages are optional, failures there only get logged
    async fn candidate_scripts(&self, root_html: &str) -> Result<Vec<Url>, ScdlError> {
        let mut scripts = script_sources(root_html, &self.home)?;

        for page in &self.secondary_pages {
            let url = match self.home.join(page) {
                Ok(url) => url,
                Err(e) => {
                    warn!(page = %page, error = %e, "scrape.page.invalid");
                    continue;
                }
            };
            match self.fetch_page(&url).await {
                Ok(html) => match script_sources(&html, &self.home) {
                    Ok(more) => scripts.extend(more),
                    Err(e) => debug!(url = %url, error = %e, "scrape.page.parse"),
                },
                Err(e) => debug!(url = %url, error = %e, "scrape.page.skip"),
            }
        }

        Ok( dedupe(scripts) )
    }
}

#[async_trait]
impl CredentialSource for SiteScraper {
    async fn scrape(&self) -> Result<Credential, ScdlError> {
        info!(home = %self.home, "scrape.start");
        let html = self.fetch_page(&self.home).await?;

        if let Some((pattern, credential)) = self.patterns.find(&html) {
            info!(pattern, source = "html", "scrape.found");
            return Ok(credential);
        }

        let scripts = self.candidate_scripts(&html).await?;
        let limit = scripts.len().min(self.max_scripts);

        for (i, script) in scripts.iter().take(limit).enumerate() {
            debug!(index = i + 1, of = limit, url = %script, "scrape.script");
            let code = match self.fetch_page(script).await {
                Ok(code) if !code.is_empty() => code,
                Ok(_) => continue,
                Err(e) => {
                    debug!(url = %script, error = %e, "scrape.script.skip");
                    continue;
                }
            };
            if let Some((pattern, credential)) = self.patterns.find(&code) {
                info!(pattern, source = %script, "scrape.found");
                return Ok(credential);
            }
        }

        warn!(scripts = limit, "scrape.exhausted");
        Err(ScdlError::CredentialNotFound)
    }
}
