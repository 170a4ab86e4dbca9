use url::Url;
use std::{path::PathBuf, str::FromStr, time};
use crate::errors::ScdlError;

/// Constants for Site Config
pub const HOME_URL: &str = "https://soundcloud.com/";
pub const API_BASE: &str = "https://api-v2.soundcloud.com/";
pub const SHORTLINK_URL: &str = "https://on.soundcloud.com/";
pub const LANDING_DOMAIN: &str = "soundcloud.com";
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Constants for HTTP Config
pub const HTTP_API_TIMEOUT: u64 = 20000;
pub const HTTP_PAGE_TIMEOUT: u64 = 15000;
pub const HTTP_SHORTLINK_TIMEOUT: u64 = 10000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 5000;
pub const HTTP_MAX_REDIRECTS: u8 = 5;

/// Constants for Scrape Config
pub const SECONDARY_PAGES: [&str; 2] = ["discover", "charts/top"];
pub const SCRAPE_MAX_SCRIPTS: usize = 20;
pub const SCRAPE_RETRY_DELAY: u64 = 500;

/// Constants for Download Config
pub const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;
pub const DOWNLOAD_PROGRESS_INTERVAL: u64 = 500;

pub const TOKEN_CACHE_FILE: &str = ".soundcloud_client_id";

/// Wrapper over env::var that treats blank values as unset
fn env_opt(s: &str) -> Option<String> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Parses an env var, falling back to default on absence or garbage
fn env_or<T: FromStr>(s: &str, default: T) -> T {
    env_opt(s)
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

fn parse_site_url(var: &str, default: &str, host: &str) -> Result<Url, ScdlError> {
    let raw = env_opt(var).unwrap_or_else(|| default.to_string());
    let mut url = Url::parse(&raw)
        .map_err(|e| ScdlError::Config(format!("{var} invalid {e}")))?;

    ensure_https(&url).map_err(ScdlError::Config)?;
    ensure_host(&url, host).map_err(ScdlError::Config)?;
    ensure_trailing_slash(&mut url);
    Ok(url)
}

///
/// Configuration for the public site and the versioned json api
///
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub home_url: Url,       // https://soundcloud.com/
    pub api_base: Url,       // https://api-v2.soundcloud.com/
    pub user_agent: String,  // browser-like, site refuses bare clients
    pub shortlink_url: Url,  // https://on.soundcloud.com/
    pub landing_domain: String,
}

fn build_site() -> Result<SiteConfig, ScdlError> {
    let home_url = parse_site_url("SC_HOME_URL", HOME_URL, "soundcloud.com")?;
    let api_base = parse_site_url("SC_API_BASE", API_BASE, "api-v2.soundcloud.com")?;
    let user_agent = env_opt("SC_USER_AGENT")
        .unwrap_or_else(|| USER_AGENT.to_string());

    let shortlink_url = parse_site_url("SC_SHORTLINK_URL", SHORTLINK_URL, "on.soundcloud.com")?;

    Ok( SiteConfig {
        home_url,
        api_base,
        user_agent,
        shortlink_url,
        landing_domain: LANDING_DOMAIN.to_string()
    })
}

///
/// Configuration for Http timeouts, redirects, etc.
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub api_timeout: time::Duration,
    pub page_timeout: time::Duration,
    pub shortlink_timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub max_redirects: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_timeout: time::Duration::from_millis(HTTP_API_TIMEOUT),
            page_timeout: time::Duration::from_millis(HTTP_PAGE_TIMEOUT),
            shortlink_timeout: time::Duration::from_millis(HTTP_SHORTLINK_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
        }
    }
}

///
/// Configuration for client id discovery
///
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub secondary_pages: Vec<String>,  // relative to home_url
    pub max_scripts: usize,            // bundles inspected per scrape
    pub retry_delay: time::Duration,   // pause before the second scrape
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            secondary_pages: SECONDARY_PAGES.iter().map(|p| p.to_string()).collect(),
            max_scripts: SCRAPE_MAX_SCRIPTS,
            retry_delay: time::Duration::from_millis(SCRAPE_RETRY_DELAY),
        }
    }
}

fn build_scrape() -> ScrapeConfig {
    let defaults = ScrapeConfig::default();

    let secondary_pages = match env_opt("SC_SECONDARY_PAGES") {
        Some(v) => v.split(',')
            .map(|p| p.trim().trim_start_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        None => defaults.secondary_pages,
    };

    ScrapeConfig {
        secondary_pages,
        max_scripts: env_or("SC_MAX_SCRIPTS", defaults.max_scripts),
        retry_delay: defaults.retry_delay,
    }
}

///
/// Location of the cached client id
///
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub token_path: PathBuf
}

/// Explicit override, else the user's home, else the working directory
fn cache_path(override_path: Option<String>, home: Option<PathBuf>) -> PathBuf {
    match (override_path, home) {
        (Some(path), _) => PathBuf::from(path),
        (None, Some(home)) => home.join(TOKEN_CACHE_FILE),
        (None, None) => PathBuf::from(TOKEN_CACHE_FILE),
    }
}

fn build_cache() -> CacheConfig {
    let token_path = cache_path(env_opt("SC_TOKEN_CACHE"), dirs::home_dir());
    CacheConfig { token_path }
}

///
/// Configuration for where and how files are written
///
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub chunk_size: usize,
    pub progress_interval: time::Duration,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            chunk_size: DOWNLOAD_CHUNK_SIZE,
            progress_interval: time::Duration::from_millis(DOWNLOAD_PROGRESS_INTERVAL),
        }
    }
}

fn build_output() -> OutputConfig {
    let mut output = OutputConfig::default();
    if let Some(dir) = env_opt("SC_OUTPUT_DIR") {
        output.dir = PathBuf::from(dir);
    }
    output
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json"   => Ok(LogFormat::Json),
            other    => Err(format!("unknown log format {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "warn,sc_dl=info,reqwest=warn".to_string(),
            format: LogFormat::Pretty,
            with_ansi: true,
            include_file_line: false,
            include_target: false,
        }
    }
}

fn build_logging() -> LoggingConfig {
    let defaults = LoggingConfig::default();
    LoggingConfig {
        format: env_or("SC_LOG_FORMAT", defaults.format),
        ..defaults
    }
}

///
/// AppConfig which holds everything the components are built from
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub http: HttpConfig,
    pub scrape: ScrapeConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, ScdlError> {
    dotenvy::dotenv().ok();

    let site    = build_site()?;
    let http    = HttpConfig::default();
    let scrape  = build_scrape();
    let cache   = build_cache();
    let output  = build_output();
    let logging = build_logging();

    Ok( AppConfig { site, http, scrape, cache, output, logging } )
}
