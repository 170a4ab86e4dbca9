//!
//! src/fetch.rs  Andrew Belles  Oct 16th, 2026
//!
//! Defines methods for hitting the site and api endpoints and
//! returning unparsed data, mapping statuses onto error kinds
//!

use url::Url;
use reqwest::{Client, StatusCode, header, redirect, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{HttpConfig, LANDING_DOMAIN, SiteConfig};
use crate::types::Credential;
use crate::errors::ScdlError;

/// Client building functionality
fn client_helper(http: &HttpConfig, site: &SiteConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .connect_timeout(http.connect_timeout)
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
        .user_agent(site.user_agent.clone())
}

/// Client for html pages and script bundles
pub fn site_client(http: &HttpConfig, site: &SiteConfig) -> Result<Client, ScdlError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("text/html,*/*"));
    client_helper(http, site)
        .timeout(http.page_timeout)
        .default_headers(h)
        .build()
        .map_err(|e| ScdlError::Config(format!("build client: {e}")))
}

/// Client for media files; no total timeout so long downloads survive
pub fn media_client(http: &HttpConfig, site: &SiteConfig) -> Result<Client, ScdlError> {
    client_helper(http, site)
        .build()
        .map_err(|e| ScdlError::Config(format!("build client: {e}")))
}

/// Client for shortlink expansion; follows up to max_redirects
pub fn shortlink_client(http: &HttpConfig, site: &SiteConfig) -> Result<Client, ScdlError> {
    client_helper(http, site)
        .timeout(http.shortlink_timeout)
        .build()
        .map_err(|e| ScdlError::Config(format!("build client: {e}")))
}

/// True for statuses that mean the client id is no longer accepted
pub fn is_rejection(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

/// Sends an api request and decodes the body.
/// 404 and empty bodies map to None, 401/403 to CredentialRejected
pub async fn api_json(request: RequestBuilder) -> Result<Option<Value>, ScdlError> {
    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if is_rejection(status) {
        return Err(ScdlError::CredentialRejected);
    }
    if !status.is_success() {
        return Err(ScdlError::Transport(
            format!("http {status} from {}", response.url().path())
        ));
    }

    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(&body)?;
    Ok( if value.is_null() { None } else { Some(value) } )
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    pub http: Client,
    pub base: Url
}

impl ApiClient {
    pub fn new(http_config: &HttpConfig, site: &SiteConfig) -> Result<Self, ScdlError> {
        let mut h = header::HeaderMap::new();
        h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        let http = client_helper(http_config, site)
            .timeout(http_config.api_timeout)
            .default_headers(h)
            .build()
            .map_err(|e| ScdlError::Config(format!("build client: {e}")))?;

        Ok( Self { http, base: site.api_base.clone() } )
    }

    fn endpoint(&self, path: &str) -> Result<Url, ScdlError> {
        self.base.join(path)
            .map_err(|e| ScdlError::Config(format!("api endpoint {path}: {e}")))
    }

    /// GET /search/tracks?q=test&limit=1&client_id=...
    pub fn search_probe(&self, credential: &Credential) -> Result<RequestBuilder, ScdlError> {
        let url = self.endpoint("search/tracks")?;
        Ok( self.http.get(url).query(&[
            ("q", "test"),
            ("limit", "1"),
            ("client_id", credential.as_str())
        ]) )
    }

    /// GET /resolve?url=...&client_id=...
    pub fn resolve_url(&self, url: &str, credential: &Credential) -> Result<RequestBuilder, ScdlError> {
        let endpoint = self.endpoint("resolve")?;
        Ok( self.http.get(endpoint).query(&[
            ("url", url),
            ("client_id", credential.as_str())
        ]) )
    }

    /// GET {transcoding.url}&client_id=...
    pub fn exchange_transcoding(&self, indirection: &str, credential: &Credential) ->
        Result<RequestBuilder, ScdlError> {
        let url = with_client_id(indirection, credential)?;
        Ok( self.http.get(url) )
    }
}

/// Appends client_id, keeping whatever query the url already carries
pub fn with_client_id(raw: &str, credential: &Credential) -> Result<Url, ScdlError> {
    let mut url = Url::parse(raw)?;
    url.query_pairs_mut().append_pair("client_id", credential.as_str());
    Ok(url)
}

fn is_soundcloud(url: &Url) -> bool {
    url.host_str()
        .map(|h| h.to_ascii_lowercase().contains(LANDING_DOMAIN))
        .unwrap_or(false)
}

/// Same host and explicit port, scheme aside
fn same_authority(a: &Url, b: &Url) -> bool {
    a.host_str().map(str::to_ascii_lowercase) == b.host_str().map(str::to_ascii_lowercase)
        && a.port() == b.port()
}

pub fn is_shortlink(raw: &str, site: &SiteConfig) -> bool {
    Url::parse(raw.trim())
        .map(|u| same_authority(&u, &site.shortlink_url))
        .unwrap_or(false)
}

fn lands_on_site(url: &Url, site: &SiteConfig) -> bool {
    let on_domain = url.host_str()
        .map(|h| h.to_ascii_lowercase().contains(&site.landing_domain))
        .unwrap_or(false);
    on_domain && !same_authority(url, &site.shortlink_url)
}

/// Follows shortlinks to the canonical url.
/// HEAD first, GET when HEAD ends anywhere but a 2xx landing page;
/// any failure keeps the original url
pub async fn expand_shortlink(client: &Client, site: &SiteConfig, raw: &str) -> String {
    if !is_shortlink(raw, site) {
        return raw.to_string();
    }

    let head = client.head(raw.trim()).send().await;
    let landed = match head {
        Ok(r) if r.status().is_success() && lands_on_site(r.url(), site) => Ok(r),
        _ => {
            debug!(url = raw, "shortlink.head.fallback");
            client.get(raw.trim()).send().await
        }
    };

    match landed {
        Ok(r) if r.status().is_success() && lands_on_site(r.url(), site) => {
            debug!(from = raw, to = %r.url(), "shortlink.expanded");
            r.url().to_string()
        }
        Ok(r) => {
            warn!(status = %r.status(), url = raw, "shortlink.unresolved");
            raw.to_string()
        }
        Err(e) => {
            warn!(error = %e, url = raw, "shortlink.failed");
            raw.to_string()
        }
    }
}

/// http(s) with a soundcloud host, else InvalidUrl
pub fn validate_soundcloud_url(raw: &str) -> Result<Url, ScdlError> {
    let url = Url::parse(raw.trim())
        .map_err(|_| ScdlError::InvalidUrl(raw.to_string()))?;
    let scheme_ok = matches!(url.scheme(), "http" | "https");
    if scheme_ok && is_soundcloud(&url) {
        Ok(url)
    } else {
        Err(ScdlError::InvalidUrl(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred() -> Credential {
        Credential::new("a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6")
    }

    #[test]
    fn client_id_uses_question_mark_without_query() {
        let url = with_client_id("https://api-v2.soundcloud.com/media/1/stream/progressive", &cred())
            .unwrap();
        assert_eq!(url.query(), Some("client_id=a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6"));
    }

    #[test]
    fn client_id_appends_to_existing_query() {
        let url = with_client_id("https://api-v2.soundcloud.com/media/1/stream?track_authorization=xyz", &cred())
            .unwrap();
        assert_eq!(
            url.query(),
            Some("track_authorization=xyz&client_id=a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6")
        );
    }

    #[test]
    fn rejection_statuses_are_401_and_403_only() {
        assert!(is_rejection(StatusCode::UNAUTHORIZED));
        assert!(is_rejection(StatusCode::FORBIDDEN));
        assert!(!is_rejection(StatusCode::NOT_FOUND));
        assert!(!is_rejection(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn soundcloud_urls_validate() {
        assert!(validate_soundcloud_url("https://soundcloud.com/user/track").is_ok());
        assert!(validate_soundcloud_url("http://m.soundcloud.com/user/sets/x").is_ok());
        assert!(validate_soundcloud_url("ftp://soundcloud.com/user/track").is_err());
        assert!(validate_soundcloud_url("https://example.com/user/track").is_err());
        assert!(validate_soundcloud_url("soundcloud.com/user/track").is_err());
    }

    fn site_with(shortlink_url: Url, landing_domain: &str) -> SiteConfig {
        SiteConfig {
            home_url: Url::parse("https://soundcloud.com/").unwrap(),
            api_base: Url::parse("https://api-v2.soundcloud.com/").unwrap(),
            user_agent: "test".to_string(),
            shortlink_url,
            landing_domain: landing_domain.to_string(),
        }
    }

    fn soundcloud_site() -> SiteConfig {
        site_with(Url::parse("https://on.soundcloud.com/").unwrap(), "soundcloud.com")
    }

    #[test]
    fn shortlink_host_is_not_a_landing_page() {
        let site = soundcloud_site();
        let short = Url::parse("https://on.soundcloud.com/abc").unwrap();
        let long = Url::parse("https://soundcloud.com/user/track").unwrap();
        assert!(!lands_on_site(&short, &site));
        assert!(lands_on_site(&long, &site));
        assert!(is_shortlink("http://on.soundcloud.com/abc", &site));
        assert!(!is_shortlink("https://soundcloud.com/user/track", &site));
        assert!(!is_shortlink("not a url", &site));
    }

    #[test]
    fn every_client_builds_from_default_config() {
        let (http, site) = (HttpConfig::default(), soundcloud_site());
        assert!(site_client(&http, &site).is_ok());
        assert!(media_client(&http, &site).is_ok());
        assert!(shortlink_client(&http, &site).is_ok());
        assert!(ApiClient::new(&http, &site).is_ok());
    }

    mod shortlinks {
        use super::*;
        use crate::test_support::{Canned, client, serve};

        #[tokio::test]
        async fn head_landing_on_the_site_skips_get() {
            let landing = serve(vec![("/user/track", Canned::ok(""))]).await;
            let target = landing.url("user/track");
            let short = serve(vec![("/s/abc", Canned::redirect(target.as_str()))]).await;
            let site = site_with(short.base.clone(), "127.0.0.1");

            let got = expand_shortlink(&client(), &site, short.url("s/abc").as_str()).await;
            assert_eq!(got, target.to_string());
            assert_eq!(short.requests(), vec!["HEAD /s/abc"]);
            assert_eq!(landing.requests(), vec!["HEAD /user/track"]);
        }

        #[tokio::test]
        async fn refused_head_falls_back_to_get() {
            let landing = serve(vec![("/user/track", Canned::ok("<html></html>"))]).await;
            let target = landing.url("user/track");
            let short = serve(vec![
                ("HEAD /s/abc", Canned::status(405)),
                ("/s/abc", Canned::redirect(target.as_str())),
            ]).await;
            let site = site_with(short.base.clone(), "127.0.0.1");

            let got = expand_shortlink(&client(), &site, short.url("s/abc").as_str()).await;
            assert_eq!(got, target.to_string());
            assert_eq!(short.requests(), vec!["HEAD /s/abc", "GET /s/abc"]);
            assert_eq!(landing.requests(), vec!["GET /user/track"]);
        }

        #[tokio::test]
        async fn dead_shortlink_keeps_the_original_url() {
            let short = serve(vec![]).await;
            let site = site_with(short.base.clone(), "127.0.0.1");
            let raw = short.url("s/gone").to_string();

            assert_eq!(expand_shortlink(&client(), &site, &raw).await, raw);
            assert_eq!(short.requests(), vec!["HEAD /s/gone", "GET /s/gone"]);
        }

        #[tokio::test]
        async fn redirect_off_site_keeps_the_original_url() {
            let elsewhere = serve(vec![("/ad", Canned::ok(""))]).await;
            let short = serve(vec![("/s/abc", Canned::redirect(elsewhere.url("ad").as_str()))]).await;
            let site = site_with(short.base.clone(), "soundcloud.com");
            let raw = short.url("s/abc").to_string();

            assert_eq!(expand_shortlink(&client(), &site, &raw).await, raw);
            assert_eq!(short.requests(), vec!["HEAD /s/abc", "GET /s/abc"]);
        }

        #[tokio::test]
        async fn non_shortlinks_pass_through_untouched() {
            let short = serve(vec![]).await;
            let site = site_with(short.base.clone(), "127.0.0.1");
            let url = "https://soundcloud.com/user/track";

            assert_eq!(expand_shortlink(&client(), &site, url).await, url);
            assert!(short.requests().is_empty());
        }
    }
}
