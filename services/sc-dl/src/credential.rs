//!
//! src/credential.rs  Andrew Belles  Oct 16th, 2026
//!
//! Validates candidate client ids against the live api and orchestrates
//! cache -> probe -> scrape -> probe into one confirmed id per run
//!

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::errors::ScdlError;
use crate::fetch::ApiClient;
use crate::scrape::CredentialSource;
use crate::store::TokenStore;
use crate::types::Credential;

pub const SCRAPE_ATTEMPTS: usize = 2;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialCheck: Send + Sync {
    async fn is_valid(&self, credential: &Credential) -> bool;
}

/// Only a 2xx counts as accepted
pub fn probe_accepts(status: StatusCode) -> bool {
    status.is_success()
}

/// Probes with a one result track search
pub struct ProbeValidator {
    api: ApiClient
}

impl ProbeValidator {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CredentialCheck for ProbeValidator {
    async fn is_valid(&self, credential: &Credential) -> bool {
        let request = match self.api.search_probe(credential) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "credential.probe.build");
                return false;
            }
        };
        // can't confirm means don't trust
        match request.send().await {
            Ok(response) => {
                let status = response.status();
                debug!(status = %status, "credential.probe");
                probe_accepts(status)
            }
            Err(e) => {
                debug!(error = %e, "credential.probe.error");
                false
            }
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Cached id if it still works, otherwise a fresh one
    async fn obtain(&self) -> Result<Credential, ScdlError>;
    /// Fresh id, never the cache
    async fn refresh(&self) -> Result<Credential, ScdlError>;
}

pub struct CredentialManager<S, V, T> {
    scraper: S,
    validator: V,
    store: T,
    retry_delay: Duration
}

impl<S, V, T> CredentialManager<S, V, T>
where
    S: CredentialSource,
    V: CredentialCheck,
    T: TokenStore,
{
    pub fn new(scraper: S, validator: V, store: T, retry_delay: Duration) -> Self {
        Self { scraper, validator, store, retry_delay }
    }

    async fn cached(&self) -> Option<Credential> {
        // cache trouble only costs a scrape
        let cached = self.store.load().unwrap_or_else(|e| {
            debug!(error = %e, "credential.cache.unreadable");
            None
        })?;

        if self.validator.is_valid(&cached).await {
            Some(cached)
        } else {
            info!("credential.cache.stale");
            None
        }
    }

    async fn discover(&self) -> Result<Credential, ScdlError> {
        for attempt in 1..=SCRAPE_ATTEMPTS {
            if attempt > 1 {
                sleep(self.retry_delay).await;
            }
            let candidate = self.scraper.scrape().await?;
            if self.validator.is_valid(&candidate).await {
                info!(attempt, "credential.discovered");
                if let Err(e) = self.store.save(&candidate) {
                    warn!(error = %e, "credential.cache.write");
                }
                return Ok(candidate);
            }
            warn!(attempt, "credential.candidate.rejected");
        }
        Err(ScdlError::CredentialUnavailable)
    }
}

#[async_trait]
impl<S, V, T> CredentialProvider for CredentialManager<S, V, T>
where
    S: CredentialSource,
    V: CredentialCheck,
    T: TokenStore,
{
    async fn obtain(&self) -> Result<Credential, ScdlError> {
        if let Some(credential) = self.cached().await {
            info!("credential.cache.hit");
            return Ok(credential);
        }
        self.discover().await
    }

    async fn refresh(&self) -> Result<Credential, ScdlError> {
        info!("credential.refresh");
        self.discover().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::MockCredentialSource;
    use crate::store::MockTokenStore;
    use crate::test_support::{Canned, client, serve};
    use mockall::predicate::eq;
    use url::Url;

    const CACHED: &str = "CachedCachedCachedCachedCached12";
    const FRESH: &str = "FreshFreshFreshFreshFreshFresh12";

    fn manager(
        scraper: MockCredentialSource,
        validator: MockCredentialCheck,
        store: MockTokenStore
    ) -> CredentialManager<MockCredentialSource, MockCredentialCheck, MockTokenStore> {
        CredentialManager::new(scraper, validator, store, Duration::from_millis(1))
    }

    #[test]
    fn probe_rejects_401_403_and_accepts_2xx() {
        assert!(!probe_accepts(StatusCode::UNAUTHORIZED));
        assert!(!probe_accepts(StatusCode::FORBIDDEN));
        assert!(!probe_accepts(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!probe_accepts(StatusCode::TOO_MANY_REQUESTS));
        for code in [200u16, 201, 204, 299] {
            assert!(probe_accepts(StatusCode::from_u16(code).unwrap()), "{code}");
        }
    }

    fn validator_at(base: Url) -> ProbeValidator {
        ProbeValidator::new(ApiClient { http: client(), base })
    }

    #[tokio::test]
    async fn probe_sends_one_result_search_with_client_id() {
        let server = serve(vec![("/search/tracks", Canned::ok("{\"collection\":[]}"))]).await;
        let ok = validator_at(server.base.clone()).is_valid(&Credential::new(CACHED)).await;

        assert!(ok);
        let hit = &server.hits()[0];
        assert!(hit.starts_with("/search/tracks?"));
        assert!(hit.contains("limit=1"));
        assert!(hit.contains(&format!("client_id={CACHED}")));
    }

    #[tokio::test]
    async fn probe_is_false_for_401_403_and_server_errors() {
        for status in [401u16, 403, 500] {
            let server = serve(vec![("/search/tracks", Canned::status(status))]).await;
            let ok = validator_at(server.base.clone()).is_valid(&Credential::new(CACHED)).await;
            assert!(!ok, "status {status}");
        }
    }

    #[tokio::test]
    async fn probe_is_false_when_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = Url::parse(&format!("http://{addr}/")).unwrap();
        assert!(!validator_at(base).is_valid(&Credential::new(CACHED)).await);
    }

    #[tokio::test]
    async fn valid_cache_never_scrapes() {
        let mut store = MockTokenStore::new();
        store.expect_load().times(1).returning(|| Ok(Some(Credential::new(CACHED))));
        store.expect_save().times(0);

        let mut validator = MockCredentialCheck::new();
        validator.expect_is_valid()
            .with(eq(Credential::new(CACHED)))
            .times(1)
            .returning(|_| true);

        let mut scraper = MockCredentialSource::new();
        scraper.expect_scrape().times(0);

        let got = manager(scraper, validator, store).obtain().await.unwrap();
        assert_eq!(got.as_str(), CACHED);
    }

    #[tokio::test]
    async fn stale_cache_scrapes_validates_and_saves() {
        let mut store = MockTokenStore::new();
        store.expect_load().returning(|| Ok(Some(Credential::new(CACHED))));
        store.expect_save()
            .with(eq(Credential::new(FRESH)))
            .times(1)
            .returning(|_| Ok(()));

        let mut validator = MockCredentialCheck::new();
        validator.expect_is_valid().returning(|c| c.as_str() == FRESH);

        let mut scraper = MockCredentialSource::new();
        scraper.expect_scrape().times(1).returning(|| Ok(Credential::new(FRESH)));

        let got = manager(scraper, validator, store).obtain().await.unwrap();
        assert_eq!(got.as_str(), FRESH);
    }

    #[tokio::test]
    async fn unreadable_cache_and_failed_save_are_not_fatal() {
        let mut store = MockTokenStore::new();
        store.expect_load().returning(|| Err(ScdlError::Io(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")
        )));
        store.expect_save().times(1).returning(|_| Err(ScdlError::Io(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")
        )));

        let mut validator = MockCredentialCheck::new();
        validator.expect_is_valid().times(1).returning(|_| true);

        let mut scraper = MockCredentialSource::new();
        scraper.expect_scrape().times(1).returning(|| Ok(Credential::new(FRESH)));

        let got = manager(scraper, validator, store).obtain().await.unwrap();
        assert_eq!(got.as_str(), FRESH);
    }

    #[tokio::test]
    async fn second_scrape_rescues_a_bad_first_candidate() {
        let mut store = MockTokenStore::new();
        store.expect_load().returning(|| Ok(None));
        store.expect_save().times(1).returning(|_| Ok(()));

        let mut validator = MockCredentialCheck::new();
        validator.expect_is_valid().returning(|c| c.as_str() == FRESH);

        let mut seq = mockall::Sequence::new();
        let mut scraper = MockCredentialSource::new();
        scraper.expect_scrape().times(1).in_sequence(&mut seq)
            .returning(|| Ok(Credential::new("StaleStaleStaleStaleStaleStale12")));
        scraper.expect_scrape().times(1).in_sequence(&mut seq)
            .returning(|| Ok(Credential::new(FRESH)));

        let got = manager(scraper, validator, store).obtain().await.unwrap();
        assert_eq!(got.as_str(), FRESH);
    }

    #[tokio::test]
    async fn gives_up_after_two_scrapes() {
        let mut store = MockTokenStore::new();
        store.expect_load().returning(|| Ok(None));
        store.expect_save().times(0);

        let mut validator = MockCredentialCheck::new();
        validator.expect_is_valid().times(2).returning(|_| false);

        let mut scraper = MockCredentialSource::new();
        scraper.expect_scrape().times(2).returning(|| Ok(Credential::new(FRESH)));

        let err = manager(scraper, validator, store).obtain().await.unwrap_err();
        assert!(matches!(err, ScdlError::CredentialUnavailable));
    }

    #[tokio::test]
    async fn scrape_not_found_propagates_without_retry() {
        let mut store = MockTokenStore::new();
        store.expect_load().returning(|| Ok(None));

        let validator = MockCredentialCheck::new();

        let mut scraper = MockCredentialSource::new();
        scraper.expect_scrape().times(1).returning(|| Err(ScdlError::CredentialNotFound));

        let err = manager(scraper, validator, store).obtain().await.unwrap_err();
        assert!(matches!(err, ScdlError::CredentialNotFound));
    }

    #[tokio::test]
    async fn refresh_skips_the_cache() {
        let mut store = MockTokenStore::new();
        store.expect_load().times(0);
        store.expect_save().times(1).returning(|_| Ok(()));

        let mut validator = MockCredentialCheck::new();
        validator.expect_is_valid().times(1).returning(|_| true);

        let mut scraper = MockCredentialSource::new();
        scraper.expect_scrape().times(1).returning(|| Ok(Credential::new(FRESH)));

        let got = manager(scraper, validator, store).refresh().await.unwrap();
        assert_eq!(got.as_str(), FRESH);
    }
}
