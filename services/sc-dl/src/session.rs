//!
//! src/session.rs  Andrew Belles  Oct 16th, 2026
//!
//! Drives one run: resolve the url, then select and download every track
//! in order. A skipped or failed track never halts the rest
//!

use std::{fmt, path::{Path, PathBuf}};

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::credential::CredentialProvider;
use crate::download::{LogProgress, MediaFetcher};
use crate::errors::ScdlError;
use crate::fetch::ApiClient;
use crate::types::{Credential, DownloadTarget, ResolvedEntity, Track};

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn resolve(&self, credential: &Credential, url: &str) ->
        Result<ResolvedEntity, ScdlError>;

    async fn select_download(&self, credential: &Credential, track: &Track, dir: &Path) ->
        Result<Option<DownloadTarget>, ScdlError>;
}

#[async_trait]
impl Catalog for ApiClient {
    async fn resolve(&self, credential: &Credential, url: &str) ->
        Result<ResolvedEntity, ScdlError> {
        self.resolve_entity(credential, url).await
    }

    async fn select_download(&self, credential: &Credential, track: &Track, dir: &Path) ->
        Result<Option<DownloadTarget>, ScdlError> {
        self.select_rendition(credential, track, dir).await
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.succeeded, self.total)
    }
}

#[derive(Debug)]
enum TrackOutcome {
    Saved(PathBuf),
    Skipped
}

/// Errors after which every remaining call would fail the same way
fn is_credential_failure(e: &ScdlError) -> bool {
    matches!(
        e,
        ScdlError::CredentialRejected
            | ScdlError::CredentialUnavailable
            | ScdlError::CredentialNotFound
    )
}

pub struct Session<P, C, F> {
    credentials: P,
    catalog: C,
    fetcher: F,
    output_dir: PathBuf,
    credential: Credential,
    rotated: bool
}

impl<P, C, F> Session<P, C, F>
where
    P: CredentialProvider,
    C: Catalog,
    F: MediaFetcher,
{
    pub fn new(
        credentials: P,
        catalog: C,
        fetcher: F,
        output_dir: impl Into<PathBuf>,
        credential: Credential
    ) -> Self {
        Self {
            credentials,
            catalog,
            fetcher,
            output_dir: output_dir.into(),
            credential,
            rotated: false
        }
    }

    pub async fn run(&mut self, url: &str) -> Result<Report, ScdlError> {
        let entity = self.resolve(url).await?;
        self.download_entity(&entity).await
    }

    /// One rediscovery per run; a second rejection ends it
    async fn rotate(&mut self) -> Result<(), ScdlError> {
        if self.rotated {
            return Err(ScdlError::CredentialRejected);
        }
        self.rotated = true;
        warn!("session.credential.rejected");
        self.credential = self.credentials.refresh().await?;
        Ok(())
    }

    async fn resolve(&mut self, url: &str) -> Result<ResolvedEntity, ScdlError> {
        match self.catalog.resolve(&self.credential, url).await {
            Err(ScdlError::CredentialRejected) => {
                self.rotate().await?;
                self.catalog.resolve(&self.credential, url).await
            }
            other => other,
        }
    }

    async fn select(&mut self, track: &Track) -> Result<Option<DownloadTarget>, ScdlError> {
        match self.catalog.select_download(&self.credential, track, &self.output_dir).await {
            Err(ScdlError::CredentialRejected) => {
                self.rotate().await?;
                self.catalog.select_download(&self.credential, track, &self.output_dir).await
            }
            other => other,
        }
    }

    async fn download_track(&mut self, track: &Track) -> Result<TrackOutcome, ScdlError> {
        let Some(target) = self.select(track).await? else {
            return Ok(TrackOutcome::Skipped);
        };

        info!(artist = track.artist(), title = track.title(), "track.downloading");
        println!("downloading: {} - {}", track.artist(), track.title());
        let mut progress = LogProgress::new(target.filename.clone());
        self.fetcher.download(&target.media_url, &target.path, &mut progress).await?;
        Ok(TrackOutcome::Saved(target.path))
    }

    pub async fn download_entity(&mut self, entity: &ResolvedEntity) ->
        Result<Report, ScdlError> {
        let tracks: &[Track] = match entity {
            ResolvedEntity::Track(track) => std::slice::from_ref(track),
            ResolvedEntity::Playlist(playlist) if playlist.tracks().is_empty() =>
                return Err(ScdlError::EmptyPlaylist),
            ResolvedEntity::Playlist(playlist) => playlist.tracks(),
        };

        let mut report = Report { total: tracks.len(), ..Report::default() };
        for (i, track) in tracks.iter().enumerate() {
            let position = i + 1;
            match self.download_track(track).await {
                Ok(TrackOutcome::Saved(path)) => {
                    report.succeeded += 1;
                    info!(position, of = report.total, path = %path.display(), "track.saved");
                    println!("saved: {}", path.display());
                }
                Ok(TrackOutcome::Skipped) => {
                    report.skipped += 1;
                    warn!(
                        position, of = report.total,
                        artist = track.artist(), title = track.title(),
                        "track.skipped.no_mp3"
                    );
                    println!("skipping (no mp3 available): {} - {}", track.artist(), track.title());
                }
                Err(e) if is_credential_failure(&e) => return Err(e),
                Err(e) => {
                    report.failed += 1;
                    error!(
                        position, of = report.total, title = track.title(),
                        kind = e.kind(), error = %e, "track.failed"
                    );
                }
            }
        }

        info!(
            succeeded = report.succeeded, skipped = report.skipped,
            failed = report.failed, total = report.total, "session.done"
        );
        Ok(report)
    }
}
