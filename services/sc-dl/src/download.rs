//!
//! src/download.rs  Andrew Belles  Oct 16th, 2026
//!
//! Streams a media url to disk chunk by chunk, reporting progress through
//! an observer so transport stays separate from presentation
//!

use std::{path::Path, time::{Duration, Instant}};

use async_trait::async_trait;
use reqwest::Client;
use tokio::{fs::File, io::{AsyncWriteExt, BufWriter}};
use tracing::{debug, info};
use url::Url;

use crate::config::OutputConfig;
use crate::errors::ScdlError;

pub trait ProgressObserver {
    /// total is None when the server sent no content-length
    fn on_progress(&mut self, bytes_so_far: u64, total: Option<u64>);
}

/// Emits throttled progress as tracing events
pub struct LogProgress {
    label: String
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl ProgressObserver for LogProgress {
    fn on_progress(&mut self, bytes_so_far: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => {
                let percent = bytes_so_far as f64 / total as f64 * 100.0;
                info!(
                    file = %self.label, bytes = bytes_so_far, total,
                    percent = %format!("{percent:.1}"), "download.progress"
                );
            }
            _ => info!(file = %self.label, bytes = bytes_so_far, "download.progress"),
        }
    }
}

/// Lets a report through at most once per interval; the final one always passes
struct Throttle {
    interval: Duration,
    last: Option<Instant>
}

impl Throttle {
    fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Writes the body to dest and returns the byte count.
    /// A failure mid-stream leaves the partial file behind
    async fn download(
        &self,
        media_url: &Url,
        dest: &Path,
        progress: &mut (dyn ProgressObserver + Send)
    ) -> Result<u64, ScdlError>;
}

pub struct HttpDownloader {
    http: Client,
    chunk_size: usize,
    progress_interval: Duration
}

impl HttpDownloader {
    pub fn new(http: Client, output: &OutputConfig) -> Self {
        Self {
            http,
            chunk_size: output.chunk_size,
            progress_interval: output.progress_interval
        }
    }
}

#[async_trait]
impl MediaFetcher for HttpDownloader {
    async fn download(
        &self,
        media_url: &Url,
        dest: &Path,
        progress: &mut (dyn ProgressObserver + Send)
    ) -> Result<u64, ScdlError> {
        let mut response = self.http.get(media_url.clone())
            .send()
            .await?
            .error_for_status()?;

        let total = response.content_length().filter(|n| *n > 0);
        debug!(dest = %dest.display(), total = ?total, "download.start");

        let file = File::create(dest).await?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut throttle = Throttle::new(self.progress_interval);
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if throttle.ready(Instant::now()) {
                progress.on_progress(written, total);
            }
        }
        writer.flush().await?;
        progress.on_progress(written, total);

        debug!(dest = %dest.display(), bytes = written, "download.done");
        Ok(written)
    }
}
