//!
//! src/rendition.rs  Andrew Belles  Oct 16th, 2026
//!
//! Picks the progressive mp3 out of a track's transcodings, trades it for
//! a time limited media url and decides where on disk it lands
//!

use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::errors::ScdlError;
use crate::fetch::{ApiClient, api_json};
use crate::types::{Credential, DownloadTarget, MediaLocation, Track, Transcoding};

pub const FALLBACK_NAME: &str = "audio";
pub const EXTENSION: &str = "mp3";

const UNSAFE_CHARS: [char; 8] = ['<', '>', ':', '"', '\\', '|', '?', '*'];

/// First transcoding eligible for a direct mp3 download
pub fn find_progressive_mp3(track: &Track) -> Option<&Transcoding> {
    track.transcodings().iter().find(|t| t.is_progressive_mp3())
}

/// Filesystem safe on windows/mac/linux; never empty
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name.trim()
        .chars()
        .map(|c| if c == '/' { '-' } else { c })
        .filter(|c| !UNSAFE_CHARS.contains(c) && !c.is_control())
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        collapsed
    }
}

/// `x.mp3`, then `x (2).mp3`, `x (3).mp3`, ... whichever is free first
pub fn unique_path(candidate: PathBuf) -> PathBuf {
    if !candidate.exists() {
        return candidate;
    }

    let parent = candidate.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = candidate.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());
    let ext = candidate.extension().map(|e| e.to_string_lossy().into_owned());

    (2u32..)
        .map(|n| {
            let name = match &ext {
                Some(ext) => format!("{stem} ({n}).{ext}"),
                None => format!("{stem} ({n})"),
            };
            parent.join(name)
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

impl DownloadTarget {
    pub fn choose(dir: &Path, artist: &str, title: &str, media_url: Url) -> Self {
        let filename = format!("{}.{EXTENSION}", sanitize_filename(&format!("{artist} - {title}")));
        let path = unique_path(dir.join(&filename));
        Self { filename, path, media_url }
    }
}

impl ApiClient {
    /// None when the track has no progressive mp3, which is common
    pub async fn select_rendition(&self, credential: &Credential, track: &Track, dir: &Path) ->
        Result<Option<DownloadTarget>, ScdlError> {
        let Some(transcoding) = find_progressive_mp3(track) else {
            debug!(title = track.title(), offered = track.transcodings().len(), "rendition.none");
            return Ok(None);
        };
        let indirection = transcoding.url.as_deref().unwrap_or_default();

        let request = self.exchange_transcoding(indirection, credential)?;
        let value = api_json(request).await?
            .ok_or_else(|| ScdlError::Transport(
                format!("transcoding not found for {}", track.title())
            ))?;

        let location: MediaLocation = serde_json::from_value(value)?;
        let media_url = location.url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ScdlError::MediaUrlMissing(track.title().to_string()))?;
        let media_url = Url::parse(&media_url)?;

        Ok( Some(DownloadTarget::choose(dir, track.artist(), track.title(), media_url)) )
    }
}
