//!
//! src/types.rs  Andrew Belles  Oct 16th, 2026
//!
//! Typed views over the api payloads the downloader consumes. Every field
//! is optional since the api omits or nulls them freely
//!

use std::{fmt, path::PathBuf};

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::errors::ScdlError;

pub const DEFAULT_TITLE: &str = "audio";
pub const DEFAULT_ARTIST: &str = "Unknown Artist";

// Public api client id, 32 alphanumerics scraped from the site bundles
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Only a prefix ever reaches the logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.0.chars().take(4).collect();
        write!(f, "Credential({head}…)")
    }
}


#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    pub username: Option<String>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscodingFormat {
    pub protocol: Option<String>,
    pub mime_type: Option<String>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcoding {
    pub url: Option<String>,
    pub format: Option<TranscodingFormat>
}

impl Transcoding {
    pub fn mime_type(&self) -> &str {
        self.format.as_ref()
            .and_then(|f| f.mime_type.as_deref())
            .unwrap_or_default()
    }

    pub fn protocol(&self) -> &str {
        self.format.as_ref()
            .and_then(|f| f.protocol.as_deref())
            .unwrap_or_default()
    }

    /// MPEG audio delivered as one file rather than HLS segments
    pub fn is_progressive_mp3(&self) -> bool {
        self.url.is_some()
            && self.mime_type().contains("audio/mpeg")
            && self.protocol() == "progressive"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Media {
    pub transcodings: Option<Vec<Transcoding>>
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Track {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub user: Option<User>,
    pub media: Option<Media>
}

impl Track {
    pub fn title(&self) -> &str {
        self.title.as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE)
    }

    pub fn artist(&self) -> &str {
        self.user.as_ref()
            .and_then(|u| u.username.as_deref())
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_ARTIST)
    }

    pub fn transcodings(&self) -> &[Transcoding] {
        self.media.as_ref()
            .and_then(|m| m.transcodings.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Playlist {
    pub title: Option<String>,
    pub tracks: Option<Vec<Track>>
}

impl Playlist {
    pub fn tracks(&self) -> &[Track] {
        self.tracks.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub enum ResolvedEntity {
    Track(Track),
    Playlist(Playlist)
}

impl ResolvedEntity {
    /// Dispatch on the api's `kind` field; system playlists are plain playlists
    pub fn from_value(value: Value) -> Result<Self, ScdlError> {
        let kind = value.get("kind")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match kind.as_str() {
            "track" => Ok(ResolvedEntity::Track(serde_json::from_value(value)?)),
            "playlist" | "system-playlist" =>
                Ok(ResolvedEntity::Playlist(serde_json::from_value(value)?)),
            other => Err(ScdlError::UnsupportedKind(
                if other.is_empty() { "unknown".to_string() } else { other.to_string() }
            )),
        }
    }
}

/// Body of the transcoding exchange call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaLocation {
    pub url: Option<String>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub filename: String,
    pub path: PathBuf,
    pub media_url: Url
}
