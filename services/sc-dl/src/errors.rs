//!
//! src/errors.rs  Andrew Belles  Oct 16th, 2026
//!
//! Defines enums and methods of error conversion
//! for errors the downloader uses
//!
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScdlError {
    #[error("couldn't find a soundcloud client id, try again later")]
    CredentialNotFound,
    #[error("found a client id but it doesn't work, try again in a minute")]
    CredentialUnavailable,
    #[error("access denied, client id was rejected")]
    CredentialRejected,
    #[error("couldn't resolve soundcloud url: {0}")]
    UnresolvableUrl(String),
    #[error("this playlist has no tracks")]
    EmptyPlaylist,
    #[error("soundcloud didn't return a media url for {0}")]
    MediaUrlMissing(String),
    #[error("network error: {0}")]
    Transport(String),
    #[error("not a valid soundcloud url: {0}")]
    InvalidUrl(String),
    #[error("unsupported soundcloud type: {0}")]
    UnsupportedKind(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl ScdlError {
    /// Stable name reported alongside the message at the top level
    pub fn kind(&self) -> &'static str {
        match self {
            ScdlError::CredentialNotFound    => "CredentialNotFound",
            ScdlError::CredentialUnavailable => "CredentialUnavailable",
            ScdlError::CredentialRejected    => "CredentialRejected",
            ScdlError::UnresolvableUrl(_)    => "UnresolvableUrl",
            ScdlError::EmptyPlaylist         => "EmptyPlaylist",
            ScdlError::MediaUrlMissing(_)    => "MediaUrlMissing",
            ScdlError::Transport(_)          => "TransportError",
            ScdlError::InvalidUrl(_)         => "InvalidUrl",
            ScdlError::UnsupportedKind(_)    => "UnsupportedKind",
            ScdlError::Config(_)             => "ConfigError",
            ScdlError::Parse(_)              => "ParseError",
            ScdlError::Io(_)                 => "IoError",
        }
    }
}

impl From<reqwest::Error> for ScdlError {
    fn from(e: reqwest::Error) -> Self { ScdlError::Transport(e.to_string()) }
}

impl From<serde_json::Error> for ScdlError {
    fn from(e: serde_json::Error) -> Self { ScdlError::Parse(e.to_string()) }
}

impl From<url::ParseError> for ScdlError {
    fn from(e: url::ParseError) -> Self { ScdlError::InvalidUrl(e.to_string()) }
}
