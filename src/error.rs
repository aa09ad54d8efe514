//! Error types shared by the playback core.
//!
//! The engine, the content cache and the provider layer each surface their
//! own `thiserror` enum. The Discord glue and `main` wrap them in
//! `anyhow::Error` when they only need to report.

use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by [`crate::audio::player::Player`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    #[error("not connected to a voice channel")]
    NotConnected,

    #[error("no voice channel to connect to")]
    NotConnectedTarget,

    #[error("playback failed: {0}")]
    PlaybackFailed(String),

    #[error("voice transport error: {0}")]
    Transport(String),
}

impl From<TransportError> for PlayerError {
    fn from(err: TransportError) -> Self {
        PlayerError::Transport(err.0)
    }
}

/// Error reported by a [`crate::audio::transport::VoiceTransport`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache registry error: {0}")]
    Registry(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("download failed: {0}")]
    Download(String),
}

/// Saved query operations that the user can get wrong.
#[derive(Debug, Error)]
pub enum FavoriteError {
    #[error("a favorite named {0:?} already exists")]
    AlreadyExists(String),

    #[error("no favorite named {0:?} exists")]
    NotFound(String),

    #[error("you can only remove your own favorites")]
    NotAuthor,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Failures of rate-limited external providers (YouTube, yt-dlp).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("provider error: {0}")]
    Fatal(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. } | ProviderError::Transient(_)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            ProviderError::Transient(err.to_string())
        } else {
            ProviderError::Fatal(err.to_string())
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("nothing found for {0:?}")]
    NothingFound(String),

    #[error("unsupported query: {0}")]
    Unsupported(String),

    #[error("{0} support is not configured")]
    NotConfigured(&'static str),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
