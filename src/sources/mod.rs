//! # Sources Module
//!
//! Turns a user query into playable track descriptors and stream URLs.
//!
//! ## Architecture
//!
//! ```text
//! MetadataResolver (QueryResolver)
//!   ├── classify: YouTube video | YouTube playlist | Spotify link | HTTP stream | search
//!   ├── Spotify: SpotifyBackend lists the songs, each one becomes a YouTube search
//!   ├── KeyValueCache::memoize      (search/video 1h, playlist 10min)
//!   └── RequestThrottle::submit_with_retry
//!         └── YouTubeBackend: YouTubeApiClient (API key) | YtDlpClient
//!
//! StreamResolver (CachedStreamResolver)
//!   └── yt-dlp -f bestaudio/best --get-url  (memoized 10min)
//! ```
//!
//! Every outbound call goes through the shared [`RequestThrottle`], so at
//! most `THROTTLE_CONCURRENCY` provider requests run at once across all
//! guilds.

pub mod chapters;
pub mod resolver;
pub mod retry;
pub mod spotify;
pub mod throttle;
pub mod youtube;
pub mod youtube_api;

pub use resolver::{CachedStreamResolver, QueryResolver};
pub use retry::RetryPolicy;
pub use spotify::{SpotifyBackend, SpotifyClient};
pub use throttle::RequestThrottle;
pub use youtube::YtDlpClient;
pub use youtube_api::YouTubeApiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ResolveError};

/// Where a track's audio comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaSource {
    /// Locator is a YouTube video id.
    YouTube,
    /// Locator is a direct HTTP/HLS stream URL.
    Http,
}

/// Playlist a track was queued from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRef {
    pub title: String,
    pub source: String,
}

/// Track descriptor produced by a [`MetadataResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    /// Video id for YouTube, URL for HTTP streams.
    pub locator: String,
    /// Seconds; 0 for live streams.
    pub duration: u64,
    /// Seconds into the underlying media where this track starts.
    pub start_offset: u64,
    pub is_live: bool,
    pub thumbnail: Option<String>,
    pub playlist: Option<PlaylistRef>,
    pub source: MediaSource,
}

impl TrackMetadata {
    /// URL that yt-dlp or a browser can open.
    pub fn page_url(&self) -> String {
        match self.source {
            MediaSource::YouTube => format!("https://www.youtube.com/watch?v={}", self.locator),
            MediaSource::Http => self.locator.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub playlist_limit: usize,
    pub split_chapters: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            playlist_limit: 50,
            split_chapters: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedQuery {
    pub tracks: Vec<TrackMetadata>,
    /// Note for the user, e.g. that a playlist was truncated.
    pub advisory: Option<String>,
}

#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, query: &str, options: ResolveOptions) -> Result<ResolvedQuery, ResolveError>;
}

/// Produces a URL the voice transport can stream for a track.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn stream_url(&self, track: &TrackMetadata) -> Result<String, ProviderError>;
}
