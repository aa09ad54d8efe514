use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};
use url::Url;

use crate::cache::ONE_MINUTE;
use crate::error::ProviderError;

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Entity a Spotify link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpotifyKind {
    Track,
    Album,
    Playlist,
    Artist,
}

impl SpotifyKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "track" => Some(Self::Track),
            "album" => Some(Self::Album),
            "playlist" => Some(Self::Playlist),
            "artist" => Some(Self::Artist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Playlist => "playlist",
            Self::Artist => "artist",
        }
    }
}

impl fmt::Display for SpotifyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `open.spotify.com/<kind>/<id>` (optionally under `intl-xx/`) or
/// `spotify:<kind>:<id>`.
pub fn parse_url(url: &Url) -> Option<(SpotifyKind, String)> {
    let (kind, id) = if url.scheme() == "spotify" {
        let mut parts = url.path().split(':');
        (parts.next()?.to_string(), parts.next()?.to_string())
    } else if url.host_str() == Some("open.spotify.com") {
        let mut segments = url.path_segments()?.filter(|s| !s.is_empty()).peekable();
        if segments.peek().is_some_and(|s| s.starts_with("intl-")) {
            segments.next();
        }
        (segments.next()?.to_string(), segments.next()?.to_string())
    } else {
        return None;
    };

    let kind = SpotifyKind::parse(&kind)?;
    (!id.is_empty()).then_some((kind, id))
}

/// True for any link the Spotify handler owns, valid or not.
pub fn is_spotify_link(url: &Url) -> bool {
    url.scheme() == "spotify" || url.host_str() == Some("open.spotify.com")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub name: String,
    /// Artist names joined with ", ".
    pub artist: String,
}

impl SpotifyTrack {
    /// YouTube query used to find this song.
    pub fn search_query(&self) -> String {
        format!("\"{}\" \"{}\"", self.name, self.artist)
    }
}

/// Songs behind a link. A single track is a collection of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotifyCollection {
    pub title: String,
    pub tracks: Vec<SpotifyTrack>,
}

/// Catalog lookups used by the resolver.
#[async_trait]
pub trait SpotifyBackend: Send + Sync {
    async fn collection(&self, kind: SpotifyKind, id: &str) -> Result<Option<SpotifyCollection>, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    name: String,
    #[serde(default)]
    artists: Vec<ArtistRef>,
}

impl From<TrackItem> for SpotifyTrack {
    fn from(item: TrackItem) -> Self {
        let artist = item
            .artists
            .into_iter()
            .map(|a| a.name)
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            name: item.name,
            artist,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    /// `null` para episodios o pistas eliminadas
    track: Option<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct Album {
    name: String,
    tracks: Page<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct Playlist {
    name: String,
    tracks: Page<PlaylistEntry>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TopTracks {
    tracks: Vec<TrackItem>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    /// Se descarta un minuto antes de expirar
    fn usable_at(&self, now: Instant) -> bool {
        now + ONE_MINUTE < self.expires_at
    }
}

/// Spotify Web API backend using the client-credentials flow.
pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
    base_url: String,
    token_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String, client: reqwest::Client) -> Self {
        Self {
            client_id,
            client_secret,
            client,
            base_url: API_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.token.lock().as_ref().filter(|t| t.usable_at(Instant::now())) {
            return Ok(token.value.clone());
        }

        debug!("🔑 Solicitando token de Spotify");
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let token: TokenResponse = check_status(response).await?.json().await?;

        let value = token.access_token.clone();
        *self.token.lock() = Some(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    /// `endpoint` is relative to the API base, or an absolute `next` link.
    async fn get<T>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = if endpoint.starts_with("http") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint)
        };
        let token = self.access_token().await?;
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            // Token revocado: el reintento pedirá uno nuevo
            self.token.lock().take();
            return Err(ProviderError::Transient("Spotify token rejected".into()));
        }

        Ok(check_status(response).await?.json::<T>().await?)
    }

    async fn remaining<T>(&self, mut next: Option<String>, items: &mut Vec<T>) -> Result<(), ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        while let Some(url) = next {
            let page: Page<T> = self.get(&url, &[]).await?;
            items.extend(page.items);
            next = page.next;
        }
        Ok(())
    }

    async fn album(&self, id: &str) -> Result<SpotifyCollection, ProviderError> {
        let album: Album = self.get(&format!("albums/{id}"), &[]).await?;
        let mut items = album.tracks.items;
        self.remaining(album.tracks.next, &mut items).await?;

        Ok(SpotifyCollection {
            title: album.name,
            tracks: items.into_iter().map(SpotifyTrack::from).collect(),
        })
    }

    async fn playlist(&self, id: &str) -> Result<SpotifyCollection, ProviderError> {
        let playlist: Playlist = self.get(&format!("playlists/{id}"), &[]).await?;
        let mut entries = playlist.tracks.items;
        self.remaining(playlist.tracks.next, &mut entries).await?;

        Ok(SpotifyCollection {
            title: playlist.name,
            tracks: entries
                .into_iter()
                .filter_map(|e| e.track)
                .map(SpotifyTrack::from)
                .collect(),
        })
    }

    async fn artist(&self, id: &str) -> Result<SpotifyCollection, ProviderError> {
        let artist: Artist = self.get(&format!("artists/{id}"), &[]).await?;
        let top: TopTracks = self
            .get(&format!("artists/{id}/top-tracks"), &[("market", "US")])
            .await?;

        Ok(SpotifyCollection {
            title: format!("{} Top Tracks", artist.name),
            tracks: top.tracks.into_iter().map(SpotifyTrack::from).collect(),
        })
    }
}

#[async_trait]
impl SpotifyBackend for SpotifyClient {
    async fn collection(&self, kind: SpotifyKind, id: &str) -> Result<Option<SpotifyCollection>, ProviderError> {
        debug!("🔍 Spotify {} {}", kind, id);

        let result = match kind {
            SpotifyKind::Track => self.get::<TrackItem>(&format!("tracks/{id}"), &[]).await.map(|item| {
                let track = SpotifyTrack::from(item);
                SpotifyCollection {
                    title: track.name.clone(),
                    tracks: vec![track],
                }
            }),
            SpotifyKind::Album => self.album(id).await,
            SpotifyKind::Playlist => self.playlist(id).await,
            SpotifyKind::Artist => self.artist(id).await,
        };

        match result {
            Ok(collection) => {
                info!("✅ Spotify {} {}: {} pistas", kind, id, collection.tracks.len());
                Ok(Some(collection))
            }
            Err(ProviderError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    error!("❌ Spotify API error: {} - {}", status, body);

    Err(status_error(status, retry_after, body))
}

fn status_error(status: StatusCode, retry_after: Option<Duration>, body: String) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
        StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => ProviderError::NotFound(body),
        s if s.is_server_error() => ProviderError::Transient(format!("Spotify API {s}")),
        s => ProviderError::Fatal(format!("Spotify API {s}: {body}")),
    }
}
