use async_trait::async_trait;
use futures::future::join_all;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::chapters::{self, Chapter};
use super::retry::RetryPolicy;
use super::spotify::{self, SpotifyBackend, SpotifyCollection, SpotifyKind};
use super::throttle::RequestThrottle;
use super::youtube::{VideoInfo, YouTubeBackend, YtDlpClient};
use super::{
    MediaSource, MetadataResolver, PlaylistRef, ResolveOptions, ResolvedQuery, StreamResolver,
    TrackMetadata,
};
use crate::cache::{KeyValueCache, ONE_HOUR, TEN_MINUTES};
use crate::error::{ProviderError, ResolveError};

const YOUTUBE_HOSTS: &[&str] = &[
    "www.youtube.com",
    "youtube.com",
    "m.youtube.com",
    "youtu.be",
    "music.youtube.com",
    "www.music.youtube.com",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    Video(String),
    Playlist(String),
    Spotify(SpotifyKind, String),
    Stream(String),
    Search(String),
}

/// Classifies what the user typed.
pub fn classify(query: &str) -> Result<QueryKind, ResolveError> {
    let query = query.trim();
    let Ok(url) = Url::parse(query) else {
        return Ok(QueryKind::Search(query.to_string()));
    };
    if spotify::is_spotify_link(&url) {
        return spotify::parse_url(&url)
            .map(|(kind, id)| QueryKind::Spotify(kind, id))
            .ok_or_else(|| ResolveError::Unsupported(query.to_string()));
    }
    let Some(host) = url.host_str() else {
        return Ok(QueryKind::Search(query.to_string()));
    };
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ResolveError::Unsupported(query.to_string()));
    }

    if !YOUTUBE_HOSTS.contains(&host) {
        return Ok(QueryKind::Stream(query.to_string()));
    }

    if let Some((_, list)) = url.query_pairs().find(|(k, _)| k == "list") {
        return Ok(QueryKind::Playlist(list.into_owned()));
    }

    let video_id = if host == "youtu.be" {
        url.path_segments().and_then(|mut s| s.next()).map(str::to_owned)
    } else if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        Some(v.into_owned())
    } else {
        let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
        match segments.as_slice() {
            ["shorts" | "embed" | "live" | "v", id, ..] => Some(id.to_string()),
            _ => None,
        }
    };

    match video_id.filter(|id| !id.is_empty()) {
        Some(id) => Ok(QueryKind::Video(id)),
        None => Err(ResolveError::Unsupported(query.to_string())),
    }
}

/// [`MetadataResolver`] over a YouTube backend, throttled and memoized.
pub struct QueryResolver {
    backend: Arc<dyn YouTubeBackend>,
    throttle: Arc<RequestThrottle>,
    cache: KeyValueCache,
    retry: RetryPolicy,
    spotify: Option<Arc<dyn SpotifyBackend>>,
}

impl QueryResolver {
    pub fn new(
        backend: Arc<dyn YouTubeBackend>,
        throttle: Arc<RequestThrottle>,
        cache: KeyValueCache,
    ) -> Self {
        Self {
            backend,
            throttle,
            cache,
            retry: RetryPolicy::default(),
            spotify: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enables Spotify links.
    pub fn with_spotify(mut self, spotify: Arc<dyn SpotifyBackend>) -> Self {
        self.spotify = Some(spotify);
        self
    }

    async fn search(&self, query: &str) -> Result<Option<VideoInfo>, ProviderError> {
        let backend = self.backend.clone();
        self.cache
            .memoize(&format!("youtube_search:{query}"), ONE_HOUR, || {
                self.throttle
                    .submit_with_retry(self.retry, move || {
                        let backend = backend.clone();
                        let query = query.to_string();
                        async move { backend.search(&query).await }
                    })
            })
            .await
    }

    async fn video(&self, id: &str) -> Result<Option<VideoInfo>, ProviderError> {
        let backend = self.backend.clone();
        self.cache
            .memoize(&format!("youtube_video:{id}"), ONE_HOUR, || {
                self.throttle.submit_with_retry(self.retry, move || {
                    let backend = backend.clone();
                    let id = id.to_string();
                    async move { backend.video(&id).await }
                })
            })
            .await
    }

    async fn playlist(
        &self,
        id: &str,
        limit: usize,
    ) -> Result<Option<super::youtube::PlaylistInfo>, ProviderError> {
        let backend = self.backend.clone();
        self.cache
            .memoize(&format!("youtube_playlist:{id}:{limit}"), TEN_MINUTES, || {
                self.throttle.submit_with_retry(self.retry, move || {
                    let backend = backend.clone();
                    let id = id.to_string();
                    async move { backend.playlist(&id, limit).await }
                })
            })
            .await
    }

    async fn spotify_collection(
        &self,
        spotify: Arc<dyn SpotifyBackend>,
        kind: SpotifyKind,
        id: &str,
    ) -> Result<Option<SpotifyCollection>, ProviderError> {
        self.cache
            .memoize(&format!("spotify_{kind}:{id}"), TEN_MINUTES, || {
                self.throttle.submit_with_retry(self.retry, move || {
                    let spotify = spotify.clone();
                    let id = id.to_string();
                    async move { spotify.collection(kind, &id).await }
                })
            })
            .await
    }

    /// Lists the songs behind a Spotify link and finds each one on YouTube.
    ///
    /// Collections over the playlist limit are randomly sampled; songs
    /// without a YouTube match are counted in the advisory.
    async fn resolve_spotify(
        &self,
        kind: SpotifyKind,
        id: &str,
        query: &str,
        options: ResolveOptions,
    ) -> Result<ResolvedQuery, ResolveError> {
        let spotify = self.spotify.clone().ok_or(ResolveError::NotConfigured("Spotify"))?;
        let collection = self
            .spotify_collection(spotify, kind, id)
            .await?
            .filter(|c| !c.tracks.is_empty())
            .ok_or_else(|| ResolveError::NothingFound(query.to_string()))?;

        let total = collection.tracks.len();
        let limit = options.playlist_limit.max(1);
        let mut songs = collection.tracks;
        if total > limit {
            songs.shuffle(&mut rand::thread_rng());
            songs.truncate(limit);
        }

        let label = (kind != SpotifyKind::Track).then(|| PlaylistRef {
            title: collection.title.clone(),
            source: format!("spotify:{kind}:{id}"),
        });

        let searches = join_all(songs.iter().map(|song| self.search_song(song.search_query()))).await;
        let mut missing = 0;
        let mut tracks = Vec::with_capacity(searches.len());
        for video in searches {
            match video {
                // Los capítulos no aplican a canciones buscadas
                Some(video) => tracks.extend(video_tracks(video, label.as_ref(), false)),
                None => missing += 1,
            }
        }

        if tracks.is_empty() {
            return Err(ResolveError::NothingFound(query.to_string()));
        }

        Ok(ResolvedQuery {
            tracks,
            advisory: spotify_advisory(total, limit, missing),
        })
    }

    async fn search_song(&self, search: String) -> Option<VideoInfo> {
        match self.search(&search).await {
            Ok(video) => video,
            Err(e) => {
                warn!("⚠️ Error buscando {} en YouTube: {}", search, e);
                None
            }
        }
    }
}

fn spotify_advisory(total: usize, limit: usize, missing: usize) -> Option<String> {
    let mut notes = Vec::new();
    if total > limit {
        notes.push(format!("a random sample of {limit} songs was taken"));
    }
    match missing {
        0 => {}
        1 => notes.push("1 song was not found".to_string()),
        n => notes.push(format!("{n} songs were not found")),
    }
    (!notes.is_empty()).then(|| notes.join(" and "))
}

/// Expands a video into queue entries, one per chapter when requested.
fn video_tracks(video: VideoInfo, playlist: Option<&PlaylistRef>, split_chapters: bool) -> Vec<TrackMetadata> {
    let base = TrackMetadata {
        title: video.title.clone(),
        artist: video.channel.clone(),
        locator: video.id.clone(),
        duration: video.duration,
        start_offset: 0,
        is_live: video.is_live,
        thumbnail: video.thumbnail.clone(),
        playlist: playlist.cloned(),
        source: MediaSource::YouTube,
    };

    if !split_chapters || video.is_live {
        return vec![base];
    }

    let chapters: Vec<Chapter> = if video.chapters.len() >= 2 {
        video.chapters.clone()
    } else {
        video
            .description
            .as_deref()
            .map(|d| chapters::parse_from_description(d, video.duration))
            .unwrap_or_default()
    };

    if chapters.is_empty() {
        return vec![base];
    }

    chapters
        .into_iter()
        .map(|chapter| TrackMetadata {
            title: format!("{} ({})", chapter.title, base.title),
            start_offset: chapter.offset,
            duration: chapter.length,
            ..base.clone()
        })
        .collect()
}

fn stream_track(url: &str) -> TrackMetadata {
    TrackMetadata {
        title: url.to_string(),
        artist: url.to_string(),
        locator: url.to_string(),
        duration: 0,
        start_offset: 0,
        is_live: true,
        thumbnail: None,
        playlist: None,
        source: MediaSource::Http,
    }
}

#[async_trait]
impl MetadataResolver for QueryResolver {
    async fn resolve(&self, query: &str, options: ResolveOptions) -> Result<ResolvedQuery, ResolveError> {
        let kind = classify(query)?;
        debug!("🔎 Resolviendo {:?}", kind);

        let resolved = match kind {
            QueryKind::Search(text) => {
                let video = self
                    .search(&text)
                    .await?
                    .ok_or_else(|| ResolveError::NothingFound(text.clone()))?;
                ResolvedQuery {
                    tracks: video_tracks(video, None, options.split_chapters),
                    advisory: None,
                }
            }
            QueryKind::Video(id) => {
                let video = self
                    .video(&id)
                    .await?
                    .ok_or_else(|| ResolveError::NothingFound(query.to_string()))?;
                ResolvedQuery {
                    tracks: video_tracks(video, None, options.split_chapters),
                    advisory: None,
                }
            }
            QueryKind::Playlist(id) => {
                let limit = options.playlist_limit.max(1);
                let playlist = self
                    .playlist(&id, limit)
                    .await?
                    .filter(|p| !p.videos.is_empty())
                    .ok_or_else(|| ResolveError::NothingFound(query.to_string()))?;

                let label = PlaylistRef {
                    title: playlist.title.clone(),
                    source: playlist.id.clone(),
                };
                let advisory = (playlist.total > limit)
                    .then(|| format!("only the first {limit} of {} songs were added", playlist.total));

                let tracks = playlist
                    .videos
                    .into_iter()
                    .take(limit)
                    .flat_map(|video| video_tracks(video, Some(&label), options.split_chapters))
                    .collect();

                ResolvedQuery { tracks, advisory }
            }
            QueryKind::Spotify(kind, id) => self.resolve_spotify(kind, &id, query, options).await?,
            QueryKind::Stream(url) => ResolvedQuery {
                tracks: vec![stream_track(&url)],
                advisory: None,
            },
        };

        info!("✅ {} pistas resueltas para {:?}", resolved.tracks.len(), query);
        Ok(resolved)
    }
}

/// [`StreamResolver`] backed by yt-dlp, memoized for ten minutes.
pub struct CachedStreamResolver {
    ytdlp: Arc<YtDlpClient>,
    throttle: Arc<RequestThrottle>,
    cache: KeyValueCache,
}

impl CachedStreamResolver {
    pub fn new(ytdlp: Arc<YtDlpClient>, throttle: Arc<RequestThrottle>, cache: KeyValueCache) -> Self {
        Self {
            ytdlp,
            throttle,
            cache,
        }
    }
}

#[async_trait]
impl StreamResolver for CachedStreamResolver {
    async fn stream_url(&self, track: &TrackMetadata) -> Result<String, ProviderError> {
        if track.source == MediaSource::Http {
            return Ok(track.locator.clone());
        }

        let page_url = track.page_url();
        let ytdlp = self.ytdlp.clone();
        self.cache
            .memoize(&format!("stream_url:{}", track.locator), TEN_MINUTES, || {
                self.throttle
                    .submit_with_retry(RetryPolicy::default(), move || {
                        let ytdlp = ytdlp.clone();
                        let page_url = page_url.clone();
                        async move { ytdlp.stream_url(&page_url).await }
                    })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::sources::youtube::PlaylistInfo;
    use crate::storage::KeyValueRecords;
    use mockall::mock;
    use pretty_assertions::assert_eq;

    mock! {
        Backend {}

        #[async_trait]
        impl YouTubeBackend for Backend {
            async fn search(&self, query: &str) -> Result<Option<VideoInfo>, ProviderError>;
            async fn video(&self, id: &str) -> Result<Option<VideoInfo>, ProviderError>;
            async fn playlist(&self, id: &str, limit: usize) -> Result<Option<PlaylistInfo>, ProviderError>;
        }
    }

    mock! {
        Spotify {}

        #[async_trait]
        impl SpotifyBackend for Spotify {
            async fn collection(&self, kind: SpotifyKind, id: &str) -> Result<Option<SpotifyCollection>, ProviderError>;
        }
    }

    fn song(name: &str) -> crate::sources::spotify::SpotifyTrack {
        crate::sources::spotify::SpotifyTrack {
            name: name.into(),
            artist: "Band".into(),
        }
    }

    fn video(id: &str, duration: u64) -> VideoInfo {
        VideoInfo {
            id: id.into(),
            title: format!("Video {id}"),
            channel: "Channel".into(),
            duration,
            is_live: false,
            thumbnail: None,
            description: None,
            chapters: Vec::new(),
        }
    }

    fn resolver(backend: MockBackend) -> QueryResolver {
        QueryResolver::new(
            Arc::new(backend),
            Arc::new(RequestThrottle::new(2)),
            KeyValueCache::new(Arc::new(KeyValueRecords::in_memory())),
        )
    }

    #[test]
    fn classifies_queries() {
        assert_eq!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10").unwrap(),
            QueryKind::Video("dQw4w9WgXcQ".into())
        );
        assert_eq!(
            classify("https://youtu.be/dQw4w9WgXcQ").unwrap(),
            QueryKind::Video("dQw4w9WgXcQ".into())
        );
        assert_eq!(
            classify("https://www.youtube.com/watch?v=abc&list=PL123").unwrap(),
            QueryKind::Playlist("PL123".into())
        );
        assert_eq!(
            classify("https://radio.example/live.m3u8").unwrap(),
            QueryKind::Stream("https://radio.example/live.m3u8".into())
        );
        assert_eq!(
            classify("  daft punk  ").unwrap(),
            QueryKind::Search("daft punk".into())
        );
        assert_eq!(
            classify("https://open.spotify.com/album/1DFix?si=x").unwrap(),
            QueryKind::Spotify(SpotifyKind::Album, "1DFix".into())
        );
        assert_eq!(
            classify("spotify:track:4uLU").unwrap(),
            QueryKind::Spotify(SpotifyKind::Track, "4uLU".into())
        );
        assert!(classify("https://open.spotify.com/episode/abc").is_err());
        assert!(classify("ftp://files.example/song.mp3").is_err());
        assert!(classify("https://www.youtube.com/feed/trending").is_err());
    }

    #[tokio::test]
    async fn search_is_memoized() {
        let mut backend = MockBackend::new();
        backend
            .expect_search()
            .times(1)
            .returning(|_| Ok(Some(video("abc", 200))));

        let resolver = resolver(backend);
        for _ in 0..2 {
            let resolved = resolver.resolve("lofi", ResolveOptions::default()).await.unwrap();
            assert_eq!(resolved.tracks.len(), 1);
            assert_eq!(resolved.tracks[0].locator, "abc");
        }
    }

    #[tokio::test]
    async fn empty_search_is_nothing_found() {
        let mut backend = MockBackend::new();
        backend.expect_search().returning(|_| Ok(None));

        let err = resolver(backend)
            .resolve("zzzz", ResolveOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::NothingFound("zzzz".into()));
    }

    #[tokio::test]
    async fn playlists_are_labelled_and_truncated() {
        let mut backend = MockBackend::new();
        backend
            .expect_playlist()
            .withf(|id, limit| id.to_string() == "PL1" && *limit == 2)
            .returning(|id, _| {
                Ok(Some(PlaylistInfo {
                    id: id.to_string(),
                    title: "Mix".into(),
                    videos: vec![video("a", 10), video("b", 20)],
                    total: 5,
                }))
            });

        let options = ResolveOptions {
            playlist_limit: 2,
            split_chapters: false,
        };
        let resolved = resolver(backend)
            .resolve("https://www.youtube.com/playlist?list=PL1", options)
            .await
            .unwrap();

        assert_eq!(resolved.tracks.len(), 2);
        assert!(resolved.tracks.iter().all(|t| t.playlist.as_ref().map(|p| p.title.as_str()) == Some("Mix")));
        assert_eq!(
            resolved.advisory.as_deref(),
            Some("only the first 2 of 5 songs were added")
        );
    }

    #[tokio::test]
    async fn videos_split_into_chapters_on_request() {
        let mut backend = MockBackend::new();
        backend.expect_video().returning(|id| {
            let mut v = video(id, 300);
            v.description = Some("0:00 Opening\n2:00 Closing".into());
            Ok(Some(v))
        });

        let options = ResolveOptions {
            playlist_limit: 50,
            split_chapters: true,
        };
        let resolved = resolver(backend)
            .resolve("https://youtu.be/xyz", options)
            .await
            .unwrap();

        assert_eq!(resolved.tracks.len(), 2);
        assert_eq!(resolved.tracks[1].title, "Closing (Video xyz)");
        assert_eq!(resolved.tracks[1].start_offset, 120);
        assert_eq!(resolved.tracks[1].duration, 180);
    }

    #[tokio::test]
    async fn http_streams_skip_the_backend() {
        let resolved = resolver(MockBackend::new())
            .resolve("https://radio.example/live", ResolveOptions::default())
            .await
            .unwrap();

        let track = &resolved.tracks[0];
        assert!(track.is_live);
        assert_eq!(track.source, MediaSource::Http);
        assert_eq!(track.duration, 0);
    }

    #[tokio::test]
    async fn provider_failures_surface() {
        let mut backend = MockBackend::new();
        backend
            .expect_video()
            .times(1)
            .returning(|_| Err(ProviderError::Fatal("quota".into())));

        let err = resolver(backend)
            .resolve("https://youtu.be/abc", ResolveOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::Provider(ProviderError::Fatal("quota".into())));
    }

    #[tokio::test]
    async fn spotify_links_need_credentials() {
        let err = resolver(MockBackend::new())
            .resolve("https://open.spotify.com/track/abc", ResolveOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::NotConfigured("Spotify"));
    }

    #[tokio::test]
    async fn spotify_albums_become_labelled_youtube_searches() {
        let mut spotify = MockSpotify::new();
        spotify
            .expect_collection()
            .withf(|kind, id| *kind == SpotifyKind::Album && id.to_string() == "AL1")
            .times(1)
            .returning(|_, _| {
                Ok(Some(SpotifyCollection {
                    title: "Discovery".into(),
                    tracks: vec![song("One More Time"), song("Missing"), song("Aerodynamic")],
                }))
            });

        let mut backend = MockBackend::new();
        backend.expect_search().returning(|query| {
            if query.contains("Missing") {
                return Ok(None);
            }
            let id = if query.contains("One More Time") { "omt" } else { "aero" };
            Ok(Some(video(id, 240)))
        });

        let resolver = resolver(backend).with_spotify(Arc::new(spotify));
        let resolved = resolver
            .resolve("https://open.spotify.com/album/AL1", ResolveOptions::default())
            .await
            .unwrap();

        let locators: Vec<&str> = resolved.tracks.iter().map(|t| t.locator.as_str()).collect();
        assert_eq!(locators, vec!["omt", "aero"]);
        let label = resolved.tracks[0].playlist.as_ref().unwrap();
        assert_eq!(label.title, "Discovery");
        assert_eq!(label.source, "spotify:album:AL1");
        assert_eq!(resolved.advisory.as_deref(), Some("1 song was not found"));
    }

    #[tokio::test]
    async fn large_spotify_playlists_are_sampled() {
        let mut spotify = MockSpotify::new();
        spotify.expect_collection().returning(|_, _| {
            Ok(Some(SpotifyCollection {
                title: "Huge".into(),
                tracks: (0..10).map(|i| song(&format!("s{i}"))).collect(),
            }))
        });
        let mut backend = MockBackend::new();
        backend
            .expect_search()
            .times(3)
            .returning(|query| Ok(Some(video(query, 100))));

        let options = ResolveOptions {
            playlist_limit: 3,
            split_chapters: false,
        };
        let resolved = resolver(backend)
            .with_spotify(Arc::new(spotify))
            .resolve("spotify:playlist:PL9", options)
            .await
            .unwrap();

        assert_eq!(resolved.tracks.len(), 3);
        assert_eq!(
            resolved.advisory.as_deref(),
            Some("a random sample of 3 songs was taken")
        );
    }

    #[test]
    fn spotify_advisory_joins_notes() {
        assert_eq!(spotify_advisory(5, 10, 0), None);
        assert_eq!(
            spotify_advisory(20, 10, 2).as_deref(),
            Some("a random sample of 10 songs was taken and 2 songs were not found")
        );
    }
}
