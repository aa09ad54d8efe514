use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use super::youtube::{PlaylistInfo, VideoInfo, YouTubeBackend};
use crate::error::ProviderError;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
/// Máximo permitido por la API
const PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
    #[serde(rename = "pageInfo")]
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(rename = "totalResults")]
    total_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    title: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "liveBroadcastContent")]
    live_broadcast_content: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: PlaylistSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    #[serde(rename = "contentDetails")]
    content_details: PlaylistEntryDetails,
}

#[derive(Debug, Deserialize)]
struct PlaylistEntryDetails {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

impl From<VideoItem> for VideoInfo {
    fn from(video: VideoItem) -> Self {
        let is_live = matches!(
            video.snippet.live_broadcast_content.as_deref(),
            Some("live" | "upcoming")
        );
        let thumbnails = video.snippet.thumbnails;

        Self {
            id: video.id,
            title: video.snippet.title,
            channel: video.snippet.channel_title,
            duration: if is_live {
                0
            } else {
                parse_iso8601_duration(&video.content_details.duration)
            },
            is_live,
            thumbnail: thumbnails.medium.or(thumbnails.default).map(|t| t.url),
            description: Some(video.snippet.description).filter(|d| !d.is_empty()),
            chapters: Vec::new(),
        }
    }
}

/// YouTube Data API v3 backend (requires `YOUTUBE_API_KEY`).
pub struct YouTubeApiClient {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl YouTubeApiClient {
    pub fn new(api_key: String, client: reqwest::Client) -> Self {
        Self {
            api_key,
            client,
            base_url: API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get<T>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoInfo>, ProviderError> {
        let mut videos = Vec::with_capacity(ids.len());
        for batch in ids.chunks(PAGE_SIZE) {
            let joined = batch.join(",");
            let page: ListResponse<VideoItem> = self
                .get("videos", &[("part", "snippet,contentDetails"), ("id", &joined)])
                .await?;
            videos.extend(page.items.into_iter().map(VideoInfo::from));
        }
        Ok(videos)
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
    error!("❌ YouTube API error: {} - {}", status, body);

    Err(status_error(status, retry_after, body))
}

fn status_error(status: StatusCode, retry_after: Option<Duration>, body: String) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after },
        StatusCode::NOT_FOUND => ProviderError::NotFound(body),
        s if s.is_server_error() => ProviderError::Transient(format!("YouTube API {s}")),
        s => ProviderError::Fatal(format!("YouTube API {s}: {body}")),
    }
}

/// `PT1H2M3S` → 3723. Unknown input parses as 0.
pub fn parse_iso8601_duration(raw: &str) -> u64 {
    let mut total = 0u64;
    let mut number = 0u64;
    let mut in_time = false;

    for ch in raw.chars() {
        match ch {
            'P' => {}
            'T' => in_time = true,
            '0'..='9' => number = number * 10 + u64::from(ch as u8 - b'0'),
            'D' => {
                total += number * 86_400;
                number = 0;
            }
            'H' if in_time => {
                total += number * 3_600;
                number = 0;
            }
            'M' if in_time => {
                total += number * 60;
                number = 0;
            }
            'S' if in_time => {
                total += number;
                number = 0;
            }
            _ => number = 0,
        }
    }

    total
}

#[async_trait]
impl YouTubeBackend for YouTubeApiClient {
    async fn search(&self, query: &str) -> Result<Option<VideoInfo>, ProviderError> {
        debug!("🔍 Búsqueda YouTube API v3: {}", query);

        let page: ListResponse<SearchItem> = self
            .get(
                "search",
                &[("part", "snippet"), ("maxResults", "1"), ("q", query), ("type", "video")],
            )
            .await?;

        let Some(id) = page.items.into_iter().find_map(|item| item.id.video_id) else {
            return Ok(None);
        };
        self.video(&id).await
    }

    async fn video(&self, id: &str) -> Result<Option<VideoInfo>, ProviderError> {
        Ok(self.videos(&[id.to_string()]).await?.into_iter().next())
    }

    async fn playlist(&self, id: &str, limit: usize) -> Result<Option<PlaylistInfo>, ProviderError> {
        let meta: ListResponse<PlaylistItem> =
            self.get("playlists", &[("part", "snippet"), ("id", id)]).await?;
        let Some(playlist) = meta.items.into_iter().next() else {
            return Ok(None);
        };

        let mut ids = Vec::new();
        let mut total = 0;
        let mut page_token: Option<String> = None;
        let page_size = PAGE_SIZE.to_string();

        loop {
            let mut params = vec![
                ("part", "contentDetails"),
                ("maxResults", page_size.as_str()),
                ("playlistId", id),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let page: ListResponse<PlaylistEntry> = self.get("playlistItems", &params).await?;
            total = page
                .page_info
                .and_then(|p| p.total_results)
                .unwrap_or(total);
            ids.extend(page.items.into_iter().filter_map(|e| e.content_details.video_id));

            match page.next_page_token {
                Some(token) if ids.len() < limit => page_token = Some(token),
                _ => break,
            }
        }

        let fetched = ids.len();
        ids.truncate(limit);
        let videos = self.videos(&ids).await?;
        info!("✅ YouTube API v3: playlist {} con {} videos", id, videos.len());

        Ok(Some(PlaylistInfo {
            id: id.to_string(),
            title: playlist.snippet.title,
            videos,
            total: total.max(fetched),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_iso8601_durations() {
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), 3723);
        assert_eq!(parse_iso8601_duration("PT4M"), 240);
        assert_eq!(parse_iso8601_duration("PT45S"), 45);
        assert_eq!(parse_iso8601_duration("P1DT1S"), 86_401);
        assert_eq!(parse_iso8601_duration("P0D"), 0);
        assert_eq!(parse_iso8601_duration(""), 0);
    }

    #[test]
    fn maps_statuses_to_provider_errors() {
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(7)), String::new()),
            ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );
        assert!(status_error(StatusCode::BAD_GATEWAY, None, String::new()).is_retryable());
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, None, "quotaExceeded".into()),
            ProviderError::Fatal(_)
        ));
    }

    #[test]
    fn converts_video_items() {
        let item: VideoItem = serde_json::from_str(
            r#"{
                "id": "abc",
                "snippet": {
                    "title": "Song",
                    "channelTitle": "Chan",
                    "description": "0:00 a\n1:00 b",
                    "liveBroadcastContent": "none",
                    "thumbnails": {"default": {"url": "d.jpg"}}
                },
                "contentDetails": {"duration": "PT3M30S"}
            }"#,
        )
        .unwrap();

        let info = VideoInfo::from(item);
        assert_eq!(info.duration, 210);
        assert_eq!(info.thumbnail.as_deref(), Some("d.jpg"));
        assert!(!info.is_live);
        assert!(info.description.is_some());
    }
}
