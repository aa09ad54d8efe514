use async_process::Command;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::chapters::Chapter;
use crate::error::ProviderError;

/// Video metadata as returned by either YouTube backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub duration: u64,
    pub is_live: bool,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    /// Chapters reported by the provider itself, if any.
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub id: String,
    pub title: String,
    pub videos: Vec<VideoInfo>,
    /// Item count before truncation to the requested limit.
    pub total: usize,
}

/// Raw YouTube lookups. Callers add throttling, retries and memoization.
#[async_trait]
pub trait YouTubeBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Option<VideoInfo>, ProviderError>;

    async fn video(&self, id: &str) -> Result<Option<VideoInfo>, ProviderError>;

    async fn playlist(&self, id: &str, limit: usize) -> Result<Option<PlaylistInfo>, ProviderError>;
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: String,
    #[serde(default)]
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    thumbnail: Option<String>,
    description: Option<String>,
    is_live: Option<bool>,
    live_status: Option<String>,
    #[serde(default)]
    chapters: Option<Vec<YtDlpChapter>>,
    playlist_title: Option<String>,
    playlist_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct YtDlpChapter {
    start_time: f64,
    end_time: f64,
    title: String,
}

impl From<YtDlpInfo> for VideoInfo {
    fn from(info: YtDlpInfo) -> Self {
        let is_live = info.is_live.unwrap_or(false)
            || matches!(info.live_status.as_deref(), Some("is_live" | "is_upcoming"));

        Self {
            title: info.title.unwrap_or_else(|| info.id.clone()),
            channel: info.channel.or(info.uploader).unwrap_or_default(),
            duration: if is_live {
                0
            } else {
                info.duration.unwrap_or(0.0).max(0.0) as u64
            },
            is_live,
            thumbnail: info.thumbnail,
            description: info.description,
            chapters: info
                .chapters
                .unwrap_or_default()
                .into_iter()
                .map(|c| Chapter {
                    title: c.title,
                    offset: c.start_time.max(0.0) as u64,
                    length: (c.end_time - c.start_time).max(0.0) as u64,
                })
                .collect(),
            id: info.id,
        }
    }
}

/// Cliente para interactuar con YouTube vía yt-dlp
pub struct YtDlpClient {
    binary: String,
}

impl Default for YtDlpClient {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlpClient {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ProviderError> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| ProviderError::Fatal(format!("Error al ejecutar yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Obtiene la URL de streaming de audio
    pub async fn stream_url(&self, page_url: &str) -> Result<String, ProviderError> {
        debug!("🎵 Obteniendo URL de stream para: {}", page_url);

        let stdout = self
            .run(&[
                "--no-playlist",
                "-f",
                "bestaudio/best",
                "--get-url",
                "--no-warnings",
                page_url,
            ])
            .await?;

        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| ProviderError::NotFound(format!("sin URL de stream para {page_url}")))
    }
}

/// Maps yt-dlp's stderr to a provider error class.
fn classify_failure(stderr: &str) -> ProviderError {
    let lowered = stderr.to_lowercase();
    if lowered.contains("429") || lowered.contains("too many requests") {
        ProviderError::RateLimited { retry_after: None }
    } else if lowered.contains("video unavailable")
        || lowered.contains("private video")
        || lowered.contains("does not exist")
        || lowered.contains("not available")
    {
        ProviderError::NotFound(stderr.trim().to_string())
    } else if lowered.contains("timed out") || lowered.contains("connection") {
        ProviderError::Transient(stderr.trim().to_string())
    } else {
        ProviderError::Fatal(format!("yt-dlp error: {}", stderr.trim()))
    }
}

fn parse_lines(stdout: &str) -> Vec<YtDlpInfo> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpInfo>(line) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!("⚠️ Línea de yt-dlp ignorada: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl YouTubeBackend for YtDlpClient {
    async fn search(&self, query: &str) -> Result<Option<VideoInfo>, ProviderError> {
        info!("🔍 Buscando en YouTube: {}", query);

        let search_query = format!("ytsearch1:{}", query);
        let stdout = self
            .run(&["--no-playlist", "--dump-json", "--no-warnings", &search_query])
            .await?;

        Ok(parse_lines(&stdout).into_iter().next().map(VideoInfo::from))
    }

    async fn video(&self, id: &str) -> Result<Option<VideoInfo>, ProviderError> {
        debug!("📊 Obteniendo info de: {}", id);

        let url = format!("https://www.youtube.com/watch?v={id}");
        match self
            .run(&["--no-playlist", "--dump-json", "--no-warnings", &url])
            .await
        {
            Ok(stdout) => Ok(parse_lines(&stdout).into_iter().next().map(VideoInfo::from)),
            Err(ProviderError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn playlist(&self, id: &str, limit: usize) -> Result<Option<PlaylistInfo>, ProviderError> {
        info!("📋 Obteniendo playlist: {}", id);

        let url = format!("https://www.youtube.com/playlist?list={id}");
        // Se pide un elemento extra para detectar truncamiento
        let end = (limit + 1).to_string();
        let stdout = match self
            .run(&[
                "--flat-playlist",
                "--dump-json",
                "--playlist-end",
                &end,
                "--no-warnings",
                &url,
            ])
            .await
        {
            Ok(stdout) => stdout,
            Err(ProviderError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let entries = parse_lines(&stdout);
        let Some(first) = entries.first() else {
            return Ok(None);
        };

        let title = first.playlist_title.clone().unwrap_or_else(|| id.to_string());
        let reported = first.playlist_count;
        let fetched = entries.len();
        let videos: Vec<VideoInfo> = entries.into_iter().take(limit).map(VideoInfo::from).collect();

        Ok(Some(PlaylistInfo {
            id: id.to_string(),
            title,
            total: reported.unwrap_or(fetched).max(fetched),
            videos,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn converts_dump_json_lines() {
        let stdout = r#"{"id":"abc","title":"Song","duration":215.4,"uploader":"Up","channel":"Chan","thumbnail":"t.jpg","chapters":[{"start_time":0.0,"end_time":100.0,"title":"A"}]}
not json
{"id":"live1","title":"Radio","live_status":"is_live","duration":null}"#;

        let infos: Vec<VideoInfo> = parse_lines(stdout).into_iter().map(VideoInfo::from).collect();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].channel, "Chan");
        assert_eq!(infos[0].duration, 215);
        assert_eq!(infos[0].chapters[0].length, 100);
        assert!(infos[1].is_live);
        assert_eq!(infos[1].duration, 0);
    }

    #[test]
    fn classifies_failures() {
        assert_eq!(
            classify_failure("ERROR: HTTP Error 429: Too Many Requests"),
            ProviderError::RateLimited { retry_after: None }
        );
        assert!(matches!(
            classify_failure("ERROR: [youtube] x: Video unavailable"),
            ProviderError::NotFound(_)
        ));
        assert!(classify_failure("ERROR: read timed out").is_retryable());
        assert!(matches!(classify_failure("ERROR: boom"), ProviderError::Fatal(_)));
    }
}
