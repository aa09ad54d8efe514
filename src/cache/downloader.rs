use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::CacheError;

/// Fetches a remote stream into a local file for the content cache.
#[async_trait]
pub trait TrackDownloader: Send + Sync {
    /// Writes the body of `url` to `dest`, returning the byte count.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, CacheError>;
}

/// Streams the response body to disk with `reqwest`.
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TrackDownloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, CacheError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CacheError::Download(e.to_string()))?;

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk: bytes::Bytes = chunk.map_err(|e| CacheError::Download(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;

        if written == 0 {
            return Err(CacheError::Download(format!("empty response from {url}")));
        }

        Ok(written)
    }
}
