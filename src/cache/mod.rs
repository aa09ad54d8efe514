//! # Cache Module
//!
//! Two caches back the playback service:
//!
//! - [`ContentCache`]: downloaded track audio on disk, keyed by the
//!   SHA-256 of the source locator and bounded by `CACHE_LIMIT`. When the
//!   budget is exceeded the least recently *accessed* files go first.
//! - [`KeyValueCache`]: small TTL'd strings (provider responses, stream
//!   URLs) persisted in `key_value_caches.json`.
//!
//! ## Configuration
//!
//! ```env
//! CACHE_DIR=/data/cache     # one file per cached track, tmp/ for writes
//! CACHE_LIMIT=2GB           # size budget
//! EVICTION_BATCH_SIZE=10    # registry page size during eviction
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use hertz::cache::{cache_key_for, ContentCache, ContentCacheConfig};
//! use hertz::storage::JsonCacheRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = Arc::new(JsonCacheRegistry::open("/data/file_caches.json".as_ref()).await?);
//! let cache = ContentCache::new(ContentCacheConfig::new("/data/cache", 2 << 30), registry).await?;
//!
//! let key = cache_key_for("dQw4w9WgXcQ");
//! if let Some(path) = cache.resolve(&key).await? {
//!     println!("cached at {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod content;
pub mod downloader;
pub mod key_value;

pub use content::{cache_key_for, CacheStats, ContentCache, ContentCacheConfig, EvictionReport, OrphanReport};
pub use downloader::{HttpDownloader, TrackDownloader};
pub use key_value::{KeyValueCache, ONE_HOUR, ONE_MINUTE, TEN_MINUTES};
