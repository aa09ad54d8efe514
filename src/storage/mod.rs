//! # Durable storage
//!
//! Hertz keeps its state in plain JSON documents under `DATA_DIR`:
//!
//! ```text
//! data/
//! ├── servers/guild_<id>.json   per-guild settings (settings.rs)
//! ├── favorites/guild_<id>.json saved queries (favorites.rs)
//! ├── file_caches.json          content cache registry (registry.rs)
//! └── key_value_caches.json     expiring provider responses (key_value.rs)
//! ```
//!
//! Every document goes through [`JsonFile`], which writes to a sibling
//! `.tmp` file and renames it into place so a crash never leaves a
//! truncated document behind.

pub mod favorites;
pub mod key_value;
pub mod registry;
pub mod settings;

pub use favorites::{Favorite, FavoritesStore, JsonFavorites};
pub use key_value::{KeyValueRecord, KeyValueRecords};
pub use registry::{CacheRecord, CacheRegistry, JsonCacheRegistry};
pub use settings::{GuildSettings, JsonStorage, SettingsStore};

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// A serde_json document on disk.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document, or `None` when the file does not exist yet.
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => {
                let value = serde_json::from_str(&content)
                    .with_context(|| format!("parsing {}", self.path.display()))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    /// Writes the document atomically (tmp file + rename).
    pub async fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(value)?;
        let tmp_path = self.path.with_extension("json.tmp");

        fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;

        Ok(())
    }
}
