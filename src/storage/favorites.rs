use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::info;

use super::JsonFile;
use crate::error::FavoriteError;

/// A named query saved by a guild member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub name: String,
    pub query: String,
    pub author_id: u64,
    pub created_at: DateTime<Utc>,
}

impl Favorite {
    pub fn new(name: impl Into<String>, query: impl Into<String>, author_id: u64) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            author_id,
            created_at: Utc::now(),
        }
    }
}

/// Per-guild saved queries.
#[async_trait]
pub trait FavoritesStore: Send + Sync {
    /// Ordered by creation time.
    async fn list(&self, guild_id: u64) -> Result<Vec<Favorite>, FavoriteError>;

    async fn get(&self, guild_id: u64, name: &str) -> Result<Option<Favorite>, FavoriteError>;

    /// Fails when the guild already has a favorite with that name.
    async fn create(&self, guild_id: u64, favorite: Favorite) -> Result<(), FavoriteError>;

    /// Only the author or a guild owner (`privileged`) may remove.
    async fn remove(
        &self,
        guild_id: u64,
        name: &str,
        requester: u64,
        privileged: bool,
    ) -> Result<Favorite, FavoriteError>;
}

/// Favoritos en `favorites/guild_<id>.json`, cargados bajo demanda
pub struct JsonFavorites {
    dir: PathBuf,
    guilds: Mutex<HashMap<u64, Vec<Favorite>>>,
}

impl JsonFavorites {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            dir: data_dir.join("favorites"),
            guilds: Mutex::new(HashMap::new()),
        }
    }

    fn file(&self, guild_id: u64) -> JsonFile {
        JsonFile::new(self.dir.join(format!("guild_{}.json", guild_id)))
    }

    async fn with_guild<T>(
        &self,
        guild_id: u64,
        edit: impl FnOnce(&mut Vec<Favorite>) -> Result<T, FavoriteError>,
    ) -> Result<T, FavoriteError> {
        let mut guilds = self.guilds.lock().await;
        let favorites = match guilds.entry(guild_id) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let loaded = self.file(guild_id).load::<Vec<Favorite>>().await?;
                entry.insert(loaded.unwrap_or_default())
            }
        };

        let before = favorites.clone();
        let result = edit(favorites)?;
        if *favorites != before {
            self.file(guild_id).save(favorites).await?;
        }
        Ok(result)
    }
}

#[async_trait]
impl FavoritesStore for JsonFavorites {
    async fn list(&self, guild_id: u64) -> Result<Vec<Favorite>, FavoriteError> {
        self.with_guild(guild_id, |favorites| Ok(favorites.clone())).await
    }

    async fn get(&self, guild_id: u64, name: &str) -> Result<Option<Favorite>, FavoriteError> {
        self.with_guild(guild_id, |favorites| {
            Ok(favorites.iter().find(|f| f.name == name).cloned())
        })
        .await
    }

    async fn create(&self, guild_id: u64, favorite: Favorite) -> Result<(), FavoriteError> {
        let name = favorite.name.clone();
        self.with_guild(guild_id, |favorites| {
            if favorites.iter().any(|f| f.name == favorite.name) {
                return Err(FavoriteError::AlreadyExists(favorite.name));
            }
            favorites.push(favorite);
            Ok(())
        })
        .await?;

        info!("💾 Favorito '{}' guardado en guild {}", name, guild_id);
        Ok(())
    }

    async fn remove(
        &self,
        guild_id: u64,
        name: &str,
        requester: u64,
        privileged: bool,
    ) -> Result<Favorite, FavoriteError> {
        let removed = self
            .with_guild(guild_id, |favorites| {
                let index = favorites
                    .iter()
                    .position(|f| f.name == name)
                    .ok_or_else(|| FavoriteError::NotFound(name.to_string()))?;
                if favorites[index].author_id != requester && !privileged {
                    return Err(FavoriteError::NotAuthor);
                }
                Ok(favorites.remove(index))
            })
            .await?;

        info!("🗑️ Favorito '{}' eliminado en guild {}", name, guild_id);
        Ok(removed)
    }
}
