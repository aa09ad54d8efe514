use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::JsonFile;

/// Per-guild settings, stored as `servers/guild_<id>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildSettings {
    pub guild_id: u64,
    pub playlist_limit: usize,
    /// Idle-disconnect delay once the queue runs out (0 = never).
    pub seconds_to_wait_after_queue_empties: u64,
    pub leave_if_no_listeners: bool,
    pub queue_add_response_ephemeral: bool,
    pub auto_announce_next_song: bool,
    pub default_volume: u8,
    pub default_queue_page_size: usize,
    pub turn_down_volume_when_people_speak: bool,
    pub turn_down_volume_when_people_speak_target: u8,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            guild_id: 0,
            playlist_limit: 50,
            seconds_to_wait_after_queue_empties: 30,
            leave_if_no_listeners: true,
            queue_add_response_ephemeral: false,
            auto_announce_next_song: false,
            default_volume: 100,
            default_queue_page_size: 10,
            turn_down_volume_when_people_speak: false,
            turn_down_volume_when_people_speak_target: 20,
        }
    }
}

impl GuildSettings {
    pub fn for_guild(guild_id: u64) -> Self {
        Self {
            guild_id,
            ..Self::default()
        }
    }
}

/// Read side used by the playback engine; the command layer also updates.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Returns the guild's settings, creating defaults on first read.
    async fn guild_settings(&self, guild_id: u64) -> Result<GuildSettings>;

    async fn update_guild_settings(&self, settings: GuildSettings) -> Result<()>;
}

/// Manager de almacenamiento basado en archivos JSON
pub struct JsonStorage {
    data_dir: PathBuf,
    servers_cache: Mutex<HashMap<u64, GuildSettings>>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        let servers_dir = data_dir.join("servers");
        fs::create_dir_all(&servers_dir).await?;

        info!("📁 Storage inicializado en: {}", data_dir.display());

        let storage = Self {
            data_dir,
            servers_cache: Mutex::new(HashMap::new()),
        };

        storage.load_all_servers().await?;

        Ok(storage)
    }

    /// Guild ids with settings on disk or in memory.
    pub async fn list_servers(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.servers_cache.lock().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    async fn load_all_servers(&self) -> Result<()> {
        let servers_dir = self.data_dir.join("servers");
        let mut files = fs::read_dir(&servers_dir).await?;
        let mut cache = self.servers_cache.lock().await;
        let mut loaded_count = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let Some(guild_id) = path
                .file_stem()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("guild_"))
                .and_then(|id| id.parse::<u64>().ok())
            else {
                continue;
            };

            match JsonFile::new(&path).load::<GuildSettings>().await {
                Ok(Some(settings)) => {
                    cache.insert(guild_id, settings);
                    loaded_count += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("⚠️ Error cargando configuración para guild {}: {}", guild_id, e);
                }
            }
        }

        if loaded_count > 0 {
            info!("📂 Cargadas {} configuraciones de servidor", loaded_count);
        }

        Ok(())
    }

    fn server_file(&self, guild_id: u64) -> JsonFile {
        JsonFile::new(
            self.data_dir
                .join("servers")
                .join(format!("guild_{}.json", guild_id)),
        )
    }
}

#[async_trait]
impl SettingsStore for JsonStorage {
    async fn guild_settings(&self, guild_id: u64) -> Result<GuildSettings> {
        let mut cache = self.servers_cache.lock().await;
        if let Some(settings) = cache.get(&guild_id) {
            return Ok(settings.clone());
        }

        let settings = GuildSettings::for_guild(guild_id);
        self.server_file(guild_id).save(&settings).await?;
        cache.insert(guild_id, settings.clone());

        info!("📝 Configuración por defecto creada para guild {}", guild_id);
        Ok(settings)
    }

    async fn update_guild_settings(&self, settings: GuildSettings) -> Result<()> {
        let mut cache = self.servers_cache.lock().await;
        self.server_file(settings.guild_id).save(&settings).await?;

        info!("💾 Configuración actualizada para guild {}", settings.guild_id);
        cache.insert(settings.guild_id, settings);
        Ok(())
    }
}
