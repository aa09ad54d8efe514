use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::Announcer;
use super::player::{Player, PlayerContext, PlayerOptions};
use super::transport::TransportFactory;
use crate::cache::{ContentCache, TrackDownloader};
use crate::sources::StreamResolver;
use crate::storage::SettingsStore;

/// Shared handle to one guild's engine.
pub type SharedPlayer = Arc<Mutex<Player>>;

struct Session {
    player: SharedPlayer,
    pump: JoinHandle<()>,
}

/// Everything a session needs except its voice transport.
#[derive(Clone)]
pub struct SessionServices {
    pub cache: Arc<ContentCache>,
    pub streams: Arc<dyn StreamResolver>,
    pub downloader: Arc<dyn TrackDownloader>,
    pub settings: Arc<dyn SettingsStore>,
    pub announcer: Arc<dyn Announcer>,
    pub options: PlayerOptions,
}

/// Registry of per-guild sessions, created on first use.
///
/// Each session gets a pump task that drains the engine's event stream and
/// applies every event under the session lock, so transport callbacks and
/// timers are serialized with user commands.
pub struct PlayerManager {
    sessions: DashMap<GuildId, Session>,
    transports: Arc<dyn TransportFactory>,
    services: SessionServices,
}

impl PlayerManager {
    pub fn new(services: SessionServices, transports: Arc<dyn TransportFactory>) -> Self {
        Self {
            sessions: DashMap::new(),
            transports,
            services,
        }
    }

    /// Obtiene o crea la sesión de un servidor
    pub fn get_or_create(&self, guild_id: GuildId) -> SharedPlayer {
        let entry = self.sessions.entry(guild_id).or_insert_with(|| {
            let services = self.services.clone();
            let ctx = PlayerContext {
                transport: self.transports.create(guild_id),
                cache: services.cache,
                streams: services.streams,
                downloader: services.downloader,
                settings: services.settings,
                announcer: services.announcer,
                options: services.options,
            };
            let (player, events) = Player::new(guild_id, ctx);
            let player = Arc::new(Mutex::new(player));

            let pump_player = Arc::clone(&player);
            let pump = tokio::spawn(async move {
                while let Ok(event) = events.recv_async().await {
                    pump_player.lock().await.handle_event(event).await;
                }
                debug!("[{}] Bomba de eventos terminada", guild_id);
            });

            info!("🎵 Nueva sesión de reproducción para guild {}", guild_id);
            Session { player, pump }
        });

        Arc::clone(&entry.player)
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SharedPlayer> {
        self.sessions.get(&guild_id).map(|s| Arc::clone(&s.player))
    }

    /// Desconecta y elimina la sesión
    pub async fn remove(&self, guild_id: GuildId) {
        let Some((_, session)) = self.sessions.remove(&guild_id) else {
            return;
        };

        if let Err(e) = session.player.lock().await.disconnect().await {
            warn!("⚠️ Error desconectando guild {}: {}", guild_id, e);
        }
        session.pump.abort();
        info!("🗑️ Sesión eliminada para guild {}", guild_id);
    }

    pub fn sessions(&self) -> Vec<GuildId> {
        self.sessions.iter().map(|s| *s.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
