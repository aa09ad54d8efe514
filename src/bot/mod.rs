//! # Bot Module
//!
//! Discord front end for Hertz.
//!
//! This module contains:
//! - Slash command registration ([`commands`]) and dispatch ([`handlers`])
//! - The "now playing" announcer used by the playback engine ([`announcer`])
//! - Gateway event handling (ready, interactions, voice state updates)
//! - The background maintenance loop
//!
//! ## Architecture
//!
//! The bot is built around the [`HertzBot`] struct which implements
//! Serenity's [`EventHandler`] trait. It owns:
//!
//! - Per-guild playback engines through [`PlayerManager`]
//! - Query resolution through a [`MetadataResolver`]
//! - Guild settings through a [`SettingsStore`] and saved queries through a
//!   [`FavoritesStore`]
//! - The on-disk track cache ([`ContentCache`]) and the TTL key-value cache
//!
//! ## Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use hertz::bot::{HertzBot, BotServices};
//! # fn example(services: BotServices) {
//! let bot = HertzBot::new(services);
//! let shutdown = bot.shutdown_token();
//! // ... Client::builder(token, intents).event_handler(bot)
//! shutdown.cancel();
//! # }
//! ```

use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, UserId, VoiceState},
    async_trait,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod announcer;
pub mod commands;
pub mod handlers;

use crate::{
    audio::PlayerManager,
    cache::{ContentCache, KeyValueCache},
    config::Config,
    sources::MetadataResolver,
    storage::{FavoritesStore, GuildSettings, SettingsStore},
};

pub use announcer::SerenityAnnouncer;

/// Shared services the bot is assembled from.
pub struct BotServices {
    pub config: Arc<Config>,
    pub players: Arc<PlayerManager>,
    pub resolver: Arc<dyn MetadataResolver>,
    pub settings: Arc<dyn SettingsStore>,
    pub favorites: Arc<dyn FavoritesStore>,
    pub cache: Arc<ContentCache>,
    pub kv: KeyValueCache,
    pub announcer: Arc<SerenityAnnouncer>,
}

/// Main Discord event handler for Hertz.
///
/// ## Thread Safety
///
/// Serenity calls the handler concurrently; every field is either
/// immutable or internally synchronized. Engine state lives behind the
/// per-guild lock handed out by [`PlayerManager`].
pub struct HertzBot {
    config: Arc<Config>,
    pub players: Arc<PlayerManager>,
    pub resolver: Arc<dyn MetadataResolver>,
    pub settings: Arc<dyn SettingsStore>,
    pub favorites: Arc<dyn FavoritesStore>,
    pub cache: Arc<ContentCache>,
    kv: KeyValueCache,
    announcer: Arc<SerenityAnnouncer>,
    /// `ready` se repite en cada reconexión del gateway
    maintenance_started: AtomicBool,
    shutdown: CancellationToken,
}

impl HertzBot {
    pub fn new(services: BotServices) -> Self {
        Self {
            config: services.config,
            players: services.players,
            resolver: services.resolver,
            settings: services.settings,
            favorites: services.favorites,
            cache: services.cache,
            kv: services.kv,
            announcer: services.announcer,
            maintenance_started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the maintenance loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Settings for a guild, falling back to defaults when storage fails.
    pub async fn guild_settings(&self, guild_id: GuildId) -> GuildSettings {
        match self.settings.guild_settings(guild_id.get()).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("⚠️ Error leyendo configuración de guild {}: {}", guild_id, e);
                GuildSettings::for_guild(guild_id.get())
            }
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Guild commands (when `GUILD_ID` is set) propagate in about a second,
    /// global ones can take up to an hour.
    async fn register_commands(&self, ctx: &Context) -> anyhow::Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    fn start_maintenance(&self) {
        if self.maintenance_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let cache = Arc::clone(&self.cache);
        let kv = self.kv.clone();
        let every = self.config.maintenance_interval;
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            maintenance_tasks(cache, kv, every, shutdown).await;
        });
    }

    /// The bot was kicked or moved out by someone else: drop the session.
    async fn handle_bot_disconnected(&self, guild_id: GuildId) {
        let Some(player) = self.players.get(guild_id) else {
            return;
        };

        // Si el motor ya no estaba conectado la desconexión fue nuestra
        let external = player.lock().await.is_connected();
        if external {
            info!("🔌 Bot desconectado externamente en guild {}", guild_id);
            self.players.remove(guild_id).await;
        }
    }

    async fn leave_if_alone(&self, ctx: &Context, guild_id: GuildId) {
        let Some(player) = self.players.get(guild_id) else {
            return;
        };
        let Some(channel) = player.lock().await.current_channel() else {
            return;
        };

        if !self.guild_settings(guild_id).await.leave_if_no_listeners {
            return;
        }

        let bot_id = ctx.cache.current_user().id;
        let Some(listeners) = listeners_in(ctx, guild_id, channel, bot_id) else {
            return;
        };

        if listeners == 0 {
            info!("🚪 Canal vacío, desconectando en guild {}", guild_id);
            if let Err(e) = player.lock().await.disconnect().await {
                warn!("⚠️ Error desconectando en guild {}: {}", guild_id, e);
            }
        }
    }
}

/// Non-bot users in `channel`, or `None` when the guild isn't cached.
fn listeners_in(ctx: &Context, guild_id: GuildId, channel: ChannelId, bot_id: UserId) -> Option<usize> {
    let guild = ctx.cache.guild(guild_id)?;
    let count = guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel))
        .filter(|state| state.user_id != bot_id)
        .filter(|state| !state.member.as_ref().is_some_and(|m| m.user.bot))
        .count();
    Some(count)
}

#[async_trait]
impl EventHandler for HertzBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        self.announcer.attach(Arc::clone(&ctx.http));

        if let Err(e) = self.register_commands(&ctx).await {
            error!("❌ Error al registrar comandos: {:?}", e);
        }

        self.start_maintenance();
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("❌ Error manejando comando: {:?}", e);
            }
        }
    }

    /// Tears the session down when the bot is disconnected by someone else,
    /// and leaves channels that have no listeners left.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        let bot_id = ctx.cache.current_user().id;
        if new.user_id == bot_id {
            if old.is_some() && new.channel_id.is_none() {
                self.handle_bot_disconnected(guild_id).await;
            }
            return;
        }

        // Solo importa cuando alguien sale de un canal
        let left_channel = old.and_then(|state| state.channel_id);
        if left_channel.is_some() && left_channel != new.channel_id {
            self.leave_if_alone(&ctx, guild_id).await;
        }
    }
}

/// Periodic housekeeping: expired key-value entries, then the track cache
/// (orphans and eviction). Stops when `shutdown` is cancelled.
async fn maintenance_tasks(
    cache: Arc<ContentCache>,
    kv: KeyValueCache,
    every: std::time::Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    // El primer tick es inmediato y la limpieza de arranque ya se hizo
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Tareas de mantenimiento detenidas");
                return;
            }
            _ = interval.tick() => {}
        }

        let expired = kv.sweep_expired().await;
        if let Err(e) = cache.cleanup().await {
            warn!("⚠️ Error limpiando caché de pistas: {}", e);
        }

        info!("🧹 Tareas de mantenimiento completadas ({} claves expiradas)", expired);
    }
}
