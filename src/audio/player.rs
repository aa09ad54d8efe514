use serenity::model::id::{ChannelId, GuildId, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::events::{Announcer, EngineEvent, PlaybackEvent};
use super::position::PositionTracker;
use super::queue::TrackQueue;
use super::track::QueuedTrack;
use super::transport::{AudioSource, FinishSignal, SourceInput, VoiceTransport};
use crate::cache::{cache_key_for, ContentCache, TrackDownloader};
use crate::error::PlayerError;
use crate::sources::StreamResolver;
use crate::storage::{GuildSettings, SettingsStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Playing,
    Paused,
    Idle,
}

/// Tunables that do not come from guild settings.
#[derive(Debug, Clone)]
pub struct PlayerOptions {
    /// Pause between stopping a source and starting the next one.
    pub transport_grace: Duration,
    /// Delay before a remote track starts downloading into the cache.
    pub cache_delay: Duration,
    /// Tracks this long or longer are never cached.
    pub cacheable_max_seconds: u64,
    pub caching: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            transport_grace: Duration::from_millis(200),
            cache_delay: Duration::from_secs(2),
            cacheable_max_seconds: 1800,
            caching: true,
        }
    }
}

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct PlayerContext {
    pub transport: Arc<dyn VoiceTransport>,
    pub cache: Arc<ContentCache>,
    pub streams: Arc<dyn StreamResolver>,
    pub downloader: Arc<dyn TrackDownloader>,
    pub settings: Arc<dyn SettingsStore>,
    pub announcer: Arc<dyn Announcer>,
    pub options: PlayerOptions,
}

struct IdleTimer {
    id: u64,
    handle: JoinHandle<()>,
}

/// Playback engine for one guild.
///
/// Every method takes `&mut self`: the session manager serializes commands
/// and transport events behind one lock. Transport completions arrive as
/// [`EngineEvent`]s on the receiver returned by [`Player::new`] and must be
/// fed back through [`Player::handle_event`].
///
/// Each `play` on the transport is tagged with a generation. Stopping a
/// source bumps the generation first, so its completion is recognised as
/// stale and never advances the queue.
pub struct Player {
    guild_id: GuildId,
    ctx: PlayerContext,
    status: PlayerStatus,
    queue: TrackQueue,
    tracker: PositionTracker,
    /// Volumen por defecto del guild, se relee en cada conexión
    default_volume: u8,
    /// Volumen elegido con `/volume`; sobrevive a reconexiones
    volume_override: Option<u8>,
    /// Nivel temporal mientras alguien habla
    ducked_volume: Option<u8>,
    loop_track: bool,
    loop_queue: bool,
    last_track_key: Option<String>,
    manual_skip: bool,
    generation: u64,
    idle_timer: Option<IdleTimer>,
    next_timer_id: u64,
    current_channel: Option<ChannelId>,
    speakers: HashSet<UserId>,
    events_tx: flume::Sender<EngineEvent>,
    listeners: broadcast::Sender<PlaybackEvent>,
}

impl Player {
    /// Crea el motor y el receptor de eventos que debe atender la sesión
    pub fn new(guild_id: GuildId, ctx: PlayerContext) -> (Self, flume::Receiver<EngineEvent>) {
        let (events_tx, events_rx) = flume::unbounded();
        let (listeners, _) = broadcast::channel(32);

        let player = Self {
            guild_id,
            ctx,
            status: PlayerStatus::Idle,
            queue: TrackQueue::new(),
            tracker: PositionTracker::new(),
            default_volume: 100,
            volume_override: None,
            ducked_volume: None,
            loop_track: false,
            loop_queue: false,
            last_track_key: None,
            manual_skip: false,
            generation: 0,
            idle_timer: None,
            next_timer_id: 0,
            current_channel: None,
            speakers: HashSet::new(),
            events_tx,
            listeners,
        };

        (player, events_rx)
    }

    /// Guild al que pertenece la sesión
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Estado actual del reproductor
    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    /// Cola de reproducción en solo lectura
    pub fn queue(&self) -> &TrackQueue {
        &self.queue
    }

    /// Cola editable para clear, shuffle, remove y move
    pub fn queue_mut(&mut self) -> &mut TrackQueue {
        &mut self.queue
    }

    /// Pista bajo el cursor
    pub fn current(&self) -> Option<&QueuedTrack> {
        self.queue.current()
    }

    /// Posición en segundos dentro de la pista actual
    pub fn position(&self) -> u64 {
        self.tracker.position()
    }

    /// Volumen efectivo (0-100); el elegido por el usuario tiene prioridad
    pub fn volume(&self) -> u8 {
        self.volume_override.unwrap_or(self.default_volume)
    }

    /// Indica si la pista actual se repite
    pub fn loop_track(&self) -> bool {
        self.loop_track
    }

    /// Indica si la cola se repite
    pub fn loop_queue(&self) -> bool {
        self.loop_queue
    }

    /// Indica si hay conexión de voz activa
    pub fn is_connected(&self) -> bool {
        self.ctx.transport.is_connected()
    }

    /// Canal de voz actual, si lo hay
    pub fn current_channel(&self) -> Option<ChannelId> {
        self.current_channel
    }

    /// Suscribe un oyente a los eventos de reproducción
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.listeners.subscribe()
    }

    /// Canal para señales del transporte, como la actividad de voz
    pub fn event_sender(&self) -> flume::Sender<EngineEvent> {
        self.events_tx.clone()
    }

    /// Agrega una pista a la cola
    pub fn add(&mut self, track: QueuedTrack, to_front: bool) {
        debug!("➕ [{}] Agregando a la cola: {}", self.guild_id, track.title);
        self.queue.add(track, to_front);
    }

    /// Agrega varias pistas conservando su orden
    pub fn add_all(&mut self, tracks: Vec<QueuedTrack>, to_front: bool) {
        debug!("➕ [{}] Agregando {} pistas a la cola", self.guild_id, tracks.len());
        self.queue.add_all(tracks, to_front);
    }

    /// Conecta (o mueve) el bot al canal de voz
    pub async fn connect(&mut self, channel: Option<ChannelId>) -> Result<(), PlayerError> {
        let channel = channel.ok_or(PlayerError::NotConnectedTarget)?;
        let settings = self.settings().await;

        self.ctx.transport.connect(channel).await?;
        self.cancel_idle_timer();
        self.default_volume = settings.default_volume.min(100);
        self.current_channel = Some(channel);

        info!("🔊 [{}] Conectado al canal {}", self.guild_id, channel);
        Ok(())
    }

    /// Desconecta del canal de voz; es idempotente
    pub async fn disconnect(&mut self) -> Result<(), PlayerError> {
        self.tracker.stop();
        self.cancel_idle_timer();

        if self.status == PlayerStatus::Playing {
            if let Err(e) = self.pause().await {
                warn!("⚠️ [{}] Error pausando antes de desconectar: {}", self.guild_id, e);
            }
        }

        self.loop_track = false;
        self.generation += 1;
        self.speakers.clear();
        self.ducked_volume = None;

        if self.ctx.transport.is_connected() {
            info!("👋 [{}] Desconectando del canal de voz", self.guild_id);
            if let Err(e) = self.ctx.transport.disconnect().await {
                warn!("⚠️ [{}] Error desconectando: {}", self.guild_id, e);
            }
        }

        self.current_channel = None;
        self.status = PlayerStatus::Idle;
        self.emit(PlaybackEvent::Disconnect {
            guild_id: self.guild_id,
        });
        Ok(())
    }

    /// Inicia o reanuda la reproducción de la pista actual
    ///
    /// Si la fuente no arranca salta una vez a la siguiente y devuelve el
    /// error; si esa también falla la cola termina.
    pub async fn play(&mut self) -> Result<(), PlayerError> {
        match self.start_current().await {
            Err(PlayerError::PlaybackFailed(reason)) => {
                error!("❌ [{}] Error reproduciendo pista: {}", self.guild_id, reason);
                self.recover_forward().await;
                Err(PlayerError::PlaybackFailed(reason))
            }
            other => other,
        }
    }

    /// Pausa la reproducción actual
    pub async fn pause(&mut self) -> Result<(), PlayerError> {
        if self.status != PlayerStatus::Playing {
            return Err(PlayerError::InvalidState("not currently playing".into()));
        }

        if self.ctx.transport.is_playing() {
            self.ctx.transport.pause().await?;
        }

        self.tracker.stop();
        self.status = PlayerStatus::Paused;
        info!("⏸️ [{}] Reproducción pausada", self.guild_id);
        self.emit(PlaybackEvent::Pause {
            guild_id: self.guild_id,
        });
        Ok(())
    }

    /// Salta a `position` segundos dentro de la pista actual
    pub async fn seek(&mut self, position: u64) -> Result<(), PlayerError> {
        if !self.ctx.transport.is_connected() {
            return Err(PlayerError::NotConnected);
        }

        let track = self
            .queue
            .current()
            .cloned()
            .ok_or_else(|| PlayerError::InvalidState("nothing is playing".into()))?;

        if track.is_live {
            return Err(PlayerError::InvalidState("can't seek in a livestream".into()));
        }
        if position > track.duration {
            return Err(PlayerError::OutOfBounds("can't seek past the end of the song".into()));
        }

        info!("⏩ [{}] Saltando a {}s en '{}'", self.guild_id, position, track.title);
        self.tracker.stop();
        self.cancel_idle_timer();
        self.launch(&track, position).await?;

        self.emit(PlaybackEvent::Seek {
            guild_id: self.guild_id,
            position,
        });
        Ok(())
    }

    /// Avanza `delta` segundos desde la posición actual
    pub async fn forward_seek(&mut self, delta: u64) -> Result<(), PlayerError> {
        let target = self.tracker.position().saturating_add(delta);
        self.seek(target).await
    }

    /// Avanza `n` pistas; al pasar el final queda en reposo
    pub async fn forward(&mut self, n: usize) -> Result<(), PlayerError> {
        self.tracker.stop();

        if !self.queue.advance(n) {
            info!("📋 [{}] Fin de la cola alcanzado", self.guild_id);
            self.finish_queue().await;
            return Ok(());
        }

        self.tracker.set(0);
        self.manual_skip = self.ctx.transport.is_playing() || self.ctx.transport.is_paused();
        self.emit(PlaybackEvent::Skip {
            guild_id: self.guild_id,
            cursor: self.queue.cursor(),
        });

        if self.status != PlayerStatus::Paused {
            self.play().await?;
        }
        Ok(())
    }

    /// Vuelve a la pista anterior
    pub async fn back(&mut self) -> Result<(), PlayerError> {
        if self.queue.cursor() == 0 {
            return Err(PlayerError::OutOfBounds("no song to go back to".into()));
        }

        self.tracker.stop();
        self.queue.retreat();
        self.tracker.set(0);
        self.manual_skip = self.ctx.transport.is_playing() || self.ctx.transport.is_paused();
        self.emit(PlaybackEvent::Back {
            guild_id: self.guild_id,
            cursor: self.queue.cursor(),
        });

        if self.status != PlayerStatus::Paused {
            self.play().await?;
        }
        Ok(())
    }

    /// Detiene la reproducción, desconecta y vacía la cola
    pub async fn stop(&mut self) -> Result<(), PlayerError> {
        if !self.ctx.transport.is_connected() {
            return Err(PlayerError::NotConnected);
        }
        if self.status != PlayerStatus::Playing {
            return Err(PlayerError::InvalidState("not currently playing".into()));
        }

        self.disconnect().await?;
        self.queue.clear_all();
        self.tracker.set(0);

        info!("⏹️ [{}] Reproducción detenida", self.guild_id);
        self.emit(PlaybackEvent::Stop {
            guild_id: self.guild_id,
        });
        Ok(())
    }

    /// Ajusta el volumen (0-100)
    pub async fn set_volume(&mut self, level: i32) -> Result<u8, PlayerError> {
        let volume = level.clamp(0, 100) as u8;
        self.volume_override = Some(volume);
        self.apply_gain().await?;

        info!("🔊 [{}] Volumen ajustado a {}%", self.guild_id, volume);
        Ok(volume)
    }

    /// Activa o desactiva la repetición de la pista actual
    pub fn set_loop_track(&mut self, enabled: bool) -> Result<(), PlayerError> {
        self.require_looping_target()?;
        self.loop_track = enabled;
        if enabled {
            self.loop_queue = false;
        }
        Ok(())
    }

    /// Activa o desactiva la repetición de la cola
    pub fn set_loop_queue(&mut self, enabled: bool) -> Result<(), PlayerError> {
        self.require_looping_target()?;
        self.loop_queue = enabled;
        if enabled {
            self.loop_track = false;
        }
        Ok(())
    }

    /// Aplica un evento del flujo de la sesión
    pub async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::TrackFinished { generation, error } => {
                self.on_track_finished(generation, error).await;
            }
            EngineEvent::IdleTimeout { timer } => {
                let armed = self.idle_timer.as_ref().map(|t| t.id) == Some(timer);
                if armed && self.status == PlayerStatus::Idle {
                    self.idle_timer = None;
                    info!("⏰ [{}] Tiempo de espera agotado, desconectando", self.guild_id);
                    let _ = self.disconnect().await;
                }
            }
            EngineEvent::Speaking { user_id, speaking } => {
                self.on_speaking(user_id, speaking).await;
            }
        }
    }

    async fn on_track_finished(&mut self, generation: u64, error: Option<String>) {
        if generation != self.generation {
            if self.manual_skip {
                self.manual_skip = false;
                self.auto_announce().await;
            }
            debug!("[{}] Fin de pista obsoleto ({}) ignorado", self.guild_id, generation);
            return;
        }

        if self.status != PlayerStatus::Playing {
            return;
        }

        if let Some(error) = error {
            warn!("⚠️ [{}] La pista terminó con error: {}", self.guild_id, error);
        }

        self.tracker.stop();

        if self.loop_track {
            debug!("🔁 [{}] Repitiendo pista actual", self.guild_id);
            if let Err(e) = self.seek(0).await {
                error!("❌ [{}] Error repitiendo pista: {}", self.guild_id, e);
            }
            return;
        }

        if self.loop_queue {
            if let Some(current) = self.queue.current().cloned() {
                debug!("🔁 [{}] Reagregando '{}' al final de la cola", self.guild_id, current.title);
                self.queue.push_back(current);
            }
        }

        if !self.queue.advance(1) {
            self.finish_queue().await;
            return;
        }

        self.tracker.set(0);
        if let Err(e) = self.play().await {
            error!("❌ [{}] Error avanzando a la siguiente pista: {}", self.guild_id, e);
            return;
        }
        self.auto_announce().await;
    }

    async fn on_speaking(&mut self, user_id: UserId, speaking: bool) {
        let settings = self.settings().await;
        if !settings.turn_down_volume_when_people_speak {
            return;
        }

        let was_quiet = self.speakers.is_empty();
        if speaking {
            self.speakers.insert(user_id);
        } else {
            self.speakers.remove(&user_id);
        }

        self.ducked_volume = match (was_quiet, self.speakers.is_empty()) {
            (true, false) => Some(settings.turn_down_volume_when_people_speak_target.min(100)),
            (false, true) => None,
            _ => return,
        };

        if let Err(e) = self.apply_gain().await {
            warn!("⚠️ [{}] Error ajustando volumen por voz: {}", self.guild_id, e);
        }
    }

    async fn apply_gain(&mut self) -> Result<(), PlayerError> {
        if self.ctx.transport.is_playing() || self.ctx.transport.is_paused() {
            self.ctx.transport.set_gain(self.gain()).await?;
        }
        Ok(())
    }

    /// Inicia o reanuda la pista actual, sin recuperación
    async fn start_current(&mut self) -> Result<(), PlayerError> {
        if !self.ctx.transport.is_connected() {
            return Err(PlayerError::NotConnected);
        }

        let track = self
            .queue
            .current()
            .cloned()
            .ok_or_else(|| PlayerError::InvalidState("queue is empty".into()))?;

        self.cancel_idle_timer();

        let position = self.tracker.position();
        let same_track = self.last_track_key.as_deref() == Some(track.identity().as_str());

        if same_track && position > 0 {
            if self.status == PlayerStatus::Paused && self.ctx.transport.is_paused() {
                self.ctx.transport.resume().await?;
                self.status = PlayerStatus::Playing;
                self.tracker.start(position);
                info!("▶️ [{}] Reanudando '{}' en {}s", self.guild_id, track.title, position);
                self.emit(PlaybackEvent::Resume {
                    guild_id: self.guild_id,
                });
                return Ok(());
            }
        }

        let start = if track.is_live { 0 } else { position };
        self.launch(&track, start).await?;

        info!("🎵 [{}] Reproduciendo: {}", self.guild_id, track.title);
        self.emit(PlaybackEvent::Play {
            guild_id: self.guild_id,
            title: track.title.clone(),
        });
        Ok(())
    }

    /// Crea una fuente nueva en `position` y la entrega al transporte
    async fn launch(&mut self, track: &QueuedTrack, position: u64) -> Result<(), PlayerError> {
        let (input, remote_url) = match self.source_input(track).await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.settle_after_failure();
                return Err(e);
            }
        };

        self.stop_transport().await;
        if !self.ctx.options.transport_grace.is_zero() {
            tokio::time::sleep(self.ctx.options.transport_grace).await;
        }

        let source = AudioSource {
            input,
            start_at: Duration::from_secs(position + track.start_offset),
            end_at: (!track.is_live).then(|| Duration::from_secs(track.duration + track.start_offset)),
            gain: self.gain(),
        };

        self.generation += 1;
        let signal = FinishSignal::new(self.generation, self.events_tx.clone());

        if let Err(e) = self.ctx.transport.play(source, signal).await {
            self.settle_after_failure();
            return Err(PlayerError::PlaybackFailed(e.to_string()));
        }

        self.status = PlayerStatus::Playing;
        self.last_track_key = Some(track.identity());
        self.tracker.start(position);

        if let Some(url) = remote_url {
            if self.is_cacheable(track, position) {
                self.spawn_cache_task(track, url);
            }
        }
        Ok(())
    }

    /// Archivo en caché si existe, si no una URL de stream recién resuelta
    async fn source_input(
        &self,
        track: &QueuedTrack,
    ) -> Result<(SourceInput, Option<String>), PlayerError> {
        if !track.is_live {
            let key = cache_key_for(&track.locator);
            match self.ctx.cache.resolve(&key).await {
                Ok(Some(path)) => {
                    debug!("💾 [{}] Usando caché para '{}'", self.guild_id, track.title);
                    return Ok((SourceInput::File(path), None));
                }
                Ok(None) => {}
                Err(e) => warn!("⚠️ [{}] Error consultando caché: {}", self.guild_id, e),
            }
        }

        let url = self
            .ctx
            .streams
            .stream_url(&track.metadata())
            .await
            .map_err(|e| {
                PlayerError::PlaybackFailed(format!("no stream for '{}': {}", track.title, e))
            })?;

        Ok((SourceInput::Url(url.clone()), Some(url)))
    }

    async fn recover_forward(&mut self) {
        if !self.queue.advance(1) {
            self.finish_queue().await;
            return;
        }

        self.tracker.set(0);
        if self.status == PlayerStatus::Paused {
            return;
        }

        if let Some(next) = self.queue.current() {
            info!("⏭️ [{}] Saltando a '{}' tras fallo", self.guild_id, next.title);
        }
        if let Err(e) = self.start_current().await {
            error!("❌ [{}] La pista siguiente también falló: {}", self.guild_id, e);
            self.finish_queue().await;
        }
    }

    /// Queda en reposo al final de la cola y programa la desconexión
    async fn finish_queue(&mut self) {
        self.stop_transport().await;
        self.tracker.stop();
        self.tracker.set(0);
        self.queue.finish();
        self.status = PlayerStatus::Idle;

        let delay = self.settings().await.seconds_to_wait_after_queue_empties;
        if delay > 0 {
            info!("⏰ [{}] Desconexión programada en {}s", self.guild_id, delay);
            self.schedule_idle_disconnect(Duration::from_secs(delay));
        }

        self.emit(PlaybackEvent::QueueEnd {
            guild_id: self.guild_id,
        });
    }

    async fn stop_transport(&mut self) {
        if self.ctx.transport.is_playing() || self.ctx.transport.is_paused() {
            self.generation += 1;
            self.ctx.transport.stop().await;
        }
    }

    fn settle_after_failure(&mut self) {
        self.tracker.stop();
        if !self.ctx.transport.is_playing() {
            self.status = PlayerStatus::Idle;
        }
    }

    fn schedule_idle_disconnect(&mut self, delay: Duration) {
        self.cancel_idle_timer();
        self.next_timer_id += 1;

        let id = self.next_timer_id;
        let events = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(EngineEvent::IdleTimeout { timer: id });
        });

        self.idle_timer = Some(IdleTimer { id, handle });
    }

    fn cancel_idle_timer(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.handle.abort();
            debug!("[{}] Desconexión programada cancelada", self.guild_id);
        }
    }

    fn is_cacheable(&self, track: &QueuedTrack, position: u64) -> bool {
        self.ctx.options.caching
            && !track.is_live
            && track.duration < self.ctx.options.cacheable_max_seconds
            && track.start_offset == 0
            && position == 0
    }

    fn spawn_cache_task(&self, track: &QueuedTrack, url: String) {
        let cache = Arc::clone(&self.ctx.cache);
        let downloader = Arc::clone(&self.ctx.downloader);
        let delay = self.ctx.options.cache_delay;
        let key = cache_key_for(&track.locator);
        let title = track.title.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match cache.populate_from(&key, &url, downloader.as_ref()).await {
                Ok(_) => debug!("💾 '{}' guardada en caché", title),
                Err(e) => error!("❌ Error cacheando '{}': {}", title, e),
            }
        });
    }

    async fn auto_announce(&self) {
        let Some(track) = self.queue.current() else {
            return;
        };
        if !self.settings().await.auto_announce_next_song {
            return;
        }
        // Se anuncia en el canal de texto donde se agregó la pista
        self.ctx
            .announcer
            .announce(track.added_in_channel, track, self.queue.upcoming().len())
            .await;
    }

    fn require_looping_target(&self) -> Result<(), PlayerError> {
        if self.status == PlayerStatus::Idle || self.queue.current().is_none() {
            return Err(PlayerError::InvalidState("no song to loop".into()));
        }
        Ok(())
    }

    async fn settings(&self) -> GuildSettings {
        match self.ctx.settings.guild_settings(self.guild_id.get()).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "⚠️ [{}] Error leyendo configuración, usando valores por defecto: {}",
                    self.guild_id, e
                );
                GuildSettings::for_guild(self.guild_id.get())
            }
        }
    }

    fn gain(&self) -> f32 {
        f32::from(self.ducked_volume.unwrap_or_else(|| self.volume())) / 100.0
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.listeners.send(event);
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::fixtures::{live_track, track};
    use crate::audio::transport::fake::{Call, FakeTransport};
    use crate::cache::ContentCacheConfig;
    use crate::error::{CacheError, ProviderError};
    use crate::sources::TrackMetadata;
    use crate::storage::JsonCacheRegistry;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tempfile::TempDir;

    struct MemorySettings(Mutex<GuildSettings>);

    #[async_trait]
    impl SettingsStore for MemorySettings {
        async fn guild_settings(&self, _guild_id: u64) -> anyhow::Result<GuildSettings> {
            Ok(self.0.lock().clone())
        }

        async fn update_guild_settings(&self, settings: GuildSettings) -> anyhow::Result<()> {
            *self.0.lock() = settings;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeStreams {
        broken: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl StreamResolver for FakeStreams {
        async fn stream_url(&self, track: &TrackMetadata) -> Result<String, ProviderError> {
            if self.broken.lock().contains(&track.locator) {
                return Err(ProviderError::Fatal("video unavailable".into()));
            }
            Ok(format!("https://cdn.example/{}", track.locator))
        }
    }

    struct FakeDownloader;

    #[async_trait]
    impl TrackDownloader for FakeDownloader {
        async fn download(&self, _url: &str, dest: &Path) -> Result<u64, CacheError> {
            tokio::fs::write(dest, b"audio").await?;
            Ok(5)
        }
    }

    #[derive(Default)]
    struct RecordingAnnouncer {
        announced: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Announcer for RecordingAnnouncer {
        async fn announce(&self, _channel: ChannelId, track: &QueuedTrack, _upcoming: usize) {
            self.announced.lock().push(track.title.clone());
        }
    }

    struct Harness {
        player: Player,
        events: flume::Receiver<EngineEvent>,
        transport: FakeTransport,
        settings: Arc<MemorySettings>,
        streams: Arc<FakeStreams>,
        announcer: Arc<RecordingAnnouncer>,
        cache: Arc<ContentCache>,
        _dir: TempDir,
    }

    impl Harness {
        async fn new() -> Self {
            Self::with_options(PlayerOptions {
                transport_grace: Duration::ZERO,
                cache_delay: Duration::from_millis(10),
                caching: false,
                ..PlayerOptions::default()
            })
            .await
        }

        async fn with_options(options: PlayerOptions) -> Self {
            let dir = TempDir::new().unwrap();
            let cache = Arc::new(
                ContentCache::new(
                    ContentCacheConfig::new(dir.path().join("cache"), 1_000_000),
                    Arc::new(JsonCacheRegistry::in_memory()),
                )
                .await
                .unwrap(),
            );
            let transport = FakeTransport::new();
            let settings = Arc::new(MemorySettings(Mutex::new(GuildSettings::for_guild(1))));
            let streams = Arc::new(FakeStreams::default());
            let announcer = Arc::new(RecordingAnnouncer::default());

            let ctx = PlayerContext {
                transport: Arc::new(transport.clone()),
                cache: Arc::clone(&cache),
                streams: streams.clone(),
                downloader: Arc::new(FakeDownloader),
                settings: settings.clone(),
                announcer: announcer.clone(),
                options,
            };
            let (player, events) = Player::new(GuildId::new(1), ctx);

            Self {
                player,
                events,
                transport,
                settings,
                streams,
                announcer,
                cache,
                _dir: dir,
            }
        }

        fn update_settings(&self, edit: impl FnOnce(&mut GuildSettings)) {
            edit(&mut self.settings.0.lock());
        }

        /// Applies every event already posted by the transport or timers.
        async fn pump(&mut self) {
            while let Ok(event) = self.events.try_recv() {
                self.player.handle_event(event).await;
            }
        }

        async fn start(&mut self, names: &[&str]) {
            for name in names {
                self.player.add(track(name, 180), false);
            }
            self.player.connect(Some(ChannelId::new(5))).await.unwrap();
            self.player.play().await.unwrap();
        }

        fn played_urls(&self) -> Vec<String> {
            self.transport
                .plays()
                .into_iter()
                .map(|source| match source.input {
                    SourceInput::Url(url) => url,
                    SourceInput::File(path) => path.display().to_string(),
                })
                .collect()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn play_starts_the_first_track() {
        let mut h = Harness::new().await;
        h.start(&["a"]).await;

        assert_eq!(h.player.status(), PlayerStatus::Playing);
        assert_eq!(h.player.queue().cursor(), 0);
        assert_eq!(h.played_urls(), vec!["https://cdn.example/id-a"]);

        let source = &h.transport.plays()[0];
        assert_eq!(source.start_at, Duration::ZERO);
        assert_eq!(source.end_at, Some(Duration::from_secs(180)));
        assert_eq!(source.gain, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn play_requires_connection_and_track() {
        let mut h = Harness::new().await;
        h.player.add(track("a", 60), false);
        assert_eq!(h.player.play().await, Err(PlayerError::NotConnected));

        let mut empty = Harness::new().await;
        empty.player.connect(Some(ChannelId::new(5))).await.unwrap();
        assert!(matches!(empty.player.play().await, Err(PlayerError::InvalidState(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn connect_without_channel_fails() {
        let mut h = Harness::new().await;
        assert_eq!(
            h.player.connect(None).await,
            Err(PlayerError::NotConnectedTarget)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn connect_applies_default_volume() {
        let mut h = Harness::new().await;
        h.update_settings(|s| s.default_volume = 40);
        h.start(&["a"]).await;

        assert_eq!(h.player.volume(), 40);
        assert_eq!(h.transport.plays()[0].gain, 0.4);
        assert_eq!(h.player.current_channel(), Some(ChannelId::new(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn natural_finish_advances_once() {
        let mut h = Harness::new().await;
        h.start(&["a", "b", "c"]).await;

        h.transport.finish_current();
        h.pump().await;

        assert_eq!(h.player.queue().cursor(), 1);
        assert_eq!(h.player.status(), PlayerStatus::Playing);
        assert_eq!(h.transport.plays().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn forward_skips_without_double_advance() {
        let mut h = Harness::new().await;
        h.start(&["a", "b", "c"]).await;

        h.player.forward(2).await.unwrap();
        h.pump().await;

        assert_eq!(h.player.queue().cursor(), 2);
        assert_eq!(h.player.position(), 0);
        assert_eq!(
            h.played_urls(),
            vec!["https://cdn.example/id-a", "https://cdn.example/id-c"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn forward_past_end_goes_idle_and_keeps_queue() {
        let mut h = Harness::new().await;
        h.start(&["a", "b"]).await;

        h.player.forward(2).await.unwrap();
        h.pump().await;

        assert_eq!(h.player.status(), PlayerStatus::Idle);
        assert_eq!(h.player.queue().len(), 2);
        assert!(h.player.current().is_none());
        assert!(h.transport.calls().contains(&Call::Stop));
        assert!(h.transport.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn forward_while_paused_does_not_start() {
        let mut h = Harness::new().await;
        h.start(&["a", "b"]).await;
        h.player.pause().await.unwrap();

        h.player.forward(1).await.unwrap();

        assert_eq!(h.player.status(), PlayerStatus::Paused);
        assert_eq!(h.player.queue().cursor(), 1);
        assert_eq!(h.transport.plays().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn back_at_start_is_out_of_bounds() {
        let mut h = Harness::new().await;
        h.start(&["a", "b"]).await;

        assert!(matches!(h.player.back().await, Err(PlayerError::OutOfBounds(_))));
        assert_eq!(h.player.queue().cursor(), 0);
        assert_eq!(h.player.status(), PlayerStatus::Playing);
        assert_eq!(h.transport.plays().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn back_replays_previous_track() {
        let mut h = Harness::new().await;
        h.start(&["a", "b"]).await;
        h.player.forward(1).await.unwrap();

        h.player.back().await.unwrap();
        h.pump().await;

        assert_eq!(h.player.queue().cursor(), 0);
        assert_eq!(
            h.played_urls().last().map(String::as_str),
            Some("https://cdn.example/id-a")
        );
        assert_eq!(h.transport.plays().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_queue_reappends_finished_track() {
        let mut h = Harness::new().await;
        h.start(&["a"]).await;
        h.player.set_loop_queue(true).unwrap();

        h.transport.finish_current();
        h.pump().await;

        assert_eq!(h.player.queue().len(), 2);
        assert_eq!(h.player.current().map(|t| t.title.as_str()), Some("a"));
        assert_eq!(h.player.status(), PlayerStatus::Playing);
        assert!(h.transport.is_connected());
        assert_eq!(h.transport.plays().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_track_restarts_from_zero() {
        let mut h = Harness::new().await;
        h.start(&["a", "b"]).await;
        h.player.set_loop_track(true).unwrap();

        h.transport.finish_current();
        h.pump().await;

        assert_eq!(h.player.queue().cursor(), 0);
        assert_eq!(h.player.queue().len(), 2);
        let plays = h.transport.plays();
        assert_eq!(plays.len(), 2);
        assert_eq!(plays[1].start_at, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_flags_are_exclusive_and_need_a_track() {
        let mut h = Harness::new().await;
        assert!(matches!(
            h.player.set_loop_track(true),
            Err(PlayerError::InvalidState(_))
        ));

        h.start(&["a"]).await;
        h.player.set_loop_track(true).unwrap();
        h.player.set_loop_queue(true).unwrap();
        assert!(!h.player.loop_track());
        assert!(h.player.loop_queue());

        h.player.set_loop_track(true).unwrap();
        assert!(h.player.loop_track());
        assert!(!h.player.loop_queue());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_start_skips_once_then_reports() {
        let mut h = Harness::new().await;
        h.streams.broken.lock().insert("id-a".into());
        h.player.add(track("a", 60), false);
        h.player.add(track("b", 60), false);
        h.player.connect(Some(ChannelId::new(5))).await.unwrap();

        let result = h.player.play().await;

        assert!(matches!(result, Err(PlayerError::PlaybackFailed(_))));
        assert_eq!(h.player.queue().cursor(), 1);
        assert_eq!(h.player.status(), PlayerStatus::Playing);
        assert_eq!(h.played_urls(), vec!["https://cdn.example/id-b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_failed_start_ends_the_queue_and_disconnects_later() {
        let mut h = Harness::new().await;
        h.streams.broken.lock().insert("id-a".into());
        h.streams.broken.lock().insert("id-b".into());
        h.player.add(track("a", 60), false);
        h.player.add(track("b", 60), false);
        h.player.connect(Some(ChannelId::new(5))).await.unwrap();
        let mut events = h.player.subscribe();

        let result = h.player.play().await;

        assert!(matches!(result, Err(PlayerError::PlaybackFailed(_))));
        assert_eq!(h.player.status(), PlayerStatus::Idle);
        assert!(h.player.current().is_none());
        assert!(h.played_urls().is_empty());
        assert!(matches!(events.try_recv(), Ok(PlaybackEvent::QueueEnd { .. })));

        tokio::time::sleep(Duration::from_secs(31)).await;
        h.pump().await;
        assert!(!h.transport.is_connected());
        assert!(h.transport.calls().contains(&Call::Disconnect));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_rejection_on_last_track_goes_idle() {
        let mut h = Harness::new().await;
        h.transport.fail_next_plays(1);
        h.player.add(track("a", 60), false);
        h.player.connect(Some(ChannelId::new(5))).await.unwrap();

        assert!(matches!(
            h.player.play().await,
            Err(PlayerError::PlaybackFailed(_))
        ));
        assert_eq!(h.player.status(), PlayerStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_end_disconnects_after_delay() {
        let mut h = Harness::new().await;
        h.start(&["a"]).await;

        h.transport.finish_current();
        h.pump().await;
        assert_eq!(h.player.status(), PlayerStatus::Idle);
        assert!(h.transport.is_connected());

        tokio::time::sleep(Duration::from_secs(31)).await;
        h.pump().await;

        assert!(!h.transport.is_connected());
        assert!(h.transport.calls().contains(&Call::Disconnect));
    }

    #[tokio::test(start_paused = true)]
    async fn play_cancels_pending_disconnect() {
        let mut h = Harness::new().await;
        h.start(&["a"]).await;
        h.transport.finish_current();
        h.pump().await;

        h.player.add(track("b", 60), false);
        h.player.play().await.unwrap();
        assert_eq!(h.player.current().map(|t| t.title.as_str()), Some("b"));

        tokio::time::sleep(Duration::from_secs(31)).await;
        h.pump().await;

        assert!(h.transport.is_connected());
        assert_eq!(h.player.status(), PlayerStatus::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_never_disconnects() {
        let mut h = Harness::new().await;
        h.update_settings(|s| s.seconds_to_wait_after_queue_empties = 0);
        h.start(&["a"]).await;
        h.transport.finish_current();
        h.pump().await;

        tokio::time::sleep(Duration::from_secs(3600)).await;
        h.pump().await;
        assert!(h.transport.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_then_play_resumes_in_place() {
        let mut h = Harness::new().await;
        h.start(&["a"]).await;
        tokio::time::sleep(Duration::from_millis(5500)).await;

        h.player.pause().await.unwrap();
        assert_eq!(h.player.position(), 5);
        h.player.play().await.unwrap();

        assert_eq!(h.player.status(), PlayerStatus::Playing);
        assert_eq!(h.transport.plays().len(), 1);
        assert!(h.transport.calls().contains(&Call::Resume));
        assert_eq!(h.player.position(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_requires_playing() {
        let mut h = Harness::new().await;
        assert!(matches!(h.player.pause().await, Err(PlayerError::InvalidState(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn seek_restarts_source_at_offset() {
        let mut h = Harness::new().await;
        h.player.add(
            QueuedTrack {
                start_offset: 60,
                duration: 120,
                ..track("chapter", 120)
            },
            false,
        );
        h.player.connect(Some(ChannelId::new(5))).await.unwrap();
        h.player.play().await.unwrap();

        h.player.seek(30).await.unwrap();
        h.pump().await;

        let plays = h.transport.plays();
        assert_eq!(plays[0].start_at, Duration::from_secs(60));
        assert_eq!(plays[0].end_at, Some(Duration::from_secs(180)));
        assert_eq!(plays[1].start_at, Duration::from_secs(90));
        assert_eq!(h.player.position(), 30);
        assert_eq!(h.player.queue().cursor(), 0);
        assert_eq!(h.player.status(), PlayerStatus::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn seek_validates_target() {
        let mut h = Harness::new().await;
        h.player.add(track("a", 60), false);
        assert_eq!(h.player.seek(10).await, Err(PlayerError::NotConnected));

        h.player.connect(Some(ChannelId::new(5))).await.unwrap();
        h.player.play().await.unwrap();
        assert!(matches!(h.player.seek(61).await, Err(PlayerError::OutOfBounds(_))));

        let mut live = Harness::new().await;
        live.player.add(live_track("radio"), false);
        live.player.connect(Some(ChannelId::new(5))).await.unwrap();
        live.player.play().await.unwrap();
        assert_eq!(live.transport.plays()[0].end_at, None);
        assert!(matches!(live.player.seek(10).await, Err(PlayerError::InvalidState(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn forward_seek_adds_to_position() {
        let mut h = Harness::new().await;
        h.start(&["a"]).await;
        tokio::time::sleep(Duration::from_millis(10_500)).await;

        h.player.forward_seek(20).await.unwrap();

        assert_eq!(h.player.position(), 30);
        assert_eq!(h.transport.plays()[1].start_at, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn volume_is_clamped_and_applied() {
        let mut h = Harness::new().await;
        assert_eq!(h.player.set_volume(150).await.unwrap(), 100);
        assert_eq!(h.player.set_volume(-5).await.unwrap(), 0);
        assert!(h.transport.calls().is_empty());

        h.start(&["a"]).await;
        h.player.set_volume(50).await.unwrap();
        assert!(h.transport.calls().contains(&Call::SetGain(0.5)));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_requires_playing_and_clears_queue() {
        let mut h = Harness::new().await;
        assert_eq!(h.player.stop().await, Err(PlayerError::NotConnected));

        h.start(&["a", "b"]).await;
        h.player.pause().await.unwrap();
        assert!(matches!(h.player.stop().await, Err(PlayerError::InvalidState(_))));

        h.player.play().await.unwrap();
        h.player.stop().await.unwrap();
        h.pump().await;

        assert!(h.player.queue().is_empty());
        assert_eq!(h.player.queue().cursor(), 0);
        assert_eq!(h.player.status(), PlayerStatus::Idle);
        assert!(!h.transport.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_is_idempotent_and_keeps_position() {
        let mut h = Harness::new().await;
        h.start(&["a"]).await;
        tokio::time::sleep(Duration::from_millis(3500)).await;

        h.player.disconnect().await.unwrap();
        h.player.disconnect().await.unwrap();
        h.pump().await;

        assert_eq!(h.player.status(), PlayerStatus::Idle);
        assert_eq!(h.player.position(), 3);
        assert_eq!(h.player.queue().len(), 1);
        let disconnects = h
            .transport
            .calls()
            .into_iter()
            .filter(|c| *c == Call::Disconnect)
            .count();
        assert_eq!(disconnects, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_restarts_at_saved_position() {
        let mut h = Harness::new().await;
        h.start(&["a"]).await;
        tokio::time::sleep(Duration::from_millis(3500)).await;
        h.player.disconnect().await.unwrap();
        h.pump().await;

        h.player.connect(Some(ChannelId::new(6))).await.unwrap();
        h.player.play().await.unwrap();

        let plays = h.transport.plays();
        assert_eq!(plays.len(), 2);
        assert_eq!(plays[1].start_at, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn chosen_volume_survives_reconnect() {
        let mut h = Harness::new().await;
        h.start(&["a"]).await;
        h.player.set_volume(30).await.unwrap();
        h.player.disconnect().await.unwrap();
        h.pump().await;

        h.player.connect(Some(ChannelId::new(6))).await.unwrap();
        h.player.play().await.unwrap();

        assert_eq!(h.player.volume(), 30);
        let plays = h.transport.plays();
        assert_eq!(plays.len(), 2);
        assert_eq!(plays[1].gain, 0.3);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_track_plays_from_file() {
        let mut h = Harness::new().await;
        let file = h._dir.path().join("a.opus");
        std::fs::write(&file, b"audio").unwrap();
        h.cache.store(&cache_key_for("id-a"), &file).await.unwrap();

        h.start(&["a"]).await;

        let plays = h.transport.plays();
        assert!(plays[0].is_cached());
    }

    #[tokio::test]
    async fn remote_start_populates_cache() {
        let mut h = Harness::with_options(PlayerOptions {
            transport_grace: Duration::ZERO,
            cache_delay: Duration::from_millis(10),
            ..PlayerOptions::default()
        })
        .await;
        h.start(&["a"]).await;

        let key = cache_key_for("id-a");
        let mut cached = None;
        for _ in 0..100 {
            cached = h.cache.resolve(&key).await.unwrap();
            if cached.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let path = cached.expect("track should be cached");
        assert_eq!(std::fs::read(path).unwrap(), b"audio");
    }

    #[tokio::test(start_paused = true)]
    async fn auto_announce_follows_setting() {
        let mut h = Harness::new().await;
        h.start(&["a", "b", "c"]).await;
        h.transport.finish_current();
        h.pump().await;
        assert!(h.announcer.announced.lock().is_empty());

        h.update_settings(|s| s.auto_announce_next_song = true);
        h.transport.finish_current();
        h.pump().await;
        assert_eq!(*h.announcer.announced.lock(), vec!["c".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn speaking_ducks_volume_when_enabled() {
        let mut h = Harness::new().await;
        h.start(&["a"]).await;

        let talk = |speaking| EngineEvent::Speaking {
            user_id: UserId::new(7),
            speaking,
        };

        h.player.handle_event(talk(true)).await;
        assert!(!h.transport.calls().contains(&Call::SetGain(0.2)));

        h.update_settings(|s| s.turn_down_volume_when_people_speak = true);
        h.player.handle_event(talk(true)).await;
        assert!(h.transport.calls().contains(&Call::SetGain(0.2)));

        h.transport.clear_calls();
        h.player.handle_event(talk(false)).await;
        assert_eq!(h.transport.calls(), vec![Call::SetGain(1.0)]);
        assert_eq!(h.player.volume(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn ducking_restores_the_chosen_volume() {
        let mut h = Harness::new().await;
        h.update_settings(|s| s.turn_down_volume_when_people_speak = true);
        h.start(&["a"]).await;
        h.player.set_volume(60).await.unwrap();

        let talk = |speaking| EngineEvent::Speaking {
            user_id: UserId::new(7),
            speaking,
        };
        h.player.handle_event(talk(true)).await;
        assert_eq!(h.player.volume(), 60);

        h.transport.clear_calls();
        h.player.handle_event(talk(false)).await;
        assert_eq!(h.transport.calls(), vec![Call::SetGain(0.6)]);
    }

    #[tokio::test(start_paused = true)]
    async fn listeners_receive_playback_events() {
        let mut h = Harness::new().await;
        let mut events = h.player.subscribe();
        h.start(&["a"]).await;
        h.player.pause().await.unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            PlaybackEvent::Play {
                guild_id: GuildId::new(1),
                title: "a".into(),
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            PlaybackEvent::Pause {
                guild_id: GuildId::new(1),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn random_command_sequences_keep_cursor_and_loop_invariants() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut h = Harness::new().await;
        let mut rng = StdRng::seed_from_u64(0x4e72_7a);
        h.player.connect(Some(ChannelId::new(5))).await.unwrap();

        for step in 0..200 {
            match rng.gen_range(0..12) {
                0 | 1 => {
                    let name = format!("t{step}");
                    h.player.add(track(&name, 60), rng.gen_bool(0.3));
                }
                2 => {
                    let _ = h.player.play().await;
                }
                3 => {
                    let _ = h.player.forward(rng.gen_range(1..=3)).await;
                }
                4 => {
                    let _ = h.player.back().await;
                }
                5 => {
                    h.transport.finish_current();
                    h.pump().await;
                }
                6 => {
                    let index = rng.gen_range(0..=h.player.queue().len());
                    let _ = h.player.queue_mut().remove(index, rng.gen_range(1..=2));
                }
                7 => {
                    let upcoming = h.player.queue().upcoming().len();
                    let _ = h
                        .player
                        .queue_mut()
                        .move_track(rng.gen_range(0..=upcoming), rng.gen_range(0..=upcoming));
                }
                8 => {
                    let _ = h.player.set_loop_track(rng.gen_bool(0.5));
                }
                9 => {
                    let _ = h.player.set_loop_queue(rng.gen_bool(0.5));
                }
                10 => {
                    if rng.gen_bool(0.5) {
                        let _ = h.player.pause().await;
                    } else {
                        h.player.queue_mut().clear();
                    }
                }
                _ => {
                    if h.player.is_connected() {
                        let _ = h.player.disconnect().await;
                    } else {
                        h.player.connect(Some(ChannelId::new(5))).await.unwrap();
                    }
                }
            }
            h.pump().await;

            let queue = h.player.queue();
            assert!(
                queue.cursor() <= queue.len(),
                "step {step}: cursor {} past len {}",
                queue.cursor(),
                queue.len()
            );
            assert!(
                !(h.player.loop_track() && h.player.loop_queue()),
                "step {step}: both loop modes enabled"
            );
        }
    }
}
