use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::{File, HttpRequest, Input};
use songbird::tracks::{PlayMode, Track, TrackHandle};
use songbird::{Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::transport::{AudioSource, FinishSignal, SourceInput, TransportFactory, VoiceTransport};
use crate::error::TransportError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Finish signal shared by every songbird event attached to one track.
#[derive(Clone)]
struct FinishSlot(Arc<Mutex<Option<FinishSignal>>>);

impl FinishSlot {
    fn new(signal: FinishSignal) -> Self {
        Self(Arc::new(Mutex::new(Some(signal))))
    }

    fn fire(&self, error: Option<String>) {
        // take() garantiza un solo disparo por pista
        if let Some(signal) = self.0.lock().take() {
            signal.fire(error);
        }
    }
}

#[derive(Default)]
struct TransportState {
    call: Option<Arc<tokio::sync::Mutex<Call>>>,
    channel: Option<ChannelId>,
    track: Option<TrackHandle>,
    pending: Option<FinishSlot>,
    mode: Mode,
    /// Bumped per track so late events from an old track keep their hands off
    token: u64,
}

/// [`VoiceTransport`] on top of songbird's driver.
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    http: reqwest::Client,
    state: Arc<Mutex<TransportState>>,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId, http: reqwest::Client) -> Self {
        Self {
            manager,
            guild_id,
            http,
            state: Arc::new(Mutex::new(TransportState::default())),
        }
    }

    fn current_track(&self) -> Option<TrackHandle> {
        self.state.lock().track.clone()
    }

    fn input_for(&self, source: &SourceInput) -> Input {
        match source {
            SourceInput::File(path) => File::new(path.clone()).into(),
            SourceInput::Url(url) => HttpRequest::new(self.http.clone(), url.clone()).into(),
        }
    }
}

fn control_error(e: impl std::fmt::Display) -> TransportError {
    TransportError::new(e.to_string())
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(&self, channel: ChannelId) -> Result<(), TransportError> {
        let call = self
            .manager
            .join(self.guild_id, channel)
            .await
            .map_err(|e| TransportError::new(format!("Error al conectar al canal de voz: {e}")))?;

        let mut state = self.state.lock();
        state.call = Some(call);
        state.channel = Some(channel);
        info!("🔊 Conectado al canal de voz {} en guild {}", channel, self.guild_id);
        Ok(())
    }

    async fn play(&self, source: AudioSource, on_finished: FinishSignal) -> Result<(), TransportError> {
        let call = self
            .state
            .lock()
            .call
            .clone()
            .ok_or_else(|| TransportError::new("not connected"))?;

        let track = Track::from(self.input_for(&source.input)).volume(source.gain);
        let handle = call.lock().await.play(track);

        if !source.start_at.is_zero() {
            let seeking = handle.clone();
            let (guild_id, start_at) = (self.guild_id, source.start_at);
            // El seek espera a que la pista sea reproducible; no bloquea el play
            tokio::spawn(async move {
                if let Err(e) = seeking.seek_async(start_at).await {
                    warn!(
                        "⚠️ Error saltando a {:?} en guild {}, la pista empieza desde el inicio: {}",
                        start_at, guild_id, e
                    );
                }
            });
        }

        let slot = FinishSlot::new(on_finished);
        let token = {
            let mut state = self.state.lock();
            state.token += 1;
            state.track = Some(handle.clone());
            state.pending = Some(slot.clone());
            state.mode = Mode::Playing;
            state.token
        };

        let notifier = TrackEndNotifier {
            slot,
            state: Arc::clone(&self.state),
            token,
        };
        handle
            .add_event(Event::Track(TrackEvent::End), notifier.clone())
            .map_err(control_error)?;
        handle
            .add_event(Event::Track(TrackEvent::Error), notifier)
            .map_err(control_error)?;

        if let Some(end_at) = source.end_at {
            if let Some(remaining) = end_at.checked_sub(source.start_at).filter(|d| !d.is_zero()) {
                handle
                    .add_event(Event::Delayed(remaining), SectionEnd)
                    .map_err(control_error)?;
            }
        }

        debug!("🎵 Pista enviada al driver de voz (guild {})", self.guild_id);
        Ok(())
    }

    async fn pause(&self) -> Result<(), TransportError> {
        if let Some(handle) = self.current_track() {
            handle.pause().map_err(control_error)?;
            self.state.lock().mode = Mode::Paused;
        }
        Ok(())
    }

    async fn resume(&self) -> Result<(), TransportError> {
        if let Some(handle) = self.current_track() {
            handle.play().map_err(control_error)?;
            self.state.lock().mode = Mode::Playing;
        }
        Ok(())
    }

    async fn stop(&self) {
        let handle = {
            let mut state = self.state.lock();
            state.mode = Mode::Stopped;
            state.track.take()
        };
        // El evento End dispara la señal pendiente
        if let Some(handle) = handle {
            let _ = handle.stop();
        }
    }

    async fn set_gain(&self, gain: f32) -> Result<(), TransportError> {
        if let Some(handle) = self.current_track() {
            handle.set_volume(gain).map_err(control_error)?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let (handle, pending) = {
            let mut state = self.state.lock();
            state.token += 1;
            state.mode = Mode::Stopped;
            state.call = None;
            state.channel = None;
            (state.track.take(), state.pending.take())
        };

        if let Some(handle) = handle {
            let _ = handle.stop();
        }

        let result = self.manager.remove(self.guild_id).await;

        if let Some(slot) = pending {
            slot.fire(None);
        }

        match result {
            Ok(()) | Err(songbird::error::JoinError::NoCall) => Ok(()),
            Err(e) => {
                warn!("⚠️ Error al salir del canal de voz en guild {}: {}", self.guild_id, e);
                Err(control_error(e))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.state.lock().call.is_some()
    }

    fn is_playing(&self) -> bool {
        self.state.lock().mode == Mode::Playing
    }

    fn is_paused(&self) -> bool {
        self.state.lock().mode == Mode::Paused
    }

    fn current_channel(&self) -> Option<ChannelId> {
        self.state.lock().channel
    }
}

/// Fires the finish signal when the track ends or errors.
#[derive(Clone)]
struct TrackEndNotifier {
    slot: FinishSlot,
    state: Arc<Mutex<TransportState>>,
    token: u64,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(e.to_string()),
                _ => None,
            }),
            _ => None,
        };

        {
            let mut state = self.state.lock();
            if state.token == self.token {
                state.mode = Mode::Stopped;
                state.track = None;
                state.pending = None;
            }
        }

        self.slot.fire(error);
        None
    }
}

/// Stops a track when it reaches the end of its section (chapters).
struct SectionEnd;

#[async_trait]
impl VoiceEventHandler for SectionEnd {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (_, handle) in tracks.iter() {
                let _ = handle.stop();
            }
        }
        Some(Event::Cancel)
    }
}

/// Builds a [`SongbirdTransport`] per guild.
pub struct SongbirdTransportFactory {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdTransportFactory {
    pub fn new(manager: Arc<Songbird>, http: reqwest::Client) -> Self {
        Self { manager, http }
    }
}

impl TransportFactory for SongbirdTransportFactory {
    fn create(&self, guild_id: GuildId) -> Arc<dyn VoiceTransport> {
        Arc::new(SongbirdTransport::new(
            Arc::clone(&self.manager),
            guild_id,
            self.http.clone(),
        ))
    }
}
