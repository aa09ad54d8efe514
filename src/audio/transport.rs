use async_trait::async_trait;
use serenity::model::id::ChannelId;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::events::EngineEvent;
use crate::error::TransportError;

/// Where the transport reads audio from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    /// A file in the content cache.
    File(PathBuf),
    /// A remote stream URL.
    Url(String),
}

/// A ready-to-stream source handed to [`VoiceTransport::play`].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSource {
    pub input: SourceInput,
    /// Absolute offset into the media to start from.
    pub start_at: Duration,
    /// Absolute offset to stop at (chapters); `None` plays to the end.
    pub end_at: Option<Duration>,
    /// 0.0 - 1.0
    pub gain: f32,
}

impl AudioSource {
    pub fn is_cached(&self) -> bool {
        matches!(self.input, SourceInput::File(_))
    }
}

/// One-shot completion callback for a single `play` call.
///
/// Safe to fire from any thread: it only sends on the session's channel.
#[derive(Debug)]
pub struct FinishSignal {
    generation: u64,
    events: flume::Sender<EngineEvent>,
}

impl FinishSignal {
    pub fn new(generation: u64, events: flume::Sender<EngineEvent>) -> Self {
        Self { generation, events }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fire(self, error: Option<String>) {
        let event = EngineEvent::TrackFinished {
            generation: self.generation,
            error,
        };
        if self.events.send(event).is_err() {
            debug!("Sesión cerrada, fin de pista {} descartado", self.generation);
        }
    }
}

/// Network voice streaming for one guild.
///
/// `on_finished` must fire at most once per `play` call: when the source
/// ends, errors, or is stopped.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Joins `channel`, moving if already connected elsewhere.
    async fn connect(&self, channel: ChannelId) -> Result<(), TransportError>;

    async fn play(&self, source: AudioSource, on_finished: FinishSignal) -> Result<(), TransportError>;

    async fn pause(&self) -> Result<(), TransportError>;

    async fn resume(&self) -> Result<(), TransportError>;

    async fn stop(&self);

    async fn set_gain(&self, gain: f32) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn is_playing(&self) -> bool;

    fn is_paused(&self) -> bool;

    fn current_channel(&self) -> Option<ChannelId>;
}

/// Builds a transport per guild for the session manager.
pub trait TransportFactory: Send + Sync {
    fn create(&self, guild_id: serenity::model::id::GuildId) -> std::sync::Arc<dyn VoiceTransport>;
}
