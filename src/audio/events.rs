use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};

use super::track::QueuedTrack;

/// Messages posted into a session's sequential event stream.
///
/// Transport callbacks and timers never touch the engine directly; they
/// send one of these and the session's pump applies it under the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The source started with `generation` ended, possibly with an error.
    TrackFinished {
        generation: u64,
        error: Option<String>,
    },
    /// The idle-disconnect timer `timer` expired.
    IdleTimeout { timer: u64 },
    /// Voice activity from a listener, used for volume ducking.
    Speaking { user_id: UserId, speaking: bool },
}

/// Notifications for listeners outside the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Play { guild_id: GuildId, title: String },
    Resume { guild_id: GuildId },
    Pause { guild_id: GuildId },
    Seek { guild_id: GuildId, position: u64 },
    Skip { guild_id: GuildId, cursor: usize },
    Back { guild_id: GuildId, cursor: usize },
    QueueEnd { guild_id: GuildId },
    Stop { guild_id: GuildId },
    Disconnect { guild_id: GuildId },
}

/// Posts "now playing" messages when auto-announce is enabled.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, channel: ChannelId, track: &QueuedTrack, upcoming: usize);
}

/// Announcer that stays quiet.
pub struct SilentAnnouncer;

#[async_trait]
impl Announcer for SilentAnnouncer {
    async fn announce(&self, _channel: ChannelId, _track: &QueuedTrack, _upcoming: usize) {}
}
