//! # Audio Module
//!
//! Per-guild playback engine for Hertz.
//!
//! ## Architecture
//!
//! ### [`player`] - Playback Engine
//! - Idle / Playing / Paused state machine over a [`queue::TrackQueue`]
//! - Resolves each track to a cached file or a remote stream URL
//! - Schedules background cache population and the idle disconnect
//!
//! ### [`queue`] - Queue Model
//! - Ordered tracks plus a cursor at the current one
//! - Front insertion, paging, shuffle, relative remove/move
//!
//! ### [`transport`] - Voice Transport Seam
//! - [`transport::VoiceTransport`] trait, implemented on songbird by
//!   [`songbird_transport::SongbirdTransport`]
//! - Completion callbacks are posted as [`events::EngineEvent`]s, never run
//!   against the engine directly
//!
//! ### [`manager`] - Session Registry
//! - One engine per guild, created on first use, with an event pump task
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use hertz::audio::manager::PlayerManager;
//! use serenity::model::id::{ChannelId, GuildId};
//!
//! # async fn example(manager: PlayerManager, track: hertz::audio::track::QueuedTrack) -> anyhow::Result<()> {
//! let player = manager.get_or_create(GuildId::new(123456789));
//! let mut player = player.lock().await;
//!
//! player.add(track, false);
//! player.connect(Some(ChannelId::new(987654321))).await?;
//! player.play().await?;
//! player.forward(1).await?;
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod manager;
pub mod player;
pub mod position;
pub mod queue;
pub mod songbird_transport;
pub mod track;
pub mod transport;

pub use events::{Announcer, EngineEvent, PlaybackEvent, SilentAnnouncer};
pub use manager::{PlayerManager, SessionServices, SharedPlayer};
pub use player::{Player, PlayerContext, PlayerOptions, PlayerStatus};
pub use queue::TrackQueue;
pub use track::QueuedTrack;
pub use transport::{AudioSource, FinishSignal, SourceInput, TransportFactory, VoiceTransport};
