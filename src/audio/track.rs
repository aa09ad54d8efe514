use serenity::model::id::{ChannelId, UserId};

use crate::sources::{MediaSource, PlaylistRef, TrackMetadata};

/// A track sitting in a guild's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTrack {
    pub title: String,
    pub artist: String,
    pub locator: String,
    pub duration: u64,
    pub start_offset: u64,
    pub is_live: bool,
    pub thumbnail: Option<String>,
    pub playlist: Option<PlaylistRef>,
    pub source: MediaSource,
    /// Text channel the track was added from.
    pub added_in_channel: ChannelId,
    pub requested_by: UserId,
}

impl QueuedTrack {
    pub fn new(metadata: TrackMetadata, added_in_channel: ChannelId, requested_by: UserId) -> Self {
        Self {
            title: metadata.title,
            artist: metadata.artist,
            locator: metadata.locator,
            duration: metadata.duration,
            start_offset: metadata.start_offset,
            is_live: metadata.is_live,
            thumbnail: metadata.thumbnail,
            playlist: metadata.playlist,
            source: metadata.source,
            added_in_channel,
            requested_by,
        }
    }

    pub fn metadata(&self) -> TrackMetadata {
        TrackMetadata {
            title: self.title.clone(),
            artist: self.artist.clone(),
            locator: self.locator.clone(),
            duration: self.duration,
            start_offset: self.start_offset,
            is_live: self.is_live,
            thumbnail: self.thumbnail.clone(),
            playlist: self.playlist.clone(),
            source: self.source,
        }
    }

    /// Identity used to tell a resume from a fresh start. Chapters of the
    /// same video are different tracks.
    pub fn identity(&self) -> String {
        format!("{}#{}", self.locator, self.start_offset)
    }

    pub fn belongs_to_playlist(&self) -> bool {
        self.playlist.is_some()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn track(name: &str, duration: u64) -> QueuedTrack {
        QueuedTrack {
            title: name.to_string(),
            artist: "Artist".to_string(),
            locator: format!("id-{name}"),
            duration,
            start_offset: 0,
            is_live: false,
            thumbnail: None,
            playlist: None,
            source: MediaSource::YouTube,
            added_in_channel: ChannelId::new(10),
            requested_by: UserId::new(20),
        }
    }

    pub fn playlist_track(name: &str, duration: u64) -> QueuedTrack {
        QueuedTrack {
            playlist: Some(PlaylistRef {
                title: "Mix".into(),
                source: "PL1".into(),
            }),
            ..track(name, duration)
        }
    }

    pub fn live_track(name: &str) -> QueuedTrack {
        QueuedTrack {
            is_live: true,
            duration: 0,
            source: MediaSource::Http,
            locator: format!("https://radio.example/{name}"),
            ..track(name, 0)
        }
    }
}
