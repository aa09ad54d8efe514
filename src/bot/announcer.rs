use async_trait::async_trait;
use serenity::http::Http;
use serenity::model::id::ChannelId;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::audio::{Announcer, QueuedTrack};
use crate::utils::pretty_time;

/// Posts "now playing" messages to the text channel a track came from.
///
/// The HTTP client only exists once the gateway is ready; announcements
/// before that are dropped.
#[derive(Default)]
pub struct SerenityAnnouncer {
    http: OnceLock<Arc<Http>>,
}

impl SerenityAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, http: Arc<Http>) {
        if self.http.set(http).is_err() {
            debug!("Cliente HTTP ya configurado para anuncios");
        }
    }
}

pub fn now_playing_line(track: &QueuedTrack, upcoming: usize) -> String {
    let length = if track.is_live {
        "live".to_string()
    } else {
        pretty_time(track.duration)
    };

    let mut line = format!("🎵 Now playing: **{}** by {} [{}]", track.title, track.artist, length);
    if upcoming > 0 {
        line.push_str(&format!(" · {upcoming} up next"));
    }
    line
}

#[async_trait]
impl Announcer for SerenityAnnouncer {
    async fn announce(&self, channel: ChannelId, track: &QueuedTrack, upcoming: usize) {
        let Some(http) = self.http.get() else {
            return;
        };

        if let Err(e) = channel.say(http, now_playing_line(track, upcoming)).await {
            warn!("⚠️ Error anunciando pista en canal {}: {}", channel, e);
        }
    }
}
