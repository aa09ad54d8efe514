use rand::seq::SliceRandom;

use super::track::QueuedTrack;
use crate::error::PlayerError;

/// Ordered tracks plus a cursor at the current one.
///
/// `cursor == len()` means the queue has been played through: there is no
/// current track and the next `add` becomes current.
#[derive(Debug, Clone, Default)]
pub struct TrackQueue {
    tracks: Vec<QueuedTrack>,
    cursor: usize,
}

/// One page of upcoming tracks, numbered relative to the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePage<'a> {
    pub page: usize,
    pub total_pages: usize,
    pub items: Vec<(usize, &'a QueuedTrack)>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn tracks(&self) -> &[QueuedTrack] {
        &self.tracks
    }

    pub fn current(&self) -> Option<&QueuedTrack> {
        self.tracks.get(self.cursor)
    }

    /// Appends, or inserts right after the cursor when `to_front` is set and
    /// the track is not part of a playlist batch.
    pub fn add(&mut self, track: QueuedTrack, to_front: bool) {
        if to_front && !track.belongs_to_playlist() {
            let at = (self.cursor + 1).min(self.tracks.len());
            self.tracks.insert(at, track);
        } else {
            self.tracks.push(track);
        }
    }

    /// Adds a batch keeping its order, with the same placement rule as
    /// [`add`](Self::add).
    pub fn add_all(&mut self, tracks: Vec<QueuedTrack>, to_front: bool) {
        let mut at = (self.cursor + 1).min(self.tracks.len());
        for track in tracks {
            if to_front && !track.belongs_to_playlist() {
                self.tracks.insert(at, track);
                at += 1;
            } else {
                self.tracks.push(track);
            }
        }
    }

    pub fn push_back(&mut self, track: QueuedTrack) {
        self.tracks.push(track);
    }

    /// Moves the cursor `n` ahead if that lands on a track.
    pub fn advance(&mut self, n: usize) -> bool {
        match self.cursor.checked_add(n) {
            Some(next) if next < self.tracks.len() => {
                self.cursor = next;
                true
            }
            _ => false,
        }
    }

    pub fn retreat(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor = (self.cursor - 1).min(self.tracks.len().saturating_sub(1));
        true
    }

    /// Parks the cursor past the last track.
    pub fn finish(&mut self) {
        self.cursor = self.tracks.len();
    }

    /// Drops everything except the current track.
    pub fn clear(&mut self) {
        let current = self.tracks.get(self.cursor).cloned();
        self.tracks.clear();
        self.tracks.extend(current);
        self.cursor = 0;
    }

    pub fn clear_all(&mut self) {
        self.tracks.clear();
        self.cursor = 0;
    }

    pub fn upcoming(&self) -> &[QueuedTrack] {
        let start = (self.cursor + 1).min(self.tracks.len());
        &self.tracks[start..]
    }

    /// Shuffles upcoming tracks; the current one stays put.
    pub fn shuffle(&mut self) {
        let start = (self.cursor + 1).min(self.tracks.len());
        self.tracks[start..].shuffle(&mut rand::thread_rng());
    }

    /// Removes `amount` tracks starting at `index` (1 = next up).
    pub fn remove(&mut self, index: usize, amount: usize) -> Result<Vec<QueuedTrack>, PlayerError> {
        if index == 0 || amount == 0 {
            return Err(PlayerError::OutOfBounds(
                "position and amount must be at least 1".into(),
            ));
        }

        let start = self.cursor + index;
        if start >= self.tracks.len() {
            return Err(PlayerError::OutOfBounds(format!(
                "there is no track at position {index}"
            )));
        }

        let end = (start + amount).min(self.tracks.len());
        Ok(self.tracks.drain(start..end).collect())
    }

    /// Moves the upcoming track at `from` to `to` (both 1 = next up).
    pub fn move_track(&mut self, from: usize, to: usize) -> Result<&QueuedTrack, PlayerError> {
        let upcoming = self.upcoming().len();
        if from == 0 || to == 0 || from > upcoming || to > upcoming {
            return Err(PlayerError::OutOfBounds(format!(
                "positions must be between 1 and {upcoming}"
            )));
        }

        let track = self.tracks.remove(self.cursor + from);
        let at = self.cursor + to;
        self.tracks.insert(at, track);
        Ok(&self.tracks[at])
    }

    /// Pages through upcoming tracks; `page` is 1-based and clamped.
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage<'_> {
        let per_page = per_page.max(1);
        let upcoming = self.upcoming();
        let total_pages = upcoming.len().div_ceil(per_page).max(1);
        let page = page.clamp(1, total_pages);

        let items = upcoming
            .iter()
            .enumerate()
            .skip((page - 1) * per_page)
            .take(per_page)
            .map(|(i, track)| (i + 1, track))
            .collect();

        QueuePage {
            page,
            total_pages,
            items,
        }
    }

    /// Seconds of non-live audio left after the current track.
    pub fn total_duration(&self) -> u64 {
        self.upcoming()
            .iter()
            .filter(|t| !t.is_live)
            .map(|t| t.duration)
            .sum()
    }
}
