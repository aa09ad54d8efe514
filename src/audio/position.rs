use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Whole-second playback position, advanced by a background tick.
///
/// Only runs while a source is actually playing; `stop` freezes the value.
#[derive(Debug, Default)]
pub struct PositionTracker {
    position: Arc<AtomicU64>,
    ticker: Option<JoinHandle<()>>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Sets the position without (re)starting the tick.
    pub fn set(&self, seconds: u64) {
        self.position.store(seconds, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Restarts counting from `initial`.
    pub fn start(&mut self, initial: u64) {
        self.stop();
        self.set(initial);

        let position = Arc::clone(&self.position);
        self.ticker = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                position.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for PositionTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counts_seconds_while_running() {
        let mut tracker = PositionTracker::new();
        tracker.start(10);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(tracker.position(), 13);

        tracker.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(tracker.position(), 13);
        assert!(!tracker.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_resets_position() {
        let mut tracker = PositionTracker::new();
        tracker.start(0);
        tokio::time::sleep(Duration::from_millis(2500)).await;

        tracker.start(100);
        assert_eq!(tracker.position(), 100);
    }
}
