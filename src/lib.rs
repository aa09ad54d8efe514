//! # Hertz
//!
//! Multi-guild Discord music bot. Each guild gets its own playback engine
//! over a shared, size-bounded track cache on disk.

pub mod audio;
pub mod bot;
pub mod cache;
pub mod config;
pub mod error;
pub mod sources;
pub mod storage;
pub mod utils;
