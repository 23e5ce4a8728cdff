//! Download module for stream acquisition.
//!
//! This module provides:
//! - M3U8/HLS manifest loading and caching
//! - Sequential segment download with resume and retry
//! - Acquire statistics

pub mod m3u8;
pub mod segments;
pub mod state;

pub use m3u8::{load_playlist, Playlist, Segment};
pub use segments::{RetryPolicy, SegmentDownloader, SegmentFetcher, DEFAULT_MAX_RETRIES};
pub use state::AcquireStats;
