//! Sequential segment download with resume and bounded retry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::fs;

use crate::download::m3u8::Segment;
use crate::download::state::AcquireStats;
use crate::error::{Error, Result};
use crate::fs::part_path;

/// Default number of retries per segment after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Source of segment bodies.
#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    /// Fetch the full body of one segment.
    async fn fetch_segment(&self, url: &str) -> Result<Vec<u8>>;
}

/// How often and how patiently a failing segment is attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Default::default()
        }
    }

    /// Total attempts allowed for one segment.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry number `retry` (1-based): doubling, capped, plus up to 25% jitter.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);

        let jitter_ms = (delay.as_millis() / 4) as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Downloads the segments of one task into its `chunks/` directory.
pub struct SegmentDownloader<'a, F: SegmentFetcher + ?Sized> {
    fetcher: &'a F,
    chunks_dir: PathBuf,
    policy: RetryPolicy,
}

impl<'a, F: SegmentFetcher + ?Sized> SegmentDownloader<'a, F> {
    pub fn new(fetcher: &'a F, chunks_dir: impl Into<PathBuf>, policy: RetryPolicy) -> Self {
        Self {
            fetcher,
            chunks_dir: chunks_dir.into(),
            policy,
        }
    }

    /// Bring the chunk set up to date with `segments`, in order.
    ///
    /// `on_progress` is called once per segment, skipped or fetched, with the
    /// rounded percentage of segments present so far.
    pub async fn download_all(
        &self,
        segments: &[Segment],
        mut on_progress: impl FnMut(u8) + Send,
    ) -> Result<AcquireStats> {
        fs::create_dir_all(&self.chunks_dir).await?;

        let mut stats = AcquireStats::new(segments.len());
        tracing::info!("Downloading {} chunks", segments.len());

        for segment in segments {
            let target = self.chunks_dir.join(&segment.file_name);

            if fs::try_exists(&target).await? {
                tracing::debug!("Chunk already downloaded: {}", segment.file_name);
                stats.increment_skipped();
            } else {
                self.download_one(segment, &target, &mut stats).await?;
                stats.increment_downloaded();
            }

            on_progress(stats.percent());
        }

        tracing::info!(
            "Chunks ready: {} downloaded, {} already present",
            stats.downloaded,
            stats.skipped
        );
        Ok(stats)
    }

    /// Fetch one segment, counting each retry in `stats`.
    async fn download_one(
        &self,
        segment: &Segment,
        target: &Path,
        stats: &mut AcquireStats,
    ) -> Result<()> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.fetcher.fetch_segment(&segment.url).await {
                Ok(bytes) => {
                    write_atomic(target, &bytes).await?;
                    tracing::debug!("Downloaded chunk {} ({} bytes)", segment.file_name, bytes.len());
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        "Chunk {} failed (attempt {}/{}): {}; retrying in {:?}",
                        segment.file_name,
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    stats.increment_retries();
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(Error::SegmentRetriesExhausted {
                        segment: segment.file_name.clone(),
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Write to a `.part` sibling, then rename into place.
async fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let part = part_path(target);
    fs::write(&part, bytes).await?;
    fs::rename(&part, target).await?;
    Ok(())
}
