//! Acquire phase statistics.

/// Counts gathered while bringing the chunk set up to date.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AcquireStats {
    /// Segments listed by the manifest.
    pub total: usize,
    /// Segments fetched during this run.
    pub downloaded: usize,
    /// Segments already on disk from an earlier run.
    pub skipped: usize,
    /// Failed attempts that were retried.
    pub retries: u32,
}

impl AcquireStats {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn increment_downloaded(&mut self) {
        self.downloaded += 1;
    }

    pub fn increment_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn increment_retries(&mut self) {
        self.retries += 1;
    }

    /// Segments present on disk, whether fetched now or earlier.
    pub fn completed(&self) -> usize {
        self.downloaded + self.skipped
    }

    /// Percentage of segments present, rounded to the nearest integer.
    pub fn percent(&self) -> u8 {
        percent(self.completed(), self.total)
    }
}

/// `round(done * 100 / total)`, with an empty set counting as complete.
fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (done.min(total) as f64 * 100.0 / total as f64).round();
    pct as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn test_completed_counts_both() {
        let mut stats = AcquireStats::new(4);
        stats.increment_skipped();
        stats.increment_downloaded();
        assert_eq!(stats.completed(), 2);
        assert_eq!(stats.percent(), 50);
    }
}
