//! Snapshot of a resolved space.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::api::types::AudioSpace;
use crate::error::{Error, Result};

/// Immutable view of a recorded space.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceMetadata {
    pub id: String,
    pub title: Option<String>,
    pub media_key: String,
    /// Start of the recording, in milliseconds since the epoch.
    pub started_at: Option<i64>,
    /// End of the recording, in milliseconds since the epoch.
    pub ended_at: Option<i64>,
    /// The account hosting the space has been suspended.
    pub creator_suspended: bool,
    raw: Value,
}

impl SpaceMetadata {
    /// Build from the raw `audioSpace` object returned by the metadata query.
    pub fn from_audio_space(id: &str, raw: Value) -> Result<Self> {
        let space: AudioSpace = serde_json::from_value(raw.clone())?;
        let metadata = space.metadata;

        let media_key = metadata
            .media_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::MissingMediaKey(id.to_string()))?;

        let creator_suspended = metadata
            .creator_results
            .and_then(|c| c.result)
            .is_some_and(|r| r.is_suspended());

        Ok(Self {
            id: id.to_string(),
            title: metadata.title.filter(|t| !t.trim().is_empty()),
            media_key,
            started_at: metadata.started_at,
            ended_at: metadata.ended_at,
            creator_suspended,
            raw,
        })
    }

    /// The audio space object exactly as the server returned it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Title to name the output after; falls back to the space id.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    /// Length of the recording, when both timestamps are known.
    pub fn expected_duration(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.ended_at?);
        u64::try_from(end - start).ok().map(Duration::from_millis)
    }

    pub fn started_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.started_at?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_audio_space() {
        let raw = json!({
            "metadata": {
                "media_key": "28_1700",
                "title": "Rust in production",
                "started_at": 1_700_000_000_000_i64,
                "ended_at": "1700000090000"
            }
        });
        let space = SpaceMetadata::from_audio_space("1abc", raw.clone()).unwrap();
        assert_eq!(space.media_key, "28_1700");
        assert_eq!(space.display_title(), "Rust in production");
        assert_eq!(space.expected_duration(), Some(Duration::from_secs(90)));
        assert_eq!(space.raw(), &raw);
        assert!(!space.creator_suspended);
        assert_eq!(
            space.started_at_utc().unwrap().to_rfc3339(),
            "2023-11-14T22:13:20+00:00"
        );
    }

    #[test]
    fn test_missing_media_key_is_fatal() {
        let raw = json!({ "metadata": { "title": "No key" } });
        assert!(matches!(
            SpaceMetadata::from_audio_space("1abc", raw),
            Err(Error::MissingMediaKey(id)) if id == "1abc"
        ));
    }

    #[test]
    fn test_suspended_creator_flag() {
        let raw = json!({
            "metadata": {
                "media_key": "28_1",
                "creator_results": {
                    "result": { "__typename": "UserUnavailable", "reason": "Suspended" }
                }
            }
        });
        let space = SpaceMetadata::from_audio_space("1abc", raw).unwrap();
        assert!(space.creator_suspended);
        assert_eq!(space.display_title(), "1abc");
        assert_eq!(space.expected_duration(), None);
    }
}
