//! Persisted resolution results (`task-metadata.json`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;

use crate::error::Result;
use crate::fs::part_path;
use crate::space::SpaceMetadata;

/// What the Resolve phase produced, kept so a restarted task can skip it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(rename = "audioSpaceData")]
    pub audio_space_data: Value,
    #[serde(rename = "playlistUrl")]
    pub playlist_url: String,
}

impl TaskMetadata {
    pub fn new(space: &SpaceMetadata, playlist_url: &str) -> Self {
        Self {
            audio_space_data: space.raw().clone(),
            playlist_url: playlist_url.to_string(),
        }
    }

    /// Load saved metadata; `None` when the file does not exist.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Save to `path`, replacing any earlier copy in one step.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        let part = part_path(path);
        fs::write(&part, content).await?;
        fs::rename(&part, path).await?;
        tracing::debug!("Saved task metadata to {}", path.display());
        Ok(())
    }

    /// Rebuild the space snapshot this metadata was saved from.
    pub fn space(&self, space_id: &str) -> Result<SpaceMetadata> {
        SpaceMetadata::from_audio_space(space_id, self.audio_space_data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-metadata.json");

        assert_eq!(TaskMetadata::load(&path).await.unwrap(), None);

        let space = SpaceMetadata::from_audio_space(
            "1abc",
            json!({ "metadata": { "media_key": "28_1", "title": "Test" } }),
        )
        .unwrap();
        let saved = TaskMetadata::new(&space, "https://cdn/x/playlist.m3u8");
        saved.save(&path).await.unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["playlistUrl"], "https://cdn/x/playlist.m3u8");
        assert_eq!(raw["audioSpaceData"]["metadata"]["title"], "Test");

        let loaded = TaskMetadata::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.space("1abc").unwrap(), space);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-metadata.json");
        std::fs::write(&path, "{ not json").unwrap();

        tokio_test::assert_err!(TaskMetadata::load(&path).await);
    }
}
