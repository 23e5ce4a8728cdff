//! Working directory layout of a task.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Persisted resolution results.
pub const METADATA_FILE: &str = "task-metadata.json";

/// Cached copy of the stream manifest.
pub const PLAYLIST_FILE: &str = "playlist.m3u8";

/// One file per downloaded segment.
pub const CHUNKS_DIR: &str = "chunks";

/// Assembled audio before it is moved out of the working directory.
pub const OUT_DIR: &str = "out";

/// Paths making up a task's on-disk state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPaths {
    /// Where the final file ends up.
    pub output_dir: PathBuf,
    /// `<output>/task-<id>/`
    pub work_dir: PathBuf,
    pub metadata_file: PathBuf,
    pub playlist_file: PathBuf,
    pub chunks_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl TaskPaths {
    pub fn new(output_dir: &Path, space_id: &str) -> Self {
        let work_dir = output_dir.join(format!("task-{}", space_id));
        Self {
            output_dir: output_dir.to_path_buf(),
            metadata_file: work_dir.join(METADATA_FILE),
            playlist_file: work_dir.join(PLAYLIST_FILE),
            chunks_dir: work_dir.join(CHUNKS_DIR),
            out_dir: work_dir.join(OUT_DIR),
            work_dir,
        }
    }

    /// Location of a segment file inside `chunks/`.
    pub fn chunk(&self, file_name: &str) -> PathBuf {
        self.chunks_dir.join(file_name)
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    path.to_path_buf()
}

/// Ensure a directory exists, creating it if necessary.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}
