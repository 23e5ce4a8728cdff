//! Reassembly of downloaded chunks into a single MP3 through ffmpeg.
//!
//! Chunk bytes are concatenated in manifest order and piped into ffmpeg's
//! stdin as raw AAC. ffmpeg reports its position on stdout (`-progress`),
//! and the tail of its stderr is kept for error reporting.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::fs::output_file_name;
use crate::space::SpaceMetadata;

/// Default ffmpeg binary, looked up on `PATH`.
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Lines of ffmpeg stderr kept for error messages.
const STDERR_TAIL_LINES: usize = 200;

/// Encoder position against the expected length of the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeProgress {
    pub elapsed: Duration,
    pub total: Option<Duration>,
}

impl EncodeProgress {
    /// Percentage encoded, when the total length is known.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total?.as_secs_f64();
        if total <= 0.0 {
            return None;
        }
        Some((self.elapsed.as_secs_f64() * 100.0 / total).round().min(100.0) as u8)
    }
}

/// Runs ffmpeg over a task's chunk set.
#[derive(Debug, Clone)]
pub struct Assembler {
    ffmpeg: PathBuf,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG)
    }
}

impl Assembler {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Encode `chunk_names` (in that order) from `chunks_dir` into `out_dir`.
    ///
    /// Returns the path of the written MP3, named after the space title.
    pub async fn assemble(
        &self,
        chunks_dir: &Path,
        chunk_names: &[String],
        space: &SpaceMetadata,
        out_dir: &Path,
        mut on_progress: impl FnMut(EncodeProgress) + Send,
    ) -> Result<PathBuf> {
        let inputs = collect_inputs(chunks_dir, chunk_names).await?;

        fs::create_dir_all(out_dir).await?;
        let output = out_dir.join(output_file_name(space.display_title(), &space.id));
        let total = space.expected_duration();

        tracing::info!(
            "Encoding {} chunks to {}",
            inputs.len(),
            output.display()
        );

        let mut child = Command::new(&self.ffmpeg)
            .args([
                "-y",
                "-hide_banner",
                "-nostats",
                "-f",
                "aac",
                "-i",
                "pipe:0",
                "-ar",
                "44100",
                "-ac",
                "2",
                "-c:a",
                "libmp3lame",
                "-q:a",
                "2",
                "-progress",
                "pipe:1",
                "-f",
                "mp3",
            ])
            .arg(&output)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::FFmpegNotFound
                } else {
                    Error::FFmpeg(format!("Failed to run ffmpeg: {}", e))
                }
            })?;

        let (Some(mut stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(Error::FFmpeg("ffmpeg pipes unavailable".into()));
        };

        let writer = tokio::spawn(async move {
            for path in inputs {
                let bytes = fs::read(&path).await?;
                stdin.write_all(&bytes).await?;
            }
            stdin.shutdown().await
        });

        let stderr_tail = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::trace!("ffmpeg: {}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Vec::from(tail).join("\n")
        });

        let mut progress = BufReader::new(stdout).lines();
        while let Some(line) = progress.next_line().await? {
            if let Some(elapsed) = parse_out_time(&line) {
                on_progress(EncodeProgress { elapsed, total });
            }
        }

        let status = child.wait().await?;
        let written = writer
            .await
            .map_err(|e| Error::FFmpeg(format!("Input writer failed: {}", e)))?;
        let diagnostics = stderr_tail.await.unwrap_or_default();

        if !status.success() {
            let _ = fs::remove_file(&output).await;
            tracing::error!("ffmpeg exited with status {}", status);
            return Err(Error::FFmpeg(if diagnostics.is_empty() {
                format!("ffmpeg exited with status: {}", status)
            } else {
                diagnostics
            }));
        }

        if let Err(e) = written {
            let _ = fs::remove_file(&output).await;
            return Err(Error::FFmpeg(format!("Failed to stream chunks: {}", e)));
        }

        tracing::info!("Audio file created: {}", output.display());
        Ok(output)
    }
}

/// Full paths of the chunks to encode, checked before anything is written.
async fn collect_inputs(chunks_dir: &Path, chunk_names: &[String]) -> Result<Vec<PathBuf>> {
    if chunk_names.is_empty() || !fs::try_exists(chunks_dir).await? {
        return Err(Error::EmptyChunks(chunks_dir.to_path_buf()));
    }

    let mut inputs = Vec::with_capacity(chunk_names.len());
    for name in chunk_names {
        let path = chunks_dir.join(name);
        if !fs::try_exists(&path).await? {
            return Err(Error::MissingChunk(name.clone()));
        }
        inputs.push(path);
    }
    Ok(inputs)
}

/// Parse the `out_time=HH:MM:SS.micros` line of ffmpeg's progress output.
pub fn parse_out_time(line: &str) -> Option<Duration> {
    let value = line.trim().strip_prefix("out_time=")?;
    let mut parts = value.splitn(3, ':');

    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;

    let whole = Duration::from_secs(hours * 3600 + minutes * 60);
    Duration::try_from_secs_f64(seconds)
        .ok()
        .map(|s| whole + s)
}
