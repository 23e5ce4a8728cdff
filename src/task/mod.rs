//! Task orchestration.
//!
//! A [`Task`] downloads one space through four ordered phases:
//!
//! 1. **Resolve**: log in, fetch the space metadata and the playlist location.
//!    Skipped when `task-metadata.json` is already in the working directory.
//! 2. **Acquire**: load (or reuse) the manifest and download missing segments.
//! 3. **Assemble**: encode the chunk set into one MP3.
//! 4. **Cleanup**: move the MP3 next to the working directory and delete it.
//!
//! Each phase runs at most once per task. Cancellation is honoured only
//! before a phase starts.

pub mod metadata;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tokio::sync::mpsc;

use crate::api::client::DEFAULT_USER_AGENT;
use crate::api::{authenticate, Credentials, LoginOptions, XApi};
use crate::audio::{Assembler, EncodeProgress, DEFAULT_FFMPEG};
use crate::download::{load_playlist, AcquireStats, Playlist, RetryPolicy, SegmentDownloader};
use crate::error::{Error, Result};
use crate::fs::{ensure_dir, make_unique_filename, sanitize_filename, TaskPaths};
use crate::space::{resolve_playlist_url, resolve_space, SpaceMetadata};

pub use metadata::TaskMetadata;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Orchestrator phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Resolve,
    Acquire,
    Assemble,
    Cleanup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Resolve => "Resolve",
            Phase::Acquire => "Acquire",
            Phase::Assemble => "Assemble",
            Phase::Cleanup => "Cleanup",
        };
        f.write_str(name)
    }
}

/// Events published to a task's subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// A phase has started.
    Phase(Phase),
    /// Percentage of segments on disk, non-decreasing within Acquire.
    Progress(u8),
    /// Segment download finished.
    Acquired(AcquireStats),
    /// Encoder position during Assemble.
    Encoding(EncodeProgress),
}

/// Knobs for a single task.
#[derive(Debug, Clone)]
pub struct TaskOptions {
    pub login: LoginOptions,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub ffmpeg_path: PathBuf,
    pub user_agent: String,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            login: LoginOptions::default(),
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Requests that a task stop before its next phase.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Download of one space into `<output>/task-<id>/`.
pub struct Task {
    id: String,
    credentials: Credentials,
    options: TaskOptions,
    paths: TaskPaths,
    api: XApi,
    space: Option<SpaceMetadata>,
    playlist_url: Option<String>,
    playlist: Option<Playlist>,
    output_file: Option<PathBuf>,
    started: Vec<Phase>,
    events: Option<mpsc::UnboundedSender<TaskEvent>>,
    cancel: CancelHandle,
}

impl Task {
    /// Create a task. Nothing touches the disk or network until a phase runs.
    pub fn new(
        id: &str,
        credentials: Credentials,
        output_dir: impl AsRef<Path>,
        options: TaskOptions,
    ) -> Result<Self> {
        let id = sanitize_filename(id.trim())?;
        let api = XApi::new(&options.user_agent, options.request_timeout)?;

        Ok(Self {
            paths: TaskPaths::new(output_dir.as_ref(), &id),
            id,
            credentials,
            options,
            api,
            space: None,
            playlist_url: None,
            playlist: None,
            output_file: None,
            started: Vec::new(),
            events: None,
            cancel: CancelHandle::default(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn paths(&self) -> &TaskPaths {
        &self.paths
    }

    /// Metadata of the space, once resolved.
    pub fn space(&self) -> Option<&SpaceMetadata> {
        self.space.as_ref()
    }

    /// Receive this task's events. Replaces any earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TaskEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Resolve, acquire, assemble and clean up; returns the final file path.
    ///
    /// On failure the working directory is left in place so a new task for
    /// the same space resumes from it.
    pub async fn run(&mut self) -> Result<PathBuf> {
        let assembled = self.process().await?;
        Ok(self.cleanup().await?.unwrap_or(assembled))
    }

    /// Like [`Task::run`], but cleans up after a failure too.
    ///
    /// A cleanup failure following an earlier failure is only logged.
    pub async fn run_and_clean(&mut self) -> Result<PathBuf> {
        match self.process().await {
            Ok(assembled) => Ok(self.cleanup().await?.unwrap_or(assembled)),
            Err(e) => {
                if let Err(cleanup_err) = self.cleanup().await {
                    tracing::error!("Cleanup after failed task {} failed: {}", self.id, cleanup_err);
                }
                Err(e)
            }
        }
    }

    /// Run Resolve, Acquire and Assemble, leaving the working directory in place.
    pub async fn process(&mut self) -> Result<PathBuf> {
        self.resolve().await?;
        self.acquire().await?;
        self.assemble().await
    }

    /// Resolve phase.
    pub async fn resolve(&mut self) -> Result<&SpaceMetadata> {
        self.begin(Phase::Resolve)?;
        let (space, playlist_url) = self
            .resolve_inner()
            .await
            .map_err(|e| e.in_phase(Phase::Resolve))?;

        self.playlist_url = Some(playlist_url);
        Ok(self.space.insert(space))
    }

    async fn resolve_inner(&mut self) -> Result<(SpaceMetadata, String)> {
        ensure_dir(&self.paths.work_dir).await?;

        if let Some(saved) = TaskMetadata::load(&self.paths.metadata_file).await? {
            tracing::info!("Task metadata found, skipping login and metadata lookup");
            let space = saved.space(&self.id)?;
            log_space_summary(&space);
            return Ok((space, saved.playlist_url));
        }

        authenticate(&mut self.api, &self.credentials, &self.options.login).await?;

        let space = resolve_space(&self.api, &self.id).await?;
        if space.creator_suspended {
            tracing::warn!("The host of space {} is suspended", self.id);
        }
        log_space_summary(&space);

        let playlist_url = resolve_playlist_url(&self.api, &space.media_key).await?;
        TaskMetadata::new(&space, &playlist_url)
            .save(&self.paths.metadata_file)
            .await?;

        Ok((space, playlist_url))
    }

    /// Acquire phase.
    pub async fn acquire(&mut self) -> Result<AcquireStats> {
        self.begin(Phase::Acquire)?;
        self.acquire_inner()
            .await
            .map_err(|e| e.in_phase(Phase::Acquire))
    }

    async fn acquire_inner(&mut self) -> Result<AcquireStats> {
        let playlist_url = self.playlist_url.clone().ok_or(Error::PhaseOrder {
            phase: Phase::Acquire,
            requires: Phase::Resolve,
        })?;

        let playlist = load_playlist(&self.api, &playlist_url, &self.paths.playlist_file)
            .await
            .map_err(|e| match e {
                Error::Playlist(msg) => Error::Playlist(format!(
                    "{}; delete {} to resolve the space again",
                    msg,
                    self.paths.metadata_file.display()
                )),
                other => other,
            })?;
        tracing::debug!(
            "Playlist {} lists {} segments under {}",
            playlist.url,
            playlist.segments.len(),
            playlist.base_url
        );

        let events = self.events.clone();
        let downloader =
            SegmentDownloader::new(&self.api, &self.paths.chunks_dir, self.options.retry);
        let stats = downloader
            .download_all(&playlist.segments, |pct| {
                send_event(&events, TaskEvent::Progress(pct))
            })
            .await?;

        self.emit(TaskEvent::Acquired(stats));
        self.playlist = Some(playlist);
        Ok(stats)
    }

    /// Assemble phase; returns the MP3 inside the working directory.
    pub async fn assemble(&mut self) -> Result<PathBuf> {
        self.begin(Phase::Assemble)?;
        self.assemble_inner()
            .await
            .map_err(|e| e.in_phase(Phase::Assemble))
    }

    async fn assemble_inner(&mut self) -> Result<PathBuf> {
        let space = self.space.as_ref().ok_or(Error::PhaseOrder {
            phase: Phase::Assemble,
            requires: Phase::Resolve,
        })?;
        let playlist = self.playlist.as_ref().ok_or(Error::PhaseOrder {
            phase: Phase::Assemble,
            requires: Phase::Acquire,
        })?;

        let events = self.events.clone();
        let output = Assembler::new(&self.options.ffmpeg_path)
            .assemble(
                &self.paths.chunks_dir,
                &playlist.file_names(),
                space,
                &self.paths.out_dir,
                |progress| send_event(&events, TaskEvent::Encoding(progress)),
            )
            .await?;

        self.output_file = Some(output.clone());
        Ok(output)
    }

    /// Cleanup phase: move the assembled file (if any) into the output
    /// directory and delete the working directory.
    pub async fn cleanup(&mut self) -> Result<Option<PathBuf>> {
        self.begin(Phase::Cleanup)?;
        self.cleanup_inner()
            .await
            .map_err(|e| e.in_phase(Phase::Cleanup))
    }

    async fn cleanup_inner(&mut self) -> Result<Option<PathBuf>> {
        let moved = match self.output_file.take() {
            Some(output) => {
                let file_name = output.file_name().ok_or_else(|| {
                    Error::InvalidFilename(output.display().to_string())
                })?;
                let target = make_unique_filename(&self.paths.output_dir.join(file_name));
                fs::rename(&output, &target).await?;
                tracing::info!("Moved {} to {}", output.display(), target.display());
                Some(target)
            }
            None => None,
        };

        if fs::try_exists(&self.paths.work_dir).await? {
            fs::remove_dir_all(&self.paths.work_dir).await?;
            tracing::debug!("Removed {}", self.paths.work_dir.display());
        }

        Ok(moved)
    }

    /// Gate a phase on cancellation and the at-most-once rule.
    fn begin(&mut self, phase: Phase) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled(phase));
        }
        if self.started.contains(&phase) {
            return Err(Error::PhaseAlreadyRun(phase));
        }

        self.started.push(phase);
        tracing::info!("[{}] {} phase", self.id, phase);
        self.emit(TaskEvent::Phase(phase));
        Ok(())
    }

    fn emit(&self, event: TaskEvent) {
        send_event(&self.events, event);
    }
}

fn send_event(events: &Option<mpsc::UnboundedSender<TaskEvent>>, event: TaskEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is listening.
        let _ = tx.send(event);
    }
}

fn log_space_summary(space: &SpaceMetadata) {
    tracing::info!("Space: {}", space.display_title());
    if let Some(started) = space.started_at_utc() {
        tracing::info!("Started at {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(duration) = space.expected_duration() {
        let secs = duration.as_secs();
        tracing::info!(
            "Duration {:02}:{:02}:{:02}",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MANIFEST: &str = "#EXTM3U
#EXT-X-TARGETDURATION:3
#EXTINF:3.000,
a.ts
#EXTINF:3.000,
b.ts
#EXTINF:3.000,
c.ts
#EXT-X-ENDLIST
";

    fn options() -> TaskOptions {
        TaskOptions {
            request_timeout: Duration::from_secs(1),
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ..Default::default()
        }
    }

    fn new_task(output: &Path) -> Task {
        Task::new(
            "1abc",
            Credentials::new("nobody", "wrong"),
            output,
            options(),
        )
        .unwrap()
    }

    fn persist_metadata(task: &Task) {
        std::fs::create_dir_all(&task.paths().work_dir).unwrap();
        let saved = json!({
            "audioSpaceData": { "metadata": { "title": "Test", "media_key": "28_1" } },
            "playlistUrl": "https://cdn/x/playlist.m3u8"
        });
        std::fs::write(&task.paths().metadata_file, saved.to_string()).unwrap();
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TaskEvent>) -> Vec<TaskEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_resolve_uses_persisted_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = new_task(dir.path());
        persist_metadata(&task);

        // The credentials are invalid, so success means nothing was sent.
        let space = task.resolve().await.unwrap();
        assert_eq!(space.display_title(), "Test");
        assert_eq!(space.media_key, "28_1");
        assert_eq!(
            task.playlist_url.as_deref(),
            Some("https://cdn/x/playlist.m3u8")
        );
    }

    #[tokio::test]
    async fn test_acquire_resumes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = new_task(dir.path());
        let mut rx = task.subscribe();
        persist_metadata(&task);
        std::fs::write(&task.paths().playlist_file, MANIFEST).unwrap();
        std::fs::create_dir_all(&task.paths().chunks_dir).unwrap();
        for name in ["a.ts", "b.ts", "c.ts"] {
            std::fs::write(task.paths().chunk(name), name).unwrap();
        }

        task.resolve().await.unwrap();
        let stats = task.acquire().await.unwrap();

        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.downloaded, 0);
        assert_eq!(
            drain(&mut rx),
            vec![
                TaskEvent::Phase(Phase::Resolve),
                TaskEvent::Phase(Phase::Acquire),
                TaskEvent::Progress(33),
                TaskEvent::Progress(67),
                TaskEvent::Progress(100),
                TaskEvent::Acquired(stats),
            ]
        );
    }

    #[tokio::test]
    async fn test_phase_runs_at_most_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = new_task(dir.path());
        persist_metadata(&task);

        tokio_test::assert_ok!(task.resolve().await);
        assert!(matches!(
            task.resolve().await,
            Err(Error::PhaseAlreadyRun(Phase::Resolve))
        ));
    }

    #[tokio::test]
    async fn test_acquire_requires_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = new_task(dir.path());

        let err = task.acquire().await.unwrap_err();
        assert!(err.to_string().contains("needs the Resolve phase"));
    }

    #[tokio::test]
    async fn test_cancel_before_phase() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = new_task(dir.path());
        task.cancel_handle().cancel();

        let err = task.run().await.unwrap_err();
        assert!(matches!(err, Error::Cancelled(Phase::Resolve)));
        assert!(!task.paths().work_dir.exists());
    }

    #[tokio::test]
    async fn test_cleanup_moves_output_and_removes_workdir() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = new_task(dir.path());
        let out_dir = task.paths().out_dir.clone();
        std::fs::create_dir_all(&out_dir).unwrap();
        std::fs::write(out_dir.join("Test.mp3"), b"mp3").unwrap();
        std::fs::write(dir.path().join("Test.mp3"), b"older").unwrap();
        task.output_file = Some(out_dir.join("Test.mp3"));

        let moved = task.cleanup().await.unwrap().unwrap();

        assert_eq!(moved, dir.path().join("Test_1.mp3"));
        assert_eq!(std::fs::read(&moved).unwrap(), b"mp3");
        assert_eq!(std::fs::read(dir.path().join("Test.mp3")).unwrap(), b"older");
        assert!(!task.paths().work_dir.exists());
    }

    #[tokio::test]
    async fn test_failed_run_keeps_workdir_but_service_path_cleans() {
        let dir = tempfile::tempdir().unwrap();

        let mut task = new_task(dir.path());
        persist_metadata(&task);
        std::fs::write(&task.paths().playlist_file, MANIFEST).unwrap();
        std::fs::create_dir_all(&task.paths().chunks_dir).unwrap();
        for name in ["a.ts", "b.ts", "c.ts"] {
            std::fs::write(task.paths().chunk(name), name).unwrap();
        }

        let err = task.run().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Phase {
                phase: Phase::Assemble,
                ..
            }
        ));
        assert!(task.paths().chunk("c.ts").exists());

        let mut service_task = new_task(dir.path());
        let err = service_task.run_and_clean().await.unwrap_err();
        assert!(err.to_string().contains("FFmpeg not found"));
        assert!(!service_task.paths().work_dir.exists());
    }

    #[test]
    fn test_task_rejects_path_like_ids() {
        assert!(Task::new(
            "../etc",
            Credentials::new("a", "b"),
            "/tmp",
            TaskOptions::default()
        )
        .is_err());
    }
}
