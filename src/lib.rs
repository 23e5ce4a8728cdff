//! spaces-dl - download recorded Twitter/X Spaces
//!
//! This library logs in to X, resolves a recorded Space to its HLS stream,
//! downloads the audio segments with resume and retry, and encodes them into a
//! single MP3 with ffmpeg.
//!
//! # Features
//!
//! - Programmatic login flow with browser fallback
//! - Restartable tasks: resolution results, the manifest and every segment are kept on disk
//! - Bounded per-segment retry with backoff
//! - Progress events for segment download and encoding
//!
//! # Example
//!
//! ```no_run
//! use spaces_dl::{Credentials, Task, TaskOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::new("username", "password");
//!     let mut task = Task::new("1YqKDqDXAbwKV", credentials, "downloads", TaskOptions::default())?;
//!
//!     let mut events = task.subscribe();
//!     tokio::spawn(async move {
//!         while let Some(event) = events.recv().await {
//!             println!("{:?}", event);
//!         }
//!     });
//!
//!     let file = task.run().await?;
//!     println!("Saved {}", file.display());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod audio;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod fs;
pub mod output;
pub mod space;
pub mod task;

// Re-exports for convenience
pub use api::{Credentials, XApi};
pub use config::Config;
pub use error::{Error, ErrorClass, Result};
pub use space::SpaceMetadata;
pub use task::{CancelHandle, Phase, Task, TaskEvent, TaskOptions};
