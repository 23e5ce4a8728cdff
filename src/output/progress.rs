//! Progress bar utilities.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::audio::EncodeProgress;
use crate::output::stats::print_acquire_stats;
use crate::task::{Phase, TaskEvent};

/// Create a spinner for long-running operations.
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Create a 0-100 bar for a phase reporting percentages.
pub fn create_percent_bar(message: &str) -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {} [{{bar:40.cyan/blue}}] {{pos}}% {{msg}}",
                message
            ))
            .unwrap()
            .progress_chars("#>-"),
    );
    bar
}

/// Draw a task's events on the terminal until the task drops its sender.
pub async fn render_events(mut events: UnboundedReceiver<TaskEvent>) {
    let mut current: Option<ProgressBar> = None;

    while let Some(event) = events.recv().await {
        match event {
            TaskEvent::Phase(phase) => {
                if let Some(bar) = current.take() {
                    bar.finish_and_clear();
                }
                current = match phase {
                    Phase::Resolve => Some(create_spinner("Resolving space...")),
                    Phase::Acquire => Some(create_percent_bar("Downloading")),
                    Phase::Assemble => Some(create_percent_bar("Encoding   ")),
                    Phase::Cleanup => None,
                };
            }
            TaskEvent::Progress(pct) => {
                if let Some(bar) = &current {
                    bar.set_position(u64::from(pct));
                }
            }
            TaskEvent::Acquired(stats) => {
                if let Some(bar) = current.take() {
                    bar.finish_and_clear();
                }
                print_acquire_stats(&stats);
            }
            TaskEvent::Encoding(progress) => {
                if let Some(bar) = &current {
                    update_encode_bar(bar, &progress);
                }
            }
        }
    }

    if let Some(bar) = current {
        bar.finish_and_clear();
    }
}

fn update_encode_bar(bar: &ProgressBar, progress: &EncodeProgress) {
    if let Some(pct) = progress.percent() {
        bar.set_position(u64::from(pct));
    }
    bar.set_message(format_elapsed(progress.elapsed));
}

/// `HH:MM:SS` for an encoder position.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
