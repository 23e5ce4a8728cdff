//! Output module for console output and progress.
//!
//! Provides:
//! - Colored console output
//! - Progress bars driven by task events
//! - Statistics reporting

pub mod console;
pub mod progress;
pub mod stats;

pub use console::{
    print_banner, print_error, print_info, print_success, print_task_summary, print_warning,
};
pub use progress::{create_percent_bar, create_spinner, render_events};
pub use stats::print_acquire_stats;
