//! Filesystem module.
//!
//! Provides:
//! - Task working directory layout
//! - Title sanitization and segment file naming

pub mod naming;
pub mod paths;

pub use naming::{
    make_unique_filename, output_file_name, part_path, sanitize_filename, sanitize_title,
    segment_file_name,
};
pub use paths::{ensure_dir, expand_home, TaskPaths};
