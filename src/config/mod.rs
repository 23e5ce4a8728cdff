//! Configuration module for spaces-dl.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - CLI argument parsing and merging
//! - Configuration validation

pub mod loader;
pub mod validation;

pub use loader::{AccountConfig, Config, OptionsConfig, CONFIG_FILE_NAME};
pub use validation::{parse_space_id, validate_config};
