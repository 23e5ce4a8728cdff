//! Space metadata resolution.

pub mod metadata;
pub mod resolver;

pub use metadata::SpaceMetadata;
pub use resolver::{resolve_playlist_url, resolve_space};
