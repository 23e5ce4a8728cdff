//! M3U8/HLS manifest loading and parsing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::api::XApi;
use crate::error::{Error, Result};
use crate::fs::{part_path, segment_file_name};

/// One segment of the stream, in manifest order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub url: String,
    /// Name of the file the segment is stored under in `chunks/`.
    pub file_name: String,
}

/// Ordered segments of a media manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub url: String,
    /// The manifest URL with its file name stripped; segment URIs resolve against it.
    pub base_url: String,
    pub segments: Vec<Segment>,
}

impl Playlist {
    /// Segment file names in manifest order.
    pub fn file_names(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.file_name.clone()).collect()
    }
}

/// What a manifest turned out to contain.
#[derive(Debug, PartialEq, Eq)]
pub enum Manifest {
    /// Segment URIs, in order.
    Media(Vec<String>),
    /// URI of the highest-bandwidth variant.
    Master(String),
}

/// Load the manifest at `playlist_url`, preferring the copy cached at `cache_path`.
///
/// For a master playlist the chosen variant is cached next to it, so a cached
/// task never needs the network to rebuild its segment list.
pub async fn load_playlist(api: &XApi, playlist_url: &str, cache_path: &Path) -> Result<Playlist> {
    let content = load_manifest(api, playlist_url, cache_path).await?;

    match parse_manifest(&content)? {
        Manifest::Media(uris) => build_playlist(playlist_url, &uris),
        Manifest::Master(variant) => {
            let variant_url = resolve_url(playlist_url, &variant)?;
            tracing::debug!("Following variant playlist {}", variant_url);

            let media = load_manifest(api, &variant_url, &variant_cache_path(cache_path)).await?;
            match parse_manifest(&media)? {
                Manifest::Media(uris) => build_playlist(&variant_url, &uris),
                Manifest::Master(_) => Err(Error::Playlist("Expected media playlist".into())),
            }
        }
    }
}

/// Read `cache_path`, or fetch `url` and cache it there.
async fn load_manifest(api: &XApi, url: &str, cache_path: &Path) -> Result<String> {
    match fs::read_to_string(cache_path).await {
        Ok(content) => {
            tracing::info!("M3U8 playlist already downloaded: {}", cache_path.display());
            Ok(content)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("Downloading playlist");
            let content = fetch_manifest(api, url).await?;
            save_manifest(cache_path, &content).await?;
            Ok(content)
        }
        Err(e) => Err(e.into()),
    }
}

/// Where the variant of a cached master playlist is kept: `playlist.variant.m3u8`.
pub fn variant_cache_path(cache_path: &Path) -> PathBuf {
    cache_path.with_extension("variant.m3u8")
}

/// Fetch manifest text, refusing error pages.
async fn fetch_manifest(api: &XApi, url: &str) -> Result<String> {
    let response = api.get(url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Playlist(format!(
            "Playlist request returned HTTP {}; the playlist URL may have expired",
            status
        )));
    }

    response
        .text()
        .await
        .map_err(|e| Error::Playlist(format!("Failed to read playlist: {}", e)))
}

/// Cache the manifest verbatim; written whole or not at all.
async fn save_manifest(cache_path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let part = part_path(cache_path);
    fs::write(&part, content).await?;
    fs::rename(&part, cache_path).await?;
    Ok(())
}

/// Parse manifest text.
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    let playlist = m3u8_rs::parse_playlist_res(content.as_bytes())
        .map_err(|e| Error::Playlist(format!("Failed to parse playlist: {:?}", e)))?;

    match playlist {
        m3u8_rs::Playlist::MasterPlaylist(master) => master
            .variants
            .iter()
            .max_by_key(|v| v.bandwidth)
            .map(|v| Manifest::Master(v.uri.clone()))
            .ok_or_else(|| Error::Playlist("No variants in master playlist".into())),
        m3u8_rs::Playlist::MediaPlaylist(media) => Ok(Manifest::Media(
            media.segments.into_iter().map(|s| s.uri).collect(),
        )),
    }
}

/// Resolve segment URIs against the manifest location.
///
/// Each segment must map to its own chunk file name.
pub fn build_playlist(playlist_url: &str, uris: &[String]) -> Result<Playlist> {
    if uris.is_empty() {
        return Err(Error::Playlist("No segments found in playlist".into()));
    }

    let base = base_url(playlist_url)?;
    let mut seen = HashSet::new();
    let mut segments = Vec::with_capacity(uris.len());
    for uri in uris {
        let file_name = segment_file_name(uri)?;
        if !seen.insert(file_name.clone()) {
            return Err(Error::Playlist(format!(
                "Segment file name {} appears more than once in the playlist",
                file_name
            )));
        }
        segments.push(Segment {
            url: resolve_url(&base, uri)?,
            file_name,
        });
    }

    Ok(Playlist {
        url: playlist_url.to_string(),
        base_url: base,
        segments,
    })
}

/// The manifest URL with its file name (and query) stripped.
pub fn base_url(playlist_url: &str) -> Result<String> {
    Ok(url::Url::parse(playlist_url)?.join(".")?.to_string())
}

/// Resolve a potentially relative URL against a base URL.
fn resolve_url(base: &str, path: &str) -> Result<String> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Ok(path.to_string());
    }

    let base_url = url::Url::parse(base)?;
    let resolved = base_url.join(path)?;
    Ok(resolved.to_string())
}
