//! Space and playlist location lookup.

use crate::api::endpoints::{playlist_info_url, space_metadata_url};
use crate::api::types::{AudioSpaceByIdResponse, LiveStreamStatus};
use crate::api::XApi;
use crate::error::{Error, Result};
use crate::space::SpaceMetadata;

/// Fetch the metadata of a space and derive its media key.
pub async fn resolve_space(api: &XApi, space_id: &str) -> Result<SpaceMetadata> {
    tracing::info!("Retrieving space metadata: [{}]", space_id);

    let url = space_metadata_url(space_id)?;
    let response: AudioSpaceByIdResponse = api.get_json(&url, "space metadata").await?;

    let raw = response
        .data
        .and_then(|d| d.audio_space)
        .filter(|v| !v.is_null())
        .ok_or_else(|| Error::MissingMediaKey(space_id.to_string()))?;

    tracing::info!("Retrieving media key...");
    let space = SpaceMetadata::from_audio_space(space_id, raw)?;
    tracing::debug!("Media key for {}: {}", space_id, space.media_key);

    Ok(space)
}

/// Exchange a media key for the location of the stream manifest.
pub async fn resolve_playlist_url(api: &XApi, media_key: &str) -> Result<String> {
    let status: LiveStreamStatus = api
        .get_json(&playlist_info_url(media_key), "stream status")
        .await?;

    if status.source.location.is_empty() {
        return Err(Error::Playlist(format!(
            "No playlist location for media key {}",
            media_key
        )));
    }

    tracing::debug!("Playlist URL: {}", status.source.location);
    Ok(status.source.location)
}
