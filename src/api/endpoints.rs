//! Upstream endpoint locations and fixed request parameters.

use serde_json::{json, Value};
use url::Url;

use crate::api::types::AudioSpaceVariables;
use crate::error::Result;

/// Landing page whose inline script carries the guest token.
pub const URL_BASE: &str = "https://twitter.com/?mx=1";

/// Starts a new login flow.
pub const URL_FLOW_START: &str = "https://x.com/i/api/1.1/onboarding/task.json?flow_name=login";

/// Submits a login subtask.
pub const URL_FLOW_TASK: &str = "https://x.com/i/api/1.1/onboarding/task.json";

/// Lists the logged-in accounts with their suspension state.
pub const CHECK_USER_URL: &str = "https://x.com/i/api/1.1/account/multi/list.json";

/// Confirms a session can make authenticated calls.
pub const VERIFY_CREDENTIALS_URL: &str = "https://api.x.com/1.1/account/verify_credentials.json";

/// Browser login page.
pub const LOGIN_PAGE_URL: &str = "https://x.com/i/flow/login";

const SPACE_METADATA_URL: &str =
    "https://x.com/i/api/graphql/SL4eyLXdr1zWZVpXRhxZ4Q/AudioSpaceById";

const PLAYLIST_INFO_URL: &str = "https://x.com/i/api/1.1/live_video_stream/status/";

/// Public bearer token used by the web client.
pub const BEARER: &str = "Bearer AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

/// Build the `AudioSpaceById` query URL for a space.
pub fn space_metadata_url(space_id: &str) -> Result<String> {
    let variables = serde_json::to_string(&AudioSpaceVariables::new(space_id))?;
    let features = serde_json::to_string(&features())?;
    let url = Url::parse_with_params(
        SPACE_METADATA_URL,
        &[("variables", variables), ("features", features)],
    )?;
    Ok(url.into())
}

/// Build the stream status URL for a media key.
pub fn playlist_info_url(media_key: &str) -> String {
    format!("{}{}", PLAYLIST_INFO_URL, media_key)
}

/// Feature switches the GraphQL endpoint expects alongside the query.
pub fn features() -> Value {
    json!({
        "rweb_tipjar_consumption_enabled": true,
        "responsive_web_graphql_exclude_directive_enabled": true,
        "verified_phone_label_enabled": false,
        "creator_subscriptions_tweet_preview_api_enabled": true,
        "responsive_web_graphql_timeline_navigation_enabled": true,
        "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
        "communities_web_enable_tweet_community_results_fetch": true,
        "c9s_tweet_anatomy_moderator_badge_enabled": true,
        "articles_preview_enabled": true,
        "tweetypie_unmention_optimization_enabled": true,
        "responsive_web_edit_tweet_api_enabled": true,
        "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
        "view_counts_everywhere_api_enabled": true,
        "longform_notetweets_consumption_enabled": true,
        "responsive_web_twitter_article_tweet_consumption_enabled": true,
        "tweet_awards_web_tipping_enabled": false,
        "creator_subscriptions_quote_tweet_preview_enabled": false,
        "freedom_of_speech_not_reach_fetch_enabled": true,
        "standardized_nudges_misinfo": true,
        "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": true,
        "rweb_video_timestamps_enabled": true,
        "longform_notetweets_rich_text_read_enabled": true,
        "longform_notetweets_inline_media_enabled": true,
        "responsive_web_enhance_cards_enabled": false,
        "spaces_2022_h2_clipping": false,
        "spaces_2022_h2_spaces_communities": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_metadata_url_encodes_json() {
        let url = Url::parse(&space_metadata_url("1YqKDqDXAbwKV").unwrap()).unwrap();
        let variables = url
            .query_pairs()
            .find(|(k, _)| k == "variables")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        let parsed: Value = serde_json::from_str(&variables).unwrap();
        assert_eq!(parsed["id"], "1YqKDqDXAbwKV");
        assert_eq!(parsed["withReplays"], true);
        assert!(url.query_pairs().any(|(k, _)| k == "features"));
    }

    #[test]
    fn test_playlist_info_url() {
        assert_eq!(
            playlist_info_url("28_123"),
            "https://x.com/i/api/1.1/live_video_stream/status/28_123"
        );
    }
}
