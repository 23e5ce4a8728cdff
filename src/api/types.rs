//! API response type definitions.

use serde::{Deserialize, Deserializer, Serialize};

/// Response of the onboarding (login flow) endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowResponse {
    pub flow_token: String,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl FlowResponse {
    /// The subtask the server wants performed next.
    pub fn next_subtask(&self) -> Option<&str> {
        self.subtasks.first().map(|s| s.subtask_id.as_str())
    }
}

/// One step of the login flow.
#[derive(Debug, Clone, Deserialize)]
pub struct Subtask {
    pub subtask_id: String,
}

/// Response of `account/multi/list.json`.
#[derive(Debug, Deserialize)]
pub struct AccountListResponse {
    #[serde(default)]
    pub users: Vec<AccountStatus>,
}

/// Account status entry.
#[derive(Debug, Deserialize)]
pub struct AccountStatus {
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub is_suspended: bool,
}

/// Envelope of the `AudioSpaceById` GraphQL query.
#[derive(Debug, Deserialize)]
pub struct AudioSpaceByIdResponse {
    pub data: Option<AudioSpaceData>,
}

#[derive(Debug, Deserialize)]
pub struct AudioSpaceData {
    #[serde(rename = "audioSpace")]
    pub audio_space: Option<serde_json::Value>,
}

/// Typed view over the fields of the raw audio space object that we use.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AudioSpace {
    #[serde(default)]
    pub metadata: AudioSpaceMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AudioSpaceMetadata {
    pub media_key: Option<String>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "millis")]
    pub started_at: Option<i64>,
    #[serde(default, deserialize_with = "millis")]
    pub ended_at: Option<i64>,
    pub creator_results: Option<CreatorResults>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatorResults {
    pub result: Option<CreatorResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatorResult {
    #[serde(rename = "__typename")]
    pub typename: Option<String>,
    pub reason: Option<String>,
}

impl CreatorResult {
    pub fn is_suspended(&self) -> bool {
        self.typename.as_deref() == Some("UserUnavailable")
            && self.reason.as_deref() == Some("Suspended")
    }
}

/// Response of `live_video_stream/status/<media_key>`.
#[derive(Debug, Deserialize)]
pub struct LiveStreamStatus {
    pub source: StreamSource,
}

#[derive(Debug, Deserialize)]
pub struct StreamSource {
    pub location: String,
}

/// Timestamps arrive either as numbers or as numeric strings.
fn millis<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(v)) => Some(v),
        Some(Raw::Float(v)) => Some(v as i64),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

/// Variables of the `AudioSpaceById` query.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSpaceVariables<'a> {
    pub id: &'a str,
    pub is_metatags_query: bool,
    pub with_replays: bool,
    pub with_listeners: bool,
}

impl<'a> AudioSpaceVariables<'a> {
    pub fn new(id: &'a str) -> Self {
        Self {
            id,
            is_metatags_query: true,
            with_replays: true,
            with_listeners: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_audio_space_mixed_timestamps() {
        let json = r#"{
            "metadata": {
                "media_key": "28_1234",
                "title": "Weekly sync",
                "state": "Ended",
                "started_at": 1700000000000,
                "ended_at": "1700003600000",
                "creator_results": {"result": {"__typename": "User"}}
            }
        }"#;
        let space: AudioSpace = serde_json::from_str(json).unwrap();
        assert_eq!(space.metadata.media_key.as_deref(), Some("28_1234"));
        assert_eq!(space.metadata.started_at, Some(1_700_000_000_000));
        assert_eq!(space.metadata.ended_at, Some(1_700_003_600_000));
        assert!(!space
            .metadata
            .creator_results
            .unwrap()
            .result
            .unwrap()
            .is_suspended());
    }

    #[test]
    fn test_flow_response_next_subtask() {
        let json = r#"{"flow_token":"g;1","subtasks":[{"subtask_id":"LoginEnterPassword"}]}"#;
        let flow: FlowResponse = serde_json::from_str(json).unwrap();
        assert_eq!(flow.next_subtask(), Some("LoginEnterPassword"));

        let done: FlowResponse = serde_json::from_str(r#"{"flow_token":"g;2"}"#).unwrap();
        assert_eq!(done.next_subtask(), None);
    }

    #[test]
    fn test_variables_serialize_camel_case() {
        let json = serde_json::to_string(&AudioSpaceVariables::new("1abc")).unwrap();
        assert_eq!(
            json,
            r#"{"id":"1abc","isMetatagsQuery":true,"withReplays":true,"withListeners":true}"#
        );
    }
}
