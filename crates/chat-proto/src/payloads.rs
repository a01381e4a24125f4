//! Control payload definitions
//!
//! Defines the payload structures carried by non-dispatch op codes.

use crate::snowflake::Snowflake;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Payload for op 10 (Hello)
///
/// First frame the server sends after the socket is established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    /// Create a Hello payload with the given interval
    #[must_use]
    pub fn new(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }

    /// The heartbeat interval as a duration
    #[must_use]
    pub fn heartrate(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval)
    }
}

/// Client connection properties reported in Identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    /// Operating system
    pub os: String,

    /// Browser or client name
    pub browser: String,

    /// Device type
    pub device: String,
}

impl IdentifyProperties {
    /// Library identifier used for the default browser/device fields
    pub const LIBRARY: &'static str = "chat-client";
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: Self::LIBRARY.to_string(),
            device: Self::LIBRARY.to_string(),
        }
    }
}

/// Payload for op 2 (Identify)
///
/// Authenticates a fresh session. Built once at gateway construction and
/// reused across reconnects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    /// Authentication token
    pub token: String,

    /// Client properties
    pub properties: IdentifyProperties,

    /// Whether the client accepts compressed payloads
    #[serde(default)]
    pub compress: bool,

    /// Member count threshold above which offline members are omitted
    pub large_threshold: u32,

    /// Shard assignment as `[shard_id, shard_count]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,

    /// Initial presence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence: Option<StatusUpdatePayload>,
}

impl Identifier {
    /// Default threshold for omitting offline members
    pub const DEFAULT_LARGE_THRESHOLD: u32 = 50;

    /// Create an Identify payload with default properties
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_properties(token, IdentifyProperties::default())
    }

    /// Create an Identify payload with custom properties
    #[must_use]
    pub fn with_properties(token: impl Into<String>, properties: IdentifyProperties) -> Self {
        Self {
            token: token.into(),
            properties,
            compress: false,
            large_threshold: Self::DEFAULT_LARGE_THRESHOLD,
            shard: None,
            presence: None,
        }
    }
}

/// Payload for op 3 (Status Update)
///
/// Sent by the client to change its presence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdatePayload {
    /// New status (online, idle, dnd, offline)
    pub status: String,

    /// Optional free-form status text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
}

impl StatusUpdatePayload {
    /// Valid status values
    pub const VALID_STATUSES: &'static [&'static str] = &["online", "idle", "dnd", "offline"];

    /// Create a status update with no custom text
    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            custom_status: None,
        }
    }

    /// Check if the status is valid
    #[must_use]
    pub fn is_valid_status(&self) -> bool {
        Self::VALID_STATUSES.contains(&self.status.as_str())
    }
}

/// Payload for op 6 (Resume)
///
/// Re-attaches to a dropped session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Authentication token
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: u64,
}

/// Payload for op 8 (Request Guild Members)
///
/// Passed through verbatim; the server answers with member chunk dispatches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    /// Guild to query
    pub guild_id: Snowflake,

    /// Username prefix filter; empty matches everyone
    #[serde(default)]
    pub query: String,

    /// Maximum number of members to return; 0 means no limit
    #[serde(default)]
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_payload() {
        let hello = HelloPayload::new(45_000);
        assert_eq!(hello.heartbeat_interval, 45_000);
        assert_eq!(hello.heartrate(), Duration::from_secs(45));
    }

    #[test]
    fn test_identify_properties_default() {
        let props = IdentifyProperties::default();
        assert_eq!(props.os, std::env::consts::OS);
        assert_eq!(props.browser, "chat-client");
        assert_eq!(props.device, "chat-client");
    }

    #[test]
    fn test_identifier_serialization() {
        let identifier = Identifier::new("token123");

        let json = serde_json::to_string(&identifier).unwrap();
        assert!(json.contains("token123"));
        assert!(json.contains("large_threshold"));
        // Unset optional fields stay off the wire.
        assert!(!json.contains("shard"));
        assert!(!json.contains("presence"));
    }

    #[test]
    fn test_status_update_validation() {
        let valid = StatusUpdatePayload::new("online");
        assert!(valid.is_valid_status());

        let invalid = StatusUpdatePayload::new("busy");
        assert!(!invalid.is_valid_status());
    }

    #[test]
    fn test_resume_payload_serialization() {
        let payload = ResumePayload {
            token: "token123".to_string(),
            session_id: "session456".to_string(),
            seq: 42,
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("session456"));
        assert!(json.contains("42"));
    }

    #[test]
    fn test_request_guild_members_defaults() {
        let req: RequestGuildMembersPayload =
            serde_json::from_str(r#"{"guild_id":"1"}"#).unwrap();
        assert_eq!(req.guild_id, Snowflake::new(1));
        assert_eq!(req.query, "");
        assert_eq!(req.limit, 0);
    }
}
