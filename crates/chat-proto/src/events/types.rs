//! Event payload definitions
//!
//! Defines the data structures for each gateway event type. Every event kind
//! owns its payload struct so handlers can be registered against a concrete
//! type.

use crate::snowflake::Snowflake;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// === Shared payload components ===

/// User data included in events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPayload {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

/// Partial user with just an ID
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserIdPayload {
    pub id: Snowflake,
}

/// Unavailable guild stub in READY
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    pub unavailable: bool,
}

/// Channel data included in guild events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelPayload {
    pub id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: i32,
    pub position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Snowflake>,
}

/// Role data included in guild events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RolePayload {
    pub id: Snowflake,
    pub name: String,
    pub permissions: String,
    pub position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<i32>,
}

/// Member data included in guild events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberPayload {
    pub user: UserPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    pub joined_at: String,
}

/// Attachment data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentPayload {
    pub id: Snowflake,
    pub filename: String,
    pub size: i64,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Reaction data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReactionPayload {
    pub emoji: String,
    pub count: i32,
}

/// Message reference for replies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageReferencePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
}

// === Connection Events ===

/// READY event payload
///
/// Sent after successful Identify. `session_id` is what the gateway stores
/// for resuming.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Gateway protocol version
    pub v: i32,

    /// Current user
    pub user: UserPayload,

    /// Guilds the user is in (initially unavailable)
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,

    /// Session ID for resuming
    pub session_id: String,

    /// Gateway URL for resuming (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
}

/// RESUMED event payload
///
/// Sent after successful Resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumedEvent {}

// === Guild Events ===

/// GUILD_CREATE event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildCreateEvent {
    pub id: Snowflake,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner_id: Snowflake,
    #[serde(default)]
    pub channels: Vec<ChannelPayload>,
    #[serde(default)]
    pub roles: Vec<RolePayload>,
    #[serde(default)]
    pub members: Vec<MemberPayload>,
    #[serde(default)]
    pub member_count: i32,
}

/// GUILD_UPDATE event payload (partial update)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildUpdateEvent {
    pub id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Snowflake>,
}

/// GUILD_DELETE event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildDeleteEvent {
    pub id: Snowflake,
    /// If true this is a temporary outage; if false the user left or the
    /// guild was deleted
    #[serde(default)]
    pub unavailable: bool,
}

// === Channel Events ===

/// CHANNEL_CREATE event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelCreateEvent {
    pub id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: i32,
    #[serde(default)]
    pub position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Snowflake>,
}

/// CHANNEL_UPDATE event payload (partial update)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelUpdateEvent {
    pub id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// CHANNEL_DELETE event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelDeleteEvent {
    pub id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(rename = "type", default)]
    pub channel_type: i32,
}

// === Message Events ===

/// MESSAGE_CREATE event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageCreateEvent {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub author: UserPayload,
    pub content: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentPayload>,
    #[serde(default)]
    pub reactions: Vec<ReactionPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReferencePayload>,
}

/// MESSAGE_UPDATE event payload (partial update)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageUpdateEvent {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<String>,
}

/// MESSAGE_DELETE event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDeleteEvent {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
}

// === Reaction Events ===

/// MESSAGE_REACTION_ADD event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageReactionAddEvent {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub emoji: String,
}

/// MESSAGE_REACTION_REMOVE event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageReactionRemoveEvent {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub emoji: String,
}

// === Member Events ===

/// GUILD_MEMBER_ADD event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildMemberAddEvent {
    pub guild_id: Snowflake,
    pub user: UserPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    pub joined_at: String,
}

/// GUILD_MEMBER_UPDATE event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildMemberUpdateEvent {
    pub guild_id: Snowflake,
    pub user: UserIdPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Snowflake>>,
}

/// GUILD_MEMBER_REMOVE event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildMemberRemoveEvent {
    pub guild_id: Snowflake,
    pub user: UserPayload,
}

// === Presence Events ===

/// PRESENCE_UPDATE event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceUpdateEvent {
    pub user: UserIdPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub status: String,
}

/// TYPING_START event payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypingStartEvent {
    pub channel_id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub user_id: Snowflake,
    /// Unix timestamp in seconds
    #[serde(default)]
    pub timestamp: i64,
}

// === User Events ===

/// USER_UPDATE event payload (partial update)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdateEvent {
    pub id: Snowflake,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

// === Fallback ===

/// Any dispatch whose name the registry does not recognize
///
/// Still delivered, so observers can log or inspect it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnknownEvent {
    /// Event name from the `t` field
    pub name: String,
    /// Raw payload from the `d` field
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_event_deserialization() {
        let json = r#"{
            "v": 6,
            "user": {"id": "1", "username": "hime", "discriminator": "0001"},
            "guilds": [{"id": "2", "unavailable": true}],
            "session_id": "abc123"
        }"#;

        let ready: ReadyEvent = serde_json::from_str(json).unwrap();
        assert_eq!(ready.session_id, "abc123");
        assert_eq!(ready.user.username, "hime");
        assert_eq!(ready.guilds.len(), 1);
        assert!(ready.resume_gateway_url.is_none());
    }

    #[test]
    fn test_message_create_event_serialization() {
        let msg = MessageCreateEvent {
            id: Snowflake::new(1),
            channel_id: Snowflake::new(2),
            author: UserPayload {
                id: Snowflake::new(4),
                username: "user".to_string(),
                discriminator: "0001".to_string(),
                avatar: None,
                bot: false,
            },
            content: "Hello!".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("Hello!"));
    }

    #[test]
    fn test_typing_start_event() {
        let json = r#"{"channel_id": "123456", "user_id": "7", "timestamp": 1700000000}"#;
        let typing: TypingStartEvent = serde_json::from_str(json).unwrap();
        assert_eq!(typing.channel_id, Snowflake::new(123456));
        assert!(typing.guild_id.is_none());
    }
}
