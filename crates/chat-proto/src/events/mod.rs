//! Gateway events
//!
//! The registry side of dispatch frames: event names are mapped to typed
//! decoders, and every decoded event carries a stable [`EventKind`] tag that
//! handler tables match against.

mod types;

pub use types::*;

use crate::error::ProtocolError;
use serde_json::Value;

/// Stable type tag for each event variant
///
/// These are the names sent in the `t` field of dispatch frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Resumed,
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    MessageReactionAdd,
    MessageReactionRemove,
    GuildMemberAdd,
    GuildMemberUpdate,
    GuildMemberRemove,
    PresenceUpdate,
    TypingStart,
    UserUpdate,
    Unknown,
}

impl EventKind {
    /// Get the wire name of this event kind
    ///
    /// [`EventKind::Unknown`] has no fixed wire name; the carried
    /// [`UnknownEvent`] keeps the real one.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelUpdate => "CHANNEL_UPDATE",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::MessageReactionAdd => "MESSAGE_REACTION_ADD",
            Self::MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
            Self::GuildMemberAdd => "GUILD_MEMBER_ADD",
            Self::GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
            Self::GuildMemberRemove => "GUILD_MEMBER_REMOVE",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::TypingStart => "TYPING_START",
            Self::UserUpdate => "USER_UPDATE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded gateway event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Ready(ReadyEvent),
    Resumed(ResumedEvent),
    GuildCreate(GuildCreateEvent),
    GuildUpdate(GuildUpdateEvent),
    GuildDelete(GuildDeleteEvent),
    ChannelCreate(ChannelCreateEvent),
    ChannelUpdate(ChannelUpdateEvent),
    ChannelDelete(ChannelDeleteEvent),
    MessageCreate(MessageCreateEvent),
    MessageUpdate(MessageUpdateEvent),
    MessageDelete(MessageDeleteEvent),
    MessageReactionAdd(MessageReactionAddEvent),
    MessageReactionRemove(MessageReactionRemoveEvent),
    GuildMemberAdd(GuildMemberAddEvent),
    GuildMemberUpdate(GuildMemberUpdateEvent),
    GuildMemberRemove(GuildMemberRemoveEvent),
    PresenceUpdate(PresenceUpdateEvent),
    TypingStart(TypingStartEvent),
    UserUpdate(UserUpdateEvent),
    Unknown(UnknownEvent),
}

impl Event {
    /// The runtime type tag of this event
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Ready(_) => EventKind::Ready,
            Self::Resumed(_) => EventKind::Resumed,
            Self::GuildCreate(_) => EventKind::GuildCreate,
            Self::GuildUpdate(_) => EventKind::GuildUpdate,
            Self::GuildDelete(_) => EventKind::GuildDelete,
            Self::ChannelCreate(_) => EventKind::ChannelCreate,
            Self::ChannelUpdate(_) => EventKind::ChannelUpdate,
            Self::ChannelDelete(_) => EventKind::ChannelDelete,
            Self::MessageCreate(_) => EventKind::MessageCreate,
            Self::MessageUpdate(_) => EventKind::MessageUpdate,
            Self::MessageDelete(_) => EventKind::MessageDelete,
            Self::MessageReactionAdd(_) => EventKind::MessageReactionAdd,
            Self::MessageReactionRemove(_) => EventKind::MessageReactionRemove,
            Self::GuildMemberAdd(_) => EventKind::GuildMemberAdd,
            Self::GuildMemberUpdate(_) => EventKind::GuildMemberUpdate,
            Self::GuildMemberRemove(_) => EventKind::GuildMemberRemove,
            Self::PresenceUpdate(_) => EventKind::PresenceUpdate,
            Self::TypingStart(_) => EventKind::TypingStart,
            Self::UserUpdate(_) => EventKind::UserUpdate,
            Self::Unknown(_) => EventKind::Unknown,
        }
    }

    /// The wire name of this event
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Unknown(ev) => &ev.name,
            other => other.kind().as_str(),
        }
    }
}

/// Typed extraction of an event payload from an [`Event`]
///
/// Implemented by every payload struct, and by [`Event`] itself with
/// `KIND = None` - the universal tag that matches every variant. Handler
/// tables use `KIND` to decide whether an entry fires for a given event.
pub trait EventPayload: Send + Sync + Sized + 'static {
    /// The type tag handlers match against; `None` accepts every event
    const KIND: Option<EventKind>;

    /// Borrow the payload out of an event of the matching variant
    fn from_event(event: &Event) -> Option<&Self>;
}

impl EventPayload for Event {
    const KIND: Option<EventKind> = None;

    fn from_event(event: &Event) -> Option<&Self> {
        Some(event)
    }
}

macro_rules! event_payloads {
    ($($payload:ident => $kind:ident),* $(,)?) => {
        $(
            impl EventPayload for $payload {
                const KIND: Option<EventKind> = Some(EventKind::$kind);

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$kind(payload) => Some(payload),
                        _ => None,
                    }
                }
            }
        )*
    };
}

event_payloads! {
    ReadyEvent => Ready,
    ResumedEvent => Resumed,
    GuildCreateEvent => GuildCreate,
    GuildUpdateEvent => GuildUpdate,
    GuildDeleteEvent => GuildDelete,
    ChannelCreateEvent => ChannelCreate,
    ChannelUpdateEvent => ChannelUpdate,
    ChannelDeleteEvent => ChannelDelete,
    MessageCreateEvent => MessageCreate,
    MessageUpdateEvent => MessageUpdate,
    MessageDeleteEvent => MessageDelete,
    MessageReactionAddEvent => MessageReactionAdd,
    MessageReactionRemoveEvent => MessageReactionRemove,
    GuildMemberAddEvent => GuildMemberAdd,
    GuildMemberUpdateEvent => GuildMemberUpdate,
    GuildMemberRemoveEvent => GuildMemberRemove,
    PresenceUpdateEvent => PresenceUpdate,
    TypingStartEvent => TypingStart,
    UserUpdateEvent => UserUpdate,
    UnknownEvent => Unknown,
}

/// Decode a dispatch payload by event name
///
/// Unrecognized names produce [`Event::Unknown`] carrying the name and raw
/// payload; decode failures of known names are errors.
pub fn decode_event(name: &str, data: Value) -> Result<Event, ProtocolError> {
    let event = match name {
        "READY" => Event::Ready(serde_json::from_value(data)?),
        "RESUMED" => Event::Resumed(serde_json::from_value(data)?),
        "GUILD_CREATE" => Event::GuildCreate(serde_json::from_value(data)?),
        "GUILD_UPDATE" => Event::GuildUpdate(serde_json::from_value(data)?),
        "GUILD_DELETE" => Event::GuildDelete(serde_json::from_value(data)?),
        "CHANNEL_CREATE" => Event::ChannelCreate(serde_json::from_value(data)?),
        "CHANNEL_UPDATE" => Event::ChannelUpdate(serde_json::from_value(data)?),
        "CHANNEL_DELETE" => Event::ChannelDelete(serde_json::from_value(data)?),
        "MESSAGE_CREATE" => Event::MessageCreate(serde_json::from_value(data)?),
        "MESSAGE_UPDATE" => Event::MessageUpdate(serde_json::from_value(data)?),
        "MESSAGE_DELETE" => Event::MessageDelete(serde_json::from_value(data)?),
        "MESSAGE_REACTION_ADD" => Event::MessageReactionAdd(serde_json::from_value(data)?),
        "MESSAGE_REACTION_REMOVE" => Event::MessageReactionRemove(serde_json::from_value(data)?),
        "GUILD_MEMBER_ADD" => Event::GuildMemberAdd(serde_json::from_value(data)?),
        "GUILD_MEMBER_UPDATE" => Event::GuildMemberUpdate(serde_json::from_value(data)?),
        "GUILD_MEMBER_REMOVE" => Event::GuildMemberRemove(serde_json::from_value(data)?),
        "PRESENCE_UPDATE" => Event::PresenceUpdate(serde_json::from_value(data)?),
        "TYPING_START" => Event::TypingStart(serde_json::from_value(data)?),
        "USER_UPDATE" => Event::UserUpdate(serde_json::from_value(data)?),
        _ => Event::Unknown(UnknownEvent {
            name: name.to_string(),
            data,
        }),
    };

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snowflake::Snowflake;
    use serde_json::json;

    #[test]
    fn test_decode_known_event() {
        let data = json!({
            "id": "1",
            "channel_id": "2",
            "author": {"id": "3", "username": "user", "discriminator": "0001"},
            "content": "test",
            "timestamp": "2024-01-01T00:00:00Z"
        });

        let event = decode_event("MESSAGE_CREATE", data).unwrap();
        assert_eq!(event.kind(), EventKind::MessageCreate);
        assert_eq!(event.name(), "MESSAGE_CREATE");

        match event {
            Event::MessageCreate(msg) => assert_eq!(msg.content, "test"),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_decode_unknown_event() {
        let data = json!({"anything": true});
        let event = decode_event("SOMETHING_NEW", data.clone()).unwrap();

        assert_eq!(event.kind(), EventKind::Unknown);
        assert_eq!(event.name(), "SOMETHING_NEW");
        match event {
            Event::Unknown(ev) => assert_eq!(ev.data, data),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_decode_known_event_bad_shape() {
        // A known name with a payload that does not match its struct is an
        // error, not an Unknown event.
        let result = decode_event("READY", json!("not an object"));
        assert!(result.is_err());
    }

    #[test]
    fn test_event_payload_extraction() {
        let event = Event::TypingStart(TypingStartEvent {
            channel_id: Snowflake::new(123456),
            ..Default::default()
        });

        let typing = TypingStartEvent::from_event(&event).unwrap();
        assert_eq!(typing.channel_id, Snowflake::new(123456));

        assert!(MessageCreateEvent::from_event(&event).is_none());

        // The universal tag borrows the whole event back.
        let whole = Event::from_event(&event).unwrap();
        assert_eq!(whole.kind(), EventKind::TypingStart);
    }

    #[test]
    fn test_event_payload_kinds() {
        assert_eq!(ReadyEvent::KIND, Some(EventKind::Ready));
        assert_eq!(UnknownEvent::KIND, Some(EventKind::Unknown));
        assert_eq!(<Event as EventPayload>::KIND, None);
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(EventKind::Ready.as_str(), "READY");
        assert_eq!(EventKind::MessageReactionAdd.as_str(), "MESSAGE_REACTION_ADD");
        assert_eq!(EventKind::TypingStart.as_str(), "TYPING_START");
    }
}
