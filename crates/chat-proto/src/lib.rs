//! # chat-proto
//!
//! Wire-level protocol for the chat platform's real-time gateway: operation
//! codes, the OP envelope, control payloads, dispatch event payloads, and the
//! injectable JSON driver. This crate has no knowledge of transports or
//! connection state; it only describes what goes over the wire.

pub mod driver;
pub mod envelope;
pub mod error;
pub mod events;
pub mod opcodes;
pub mod payloads;
pub mod snowflake;

pub use driver::{JsonDriver, SerdeDriver};
pub use envelope::GatewayPayload;
pub use error::ProtocolError;
pub use events::*;
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, Identifier, IdentifyProperties, RequestGuildMembersPayload, ResumePayload,
    StatusUpdatePayload,
};
pub use snowflake::{Snowflake, SnowflakeParseError};
