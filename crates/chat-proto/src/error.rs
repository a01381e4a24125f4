//! Protocol error types

use crate::opcodes::OpCode;
use thiserror::Error;

/// Errors produced while encoding or decoding gateway frames
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame or payload was not valid JSON for the expected shape
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A different op code was required at this point of the handshake
    #[error("unexpected op code: expected {expected}, got {got}")]
    UnexpectedOpCode { expected: OpCode, got: OpCode },

    /// The op code is never sent server-to-client
    #[error("op code {0} is not valid server-to-client")]
    NotInbound(OpCode),

    /// A handshake-only op code arrived while the session was active
    #[error("op code {0} is not expected while the session is active")]
    UnexpectedWhileActive(OpCode),

    /// The frame required a `d` payload but carried none
    #[error("missing payload for {0}")]
    MissingPayload(OpCode),

    /// A dispatch frame arrived without an event name in `t`
    #[error("dispatch frame is missing the event name")]
    MissingEventName,
}
