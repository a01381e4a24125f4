//! Gateway frame envelope
//!
//! All frames exchanged over the WebSocket connection follow this format.

use crate::driver::JsonDriver;
use crate::error::ProtocolError;
use crate::opcodes::OpCode;
use crate::payloads::HelloPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway frame envelope
///
/// `d` is kept as raw JSON: for op 0 (Dispatch) it is handed to the event
/// registry together with `t`; for control frames the typed accessors below
/// parse it into the op code's fixed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    /// Operation code
    pub op: OpCode,

    /// Payload data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,

    /// Sequence number (only for op 0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event name (only for op 0 Dispatch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayPayload {
    /// Create a bare control frame with no payload
    #[must_use]
    pub fn new(op: OpCode) -> Self {
        Self {
            op,
            d: None,
            s: None,
            t: None,
        }
    }

    /// Create a Dispatch frame (op 0)
    #[must_use]
    pub fn dispatch(event_type: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: Some(data),
            s: Some(sequence),
            t: Some(event_type.into()),
        }
    }

    /// Encode an outbound frame through the driver
    ///
    /// The typed payload (if any) is serialized into `d`, wrapped in the
    /// envelope, and the whole envelope marshalled to bytes.
    pub fn encode<T: Serialize>(
        driver: &dyn JsonDriver,
        op: OpCode,
        payload: Option<&T>,
    ) -> Result<Vec<u8>, ProtocolError> {
        let d = match payload {
            Some(value) => Some(serde_json::to_value(value)?),
            None => None,
        };

        let envelope = Self {
            op,
            d,
            s: None,
            t: None,
        };

        driver.marshal(&serde_json::to_value(&envelope)?)
    }

    /// Decode an inbound frame through the driver
    pub fn decode(driver: &dyn JsonDriver, bytes: &[u8]) -> Result<Self, ProtocolError> {
        let value = driver.unmarshal(bytes)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Require a specific op code, for handshake steps
    pub fn expect_op(&self, expected: OpCode) -> Result<(), ProtocolError> {
        if self.op == expected {
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedOpCode {
                expected,
                got: self.op,
            })
        }
    }

    /// Parse the Hello payload (op 10)
    pub fn as_hello(&self) -> Result<HelloPayload, ProtocolError> {
        self.expect_op(OpCode::Hello)?;
        let d = self
            .d
            .as_ref()
            .ok_or(ProtocolError::MissingPayload(OpCode::Hello))?;
        Ok(serde_json::from_value(d.clone())?)
    }

    /// Parse the Invalid Session payload (op 9)
    ///
    /// The boolean says whether the session can still be resumed; a missing
    /// payload counts as not resumable.
    pub fn as_invalid_session(&self) -> Result<bool, ProtocolError> {
        self.expect_op(OpCode::InvalidSession)?;
        Ok(self.d.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    /// Parse the heartbeat sequence number (op 1)
    #[must_use]
    pub fn as_heartbeat_seq(&self) -> Option<u64> {
        self.d.as_ref().and_then(Value::as_u64)
    }

    /// Borrow the dispatch parts: event name and raw payload
    pub fn dispatch_parts(&self) -> Result<(&str, Value), ProtocolError> {
        self.expect_op(OpCode::Dispatch)?;
        let name = self.t.as_deref().ok_or(ProtocolError::MissingEventName)?;
        let data = self.d.clone().unwrap_or(Value::Null);
        Ok((name, data))
    }
}

impl std::fmt::Display for GatewayPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayPayload(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayPayload(op={})", self.op)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SerdeDriver;
    use crate::payloads::ResumePayload;
    use serde_json::json;

    #[test]
    fn test_dispatch_roundtrip() {
        let driver = SerdeDriver;
        let data = json!({"content": "hello", "channel_id": "42"});

        let frame = GatewayPayload::dispatch("MESSAGE_CREATE", 7, data.clone());
        let bytes = driver.marshal(&serde_json::to_value(&frame).unwrap()).unwrap();
        let parsed = GatewayPayload::decode(&driver, &bytes).unwrap();

        assert_eq!(parsed.op, OpCode::Dispatch);
        assert_eq!(parsed.s, Some(7));
        let (name, payload) = parsed.dispatch_parts().unwrap();
        assert_eq!(name, "MESSAGE_CREATE");
        assert_eq!(payload, data);
    }

    #[test]
    fn test_encode_with_payload() {
        let driver = SerdeDriver;
        let resume = ResumePayload {
            token: "t".to_string(),
            session_id: "s".to_string(),
            seq: 3,
        };

        let bytes = GatewayPayload::encode(&driver, OpCode::Resume, Some(&resume)).unwrap();
        let parsed = GatewayPayload::decode(&driver, &bytes).unwrap();

        assert_eq!(parsed.op, OpCode::Resume);
        let d = parsed.d.unwrap();
        assert_eq!(d["session_id"], "s");
        assert_eq!(d["seq"], 3);
        assert!(parsed.s.is_none());
        assert!(parsed.t.is_none());
    }

    #[test]
    fn test_encode_without_payload() {
        let driver = SerdeDriver;
        let bytes =
            GatewayPayload::encode::<()>(&driver, OpCode::Heartbeat, None).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("\"op\":1"));
        assert!(!text.contains("\"d\""));
    }

    #[test]
    fn test_heartbeat_null_sequence() {
        let driver = SerdeDriver;
        let seq: Option<u64> = None;
        let bytes = GatewayPayload::encode(&driver, OpCode::Heartbeat, Some(&seq)).unwrap();
        let parsed = GatewayPayload::decode(&driver, &bytes).unwrap();

        assert_eq!(parsed.op, OpCode::Heartbeat);
        assert_eq!(parsed.as_heartbeat_seq(), None);
    }

    #[test]
    fn test_as_hello() {
        let driver = SerdeDriver;
        let frame = GatewayPayload {
            op: OpCode::Hello,
            d: Some(json!({"heartbeat_interval": 41250})),
            s: None,
            t: None,
        };
        let bytes = driver.marshal(&serde_json::to_value(&frame).unwrap()).unwrap();
        let hello = GatewayPayload::decode(&driver, &bytes)
            .unwrap()
            .as_hello()
            .unwrap();

        assert_eq!(hello.heartbeat_interval, 41250);
    }

    #[test]
    fn test_as_hello_wrong_op() {
        let frame = GatewayPayload::new(OpCode::Reconnect);
        let err = frame.as_hello().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnexpectedOpCode {
                expected: OpCode::Hello,
                got: OpCode::Reconnect,
            }
        ));
    }

    #[test]
    fn test_as_invalid_session() {
        let resumable = GatewayPayload {
            op: OpCode::InvalidSession,
            d: Some(Value::Bool(true)),
            s: None,
            t: None,
        };
        assert!(resumable.as_invalid_session().unwrap());

        let bare = GatewayPayload::new(OpCode::InvalidSession);
        assert!(!bare.as_invalid_session().unwrap());
    }

    #[test]
    fn test_dispatch_missing_event_name() {
        let frame = GatewayPayload {
            op: OpCode::Dispatch,
            d: Some(json!({})),
            s: Some(1),
            t: None,
        };
        assert!(matches!(
            frame.dispatch_parts(),
            Err(ProtocolError::MissingEventName)
        ));
    }

    #[test]
    fn test_payload_display() {
        let dispatch = GatewayPayload::dispatch("MESSAGE_CREATE", 5, json!({}));
        let display = format!("{dispatch}");
        assert!(display.contains("MESSAGE_CREATE"));
        assert!(display.contains("s=5"));

        let hello = GatewayPayload::new(OpCode::Hello);
        assert!(format!("{hello}").contains("Hello"));
    }
}
