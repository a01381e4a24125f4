//! Injectable JSON codec
//!
//! The gateway serializes envelopes through a driver so that alternative JSON
//! implementations can be swapped in without touching the session core.

use crate::error::ProtocolError;
use serde_json::Value;

/// JSON codec used for the outer envelope
///
/// Typed payloads are converted to [`Value`] with serde before they reach the
/// driver; the driver only owns the bytes-level representation.
pub trait JsonDriver: Send + Sync {
    /// Serialize a JSON value to bytes
    fn marshal(&self, value: &Value) -> Result<Vec<u8>, ProtocolError>;

    /// Parse bytes into a JSON value
    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, ProtocolError>;
}

/// Default driver backed by `serde_json`
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeDriver;

impl JsonDriver for SerdeDriver {
    fn marshal(&self, value: &Value) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serde_driver_roundtrip() {
        let driver = SerdeDriver;
        let value = json!({"op": 10, "d": {"heartbeat_interval": 45000}});

        let bytes = driver.marshal(&value).unwrap();
        let parsed = driver.unmarshal(&bytes).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_serde_driver_rejects_garbage() {
        let driver = SerdeDriver;
        assert!(driver.unmarshal(b"{not json").is_err());
    }
}
