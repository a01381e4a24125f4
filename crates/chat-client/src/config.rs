//! Gateway configuration
//!
//! Every tunable the connection uses lives on this construction record; each
//! gateway instance carries its own copy.

use crate::gateway::GatewayError;
use chat_proto::{IdentifyProperties, JsonDriver, SerdeDriver};
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked with recoverable or fatal gateway errors
pub type ErrorHook = Arc<dyn Fn(&GatewayError) + Send + Sync>;

/// Gateway configuration
#[derive(Clone)]
pub struct GatewayConfig {
    /// Deadline for dialing and for every write to the socket
    pub ws_timeout: Duration,

    /// Capacity of the events channel; at least 1 so READY/RESUMED fit
    pub ws_buffer: usize,

    /// Added to the heartbeat interval as an idle read deadline
    pub ws_extra_read_timeout: Duration,

    /// Properties reported in Identify
    pub properties: IdentifyProperties,

    /// JSON codec for the envelope
    pub driver: Arc<dyn JsonDriver>,

    /// Called for recoverable errors; defaults to a `tracing` warning
    pub on_error: Option<ErrorHook>,

    /// Called when the gateway cannot recover; defaults to a `tracing` error
    pub on_fatal: Option<ErrorHook>,
}

impl GatewayConfig {
    /// Default dial/write deadline
    pub const DEFAULT_WS_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default events channel capacity
    pub const DEFAULT_WS_BUFFER: usize = 10;

    /// Default extra read allowance on top of the heartbeat interval
    pub const DEFAULT_EXTRA_READ_TIMEOUT: Duration = Duration::from_secs(1);
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ws_timeout: Self::DEFAULT_WS_TIMEOUT,
            ws_buffer: Self::DEFAULT_WS_BUFFER,
            ws_extra_read_timeout: Self::DEFAULT_EXTRA_READ_TIMEOUT,
            properties: IdentifyProperties::default(),
            driver: Arc::new(SerdeDriver),
            on_error: None,
            on_fatal: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("ws_timeout", &self.ws_timeout)
            .field("ws_buffer", &self.ws_buffer)
            .field("ws_extra_read_timeout", &self.ws_extra_read_timeout)
            .field("properties", &self.properties)
            .field("on_error", &self.on_error.is_some())
            .field("on_fatal", &self.on_fatal.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.ws_timeout, Duration::from_secs(10));
        assert_eq!(config.ws_buffer, 10);
        assert_eq!(config.ws_extra_read_timeout, Duration::from_secs(1));
        assert!(config.on_error.is_none());
        assert!(config.on_fatal.is_none());
    }
}
