//! Gateway error types

use crate::api::ApiError;
use chat_proto::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the transport layer
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connecting the WebSocket failed
    #[error("websocket dial failed: {0}")]
    Dial(tokio_tungstenite::tungstenite::Error),

    /// Writing to the WebSocket failed
    #[error("websocket send failed: {0}")]
    Send(tokio_tungstenite::tungstenite::Error),

    /// Reading from the WebSocket failed
    #[error("websocket receive failed: {0}")]
    Recv(tokio_tungstenite::tungstenite::Error),

    /// The transport was used before a successful dial
    #[error("transport is not connected")]
    NotConnected,

    /// The remote closed the stream
    #[error("transport closed")]
    Closed,

    /// Outbound payload was not valid UTF-8 for a text frame
    #[error("payload is not valid utf-8")]
    NonTextPayload,

    /// Dialing exceeded the configured deadline
    #[error("dial timed out")]
    DialTimeout,

    /// A write exceeded the configured deadline
    #[error("write timed out")]
    WriteTimeout,

    /// No frame arrived within the idle read deadline
    #[error("read timed out")]
    ReadTimeout,
}

/// Errors produced by the gateway session
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The pacemaker saw no heartbeat ack for two full intervals
    #[error("no heartbeat replied")]
    Dead,

    /// Resume was requested without a stored session ID or sequence
    #[error("missing session ID or sequence for resuming")]
    MissingForResume,

    /// The server invalidated the session; the payload says whether it can
    /// still be resumed
    #[error("session invalidated by server (resumable: {0})")]
    InvalidSession(bool),

    /// The server asked the client to reconnect and resume
    #[error("server requested a reconnect")]
    ReconnectRequested,

    /// `open()` was called on a gateway that is already running
    #[error("gateway is already open")]
    AlreadyOpen,

    /// The gateway was closed while opening or reconnecting
    #[error("gateway is closed")]
    Closed,

    /// An inbound frame carried no data at all
    #[error("event frame was empty")]
    EmptyFrame,

    /// The consumer dropped the events channel
    #[error("events channel closed by the consumer")]
    EventsClosed,

    /// Transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Envelope or payload decode failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// REST failure while discovering the gateway endpoint
    #[error(transparent)]
    Api(#[from] ApiError),
}
