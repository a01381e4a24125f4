//! # chat-client
//!
//! Client for the chat platform's real-time gateway. The [`gateway`] module
//! owns the WebSocket connection, the heartbeat pacemaker, and the
//! reconnect/resume state machine, exposing decoded events on a single
//! channel. The [`handler`] module routes those events to registered
//! callbacks by event kind, with one-shot waits and filtered subscription
//! channels layered on top. [`session`] ties the two together and adds REST
//! login.

pub mod api;
pub mod config;
pub mod gateway;
pub mod handler;
pub mod session;
pub mod telemetry;

pub use api::{ApiClient, ApiError, LoginResponse};
pub use config::GatewayConfig;
pub use gateway::{ConnState, Frame, Gateway, GatewayError, Transport, TransportError, WsTransport};
pub use handler::{ErasedHandler, Handler, HandlerError, Removal};
pub use session::{Session, SessionError};

// Re-export the protocol surface consumers interact with directly.
pub use chat_proto::{Event, EventKind, EventPayload, OpCode};
