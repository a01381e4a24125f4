//! Gateway session
//!
//! Owns the WebSocket connection and everything on it: the dial → hello →
//! identify/resume handshake, the heartbeat pacemaker, the inbound event
//! loop, and the reconnect supervisor. Decoded events are pushed onto a
//! single channel; this module does not route them to handlers - that is the
//! session facade's job.

mod error;
mod pacemaker;
mod sequence;
mod transport;

pub use error::{GatewayError, TransportError};
pub use sequence::Sequence;
pub use transport::{Frame, Transport, WsTransport};

use crate::api::ApiClient;
use crate::config::GatewayConfig;
use chat_proto::{
    decode_event, Event, GatewayPayload, Identifier, OpCode, ProtocolError,
    RequestGuildMembersPayload, ResumePayload, StatusUpdatePayload,
};
use pacemaker::{Beats, Pacemaker};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// Gateway protocol version requested on dial
pub const GATEWAY_VERSION: &str = "6";

/// Payload encoding requested on dial
pub const GATEWAY_ENCODING: &str = "json";

/// Connection state of the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// No connection
    Disconnected,
    /// Dial in progress
    Dialing,
    /// Waiting for the server's Hello
    Helloing,
    /// Fresh authentication in flight
    Identifying,
    /// Resume in flight
    Resuming,
    /// Handshake complete, events flowing
    Active,
    /// Teardown in progress
    Closing,
}

impl std::fmt::Display for ConnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Dialing => "dialing",
            Self::Helloing => "helloing",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Active => "active",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Tasks and signals owned by one running connection
struct RunState {
    stop_tx: Option<watch::Sender<bool>>,
    pace_handle: Option<JoinHandle<()>>,
    loop_handle: Option<JoinHandle<()>>,
}

struct GatewayInner {
    transport: Arc<dyn Transport>,
    config: GatewayConfig,
    identifier: Identifier,

    state: StdMutex<ConnState>,
    session_id: StdMutex<Option<String>>,
    sequence: Sequence,
    beats: Arc<Beats>,

    events_tx: mpsc::Sender<Event>,
    events_rx: StdMutex<Option<mpsc::Receiver<Event>>>,

    /// Set by `close()`; aborts the open/reconnect retry loop.
    shutdown: AtomicBool,
    run: Mutex<Option<RunState>>,
}

impl GatewayInner {
    fn error(&self, err: &GatewayError) {
        match &self.config.on_error {
            Some(hook) => hook(err),
            None => tracing::warn!(error = %err, "gateway error"),
        }
    }

    fn fatal(&self, err: &GatewayError) {
        match &self.config.on_fatal {
            Some(hook) => hook(err),
            None => tracing::error!(error = %err, "gateway failed"),
        }
    }
}

/// The gateway session
///
/// Cheap to clone; clones share the same connection. Events are consumed by
/// taking the receiver from [`Gateway::events`] exactly once.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    /// Connect parameters discovered via REST, default configuration
    pub async fn new(token: impl Into<String>) -> Result<Self, GatewayError> {
        Self::with_config(token, GatewayConfig::default()).await
    }

    /// Connect parameters discovered via REST, custom configuration
    pub async fn with_config(
        token: impl Into<String>,
        config: GatewayConfig,
    ) -> Result<Self, GatewayError> {
        let token = token.into();

        let api = ApiClient::new(&token)?;
        let base = api.gateway_url().await?;
        let url = format!("{base}?v={GATEWAY_VERSION}&encoding={GATEWAY_ENCODING}");
        tracing::debug!(url = %url, "discovered gateway endpoint");

        Ok(Self::with_transport(
            token,
            Arc::new(WsTransport::new(url)),
            config,
        ))
    }

    /// Build a gateway over an injected transport
    ///
    /// This skips REST discovery entirely; tests script connections through
    /// an in-memory transport this way.
    #[must_use]
    pub fn with_transport(
        token: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: GatewayConfig,
    ) -> Self {
        let identifier = Identifier::with_properties(token, config.properties.clone());
        let (events_tx, events_rx) = mpsc::channel(config.ws_buffer.max(1));

        Self {
            inner: Arc::new(GatewayInner {
                transport,
                config,
                identifier,
                state: StdMutex::new(ConnState::Disconnected),
                session_id: StdMutex::new(None),
                sequence: Sequence::new(),
                beats: Arc::new(Beats::default()),
                events_tx,
                events_rx: StdMutex::new(Some(events_rx)),
                shutdown: AtomicBool::new(false),
                run: Mutex::new(None),
            }),
        }
    }

    /// Take the events receiver
    ///
    /// The channel survives reconnects; this returns `Some` only on the
    /// first call.
    pub fn events(&self) -> Option<mpsc::Receiver<Event>> {
        self.inner
            .events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Current connection state
    pub fn state(&self) -> ConnState {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Session ID learned from READY, if any
    pub fn session_id(&self) -> Option<String> {
        self.lock_session().clone()
    }

    /// Last received sequence number
    pub fn sequence(&self) -> u64 {
        self.inner.sequence.get()
    }

    /// The token this gateway authenticates with
    pub fn token(&self) -> &str {
        &self.inner.identifier.token
    }

    /// Dial and authenticate, retrying until the session is up
    ///
    /// Dial failures and most start failures are logged through the error
    /// hook and retried; an invalid session during start is retried silently
    /// (the server rate-limits identifies and documents this). The loop
    /// aborts with [`GatewayError::Closed`] if `close()` is called
    /// concurrently.
    pub async fn open(&self) -> Result<(), GatewayError> {
        if self.inner.run.lock().await.is_some() {
            return Err(GatewayError::AlreadyOpen);
        }
        self.inner.shutdown.store(false, Ordering::SeqCst);
        self.open_inner().await
    }

    async fn open_inner(&self) -> Result<(), GatewayError> {
        let mut attempt = 0u32;

        loop {
            if self.inner.shutdown.load(Ordering::SeqCst) {
                return Err(GatewayError::Closed);
            }

            self.set_state(ConnState::Dialing);
            tracing::debug!(attempt, "dialing gateway");

            match tokio::time::timeout(self.inner.config.ws_timeout, self.inner.transport.dial())
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.inner.error(&err.into());
                    attempt += 1;
                    continue;
                }
                Err(_) => {
                    self.inner.error(&TransportError::DialTimeout.into());
                    attempt += 1;
                    continue;
                }
            }

            tracing::debug!(attempt, "starting session");

            match self.start().await {
                Ok(()) => {
                    tracing::debug!(attempt, "gateway started");
                    return Ok(());
                }
                Err(GatewayError::InvalidSession(_)) => {
                    // Documented rate-limit behavior: retry without noise.
                    tracing::debug!("session invalidated during start, retrying");
                }
                Err(err) => self.inner.error(&err),
            }

            attempt += 1;
        }
    }

    /// Stop the pacemaker and event reader, wait for both, close the socket
    pub async fn close(&self) -> Result<(), GatewayError> {
        tracing::debug!("closing gateway");

        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.set_state(ConnState::Closing);
        let result = self.teardown(true).await;
        self.set_state(ConnState::Disconnected);
        result
    }

    /// Tear the connection down and dial again, resuming if possible
    pub async fn reconnect(&self) -> Result<(), GatewayError> {
        tracing::debug!("reconnecting");

        self.set_state(ConnState::Closing);
        if let Err(err) = self.teardown(true).await {
            tracing::debug!(error = %err, "teardown before reconnect failed");
        }
        self.inner.shutdown.store(false, Ordering::SeqCst);
        self.open_inner().await
    }

    /// Encode and write one frame, bounded by the write timeout
    pub async fn send<T: Serialize>(
        &self,
        op: OpCode,
        payload: Option<&T>,
    ) -> Result<(), GatewayError> {
        let bytes = GatewayPayload::encode(self.inner.config.driver.as_ref(), op, payload)?;

        match tokio::time::timeout(self.inner.config.ws_timeout, self.inner.transport.send(bytes))
            .await
        {
            Err(_) => Err(TransportError::WriteTimeout.into()),
            Ok(result) => Ok(result?),
        }
    }

    /// Send a heartbeat carrying the current sequence (null before the first
    /// dispatch)
    pub async fn heartbeat(&self) -> Result<(), GatewayError> {
        let seq = match self.inner.sequence.get() {
            0 => None,
            n => Some(n),
        };
        self.send(OpCode::Heartbeat, Some(&seq)).await
    }

    /// Send a presence change
    pub async fn update_status(&self, status: StatusUpdatePayload) -> Result<(), GatewayError> {
        self.send(OpCode::StatusUpdate, Some(&status)).await
    }

    /// Ask the server for guild member chunks
    pub async fn request_guild_members(
        &self,
        request: RequestGuildMembersPayload,
    ) -> Result<(), GatewayError> {
        self.send(OpCode::RequestGuildMembers, Some(&request)).await
    }

    // === Handshake ===

    async fn start(&self) -> Result<(), GatewayError> {
        match self.start_inner().await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::debug!(error = %err, "start failed, tearing down");
                if let Err(teardown_err) = self.teardown(true).await {
                    tracing::debug!(error = %teardown_err, "teardown after failed start");
                }
                Err(err)
            }
        }
    }

    async fn start_inner(&self) -> Result<(), GatewayError> {
        self.set_state(ConnState::Helloing);

        let bytes = self.recv_frame(self.inner.config.ws_timeout).await?;
        let frame = GatewayPayload::decode(self.inner.config.driver.as_ref(), &bytes)?;
        let hello = frame.as_hello()?;
        let heartrate = hello.heartrate();
        tracing::debug!(
            heartbeat_interval_ms = hello.heartbeat_interval,
            "hello received"
        );

        // Pacemaker first, so a slow identify cannot miss the first beat.
        let (stop_tx, stop_rx) = watch::channel(false);
        let pacer = Pacemaker::new(heartrate, self.inner.beats.clone());
        let beat_gw = self.clone();
        let (pace_handle, death_rx) = pacer.start(
            move || {
                let gw = beat_gw.clone();
                async move { gw.heartbeat().await }
            },
            stop_rx,
        );

        *self.inner.run.lock().await = Some(RunState {
            stop_tx: Some(stop_tx),
            pace_handle: Some(pace_handle),
            loop_handle: None,
        });

        let resuming = self.lock_session().is_some();
        if resuming {
            self.set_state(ConnState::Resuming);
            self.resume().await?;
        } else {
            self.set_state(ConnState::Identifying);
            self.identify().await?;
        }

        // The first frame after identify/resume decides whether the
        // handshake held: READY, RESUMED, or an invalid session.
        let read_deadline = heartrate + self.inner.config.ws_extra_read_timeout;
        let bytes = self.recv_frame(read_deadline).await?;
        self.handle_frame(&bytes).await?;

        let handle = tokio::spawn(run_supervisor(self.clone(), death_rx, read_deadline));
        if let Some(run) = self.inner.run.lock().await.as_mut() {
            run.loop_handle = Some(handle);
        }

        Ok(())
    }

    async fn identify(&self) -> Result<(), GatewayError> {
        tracing::debug!("identifying");
        self.send(OpCode::Identify, Some(&self.inner.identifier))
            .await
    }

    async fn resume(&self) -> Result<(), GatewayError> {
        let session_id = self
            .lock_session()
            .clone()
            .ok_or(GatewayError::MissingForResume)?;
        let seq = self.inner.sequence.get();
        if seq == 0 {
            return Err(GatewayError::MissingForResume);
        }

        tracing::debug!(session_id = %session_id, seq, "resuming");

        let payload = ResumePayload {
            token: self.inner.identifier.token.clone(),
            session_id,
            seq,
        };
        self.send(OpCode::Resume, Some(&payload)).await
    }

    // === Event loop ===

    async fn event_loop(
        &self,
        death_rx: &mut mpsc::Receiver<Option<GatewayError>>,
        read_deadline: Duration,
    ) -> Result<(), GatewayError> {
        loop {
            tokio::select! {
                biased;

                death = death_rx.recv() => {
                    return match death {
                        Some(Some(err)) => Err(err),
                        // A clean pacemaker stop means close() is tearing
                        // the connection down.
                        Some(None) | None => Ok(()),
                    };
                }

                recv = tokio::time::timeout(read_deadline, self.inner.transport.recv()) => {
                    let bytes = match recv {
                        Err(_) => return Err(TransportError::ReadTimeout.into()),
                        Ok(None) => return Err(TransportError::Closed.into()),
                        Ok(Some(Err(err))) => {
                            // Read errors are logged; if the socket is gone
                            // the stream ends on the next poll.
                            self.inner.error(&err.into());
                            continue;
                        }
                        Ok(Some(Ok(bytes))) => bytes,
                    };

                    if bytes.is_empty() {
                        return Err(GatewayError::EmptyFrame);
                    }

                    self.handle_frame(&bytes).await?;
                }
            }
        }
    }

    async fn handle_frame(&self, bytes: &[u8]) -> Result<(), GatewayError> {
        let frame = GatewayPayload::decode(self.inner.config.driver.as_ref(), bytes)?;
        tracing::trace!(op = %frame.op, seq = ?frame.s, "frame received");

        match frame.op {
            OpCode::Dispatch => self.handle_dispatch(frame).await,
            OpCode::Heartbeat => self.heartbeat().await,
            OpCode::HeartbeatAck => {
                self.inner.beats.echo();
                Ok(())
            }
            OpCode::Reconnect => Err(GatewayError::ReconnectRequested),
            OpCode::InvalidSession => {
                let resumable = frame.as_invalid_session()?;
                if !resumable {
                    self.clear_session();
                }
                Err(GatewayError::InvalidSession(resumable))
            }
            OpCode::Hello => Err(ProtocolError::UnexpectedWhileActive(OpCode::Hello).into()),
            OpCode::Identify
            | OpCode::StatusUpdate
            | OpCode::VoiceStateUpdate
            | OpCode::Resume
            | OpCode::RequestGuildMembers => Err(ProtocolError::NotInbound(frame.op).into()),
        }
    }

    async fn handle_dispatch(&self, frame: GatewayPayload) -> Result<(), GatewayError> {
        if let Some(seq) = frame.s {
            self.inner.sequence.set(seq);
        }

        let (name, data) = frame.dispatch_parts()?;
        let event = decode_event(name, data)?;

        match &event {
            Event::Ready(ready) => {
                *self.lock_session() = Some(ready.session_id.clone());
                self.set_state(ConnState::Active);
                tracing::debug!(session_id = %ready.session_id, "session ready");
            }
            Event::Resumed(_) => {
                self.set_state(ConnState::Active);
                tracing::debug!("session resumed");
            }
            Event::Unknown(unknown) => {
                tracing::debug!(event = %unknown.name, "unknown event, delivering as-is");
            }
            _ => {}
        }

        // A full channel blocks the reader here; backpressure belongs to the
        // consumer.
        self.inner
            .events_tx
            .send(event)
            .await
            .map_err(|_| GatewayError::EventsClosed)
    }

    // === Teardown ===

    async fn teardown(&self, join_reader: bool) -> Result<(), GatewayError> {
        let run = self.inner.run.lock().await.take();

        if let Some(mut run) = run {
            // Stop is single-shot: dropping the sender fires it, and the
            // taken Option makes repeats a no-op.
            run.stop_tx.take();

            if let Some(handle) = run.pace_handle.take() {
                let _ = handle.await;
            }
            if let Some(handle) = run.loop_handle.take() {
                if join_reader {
                    let _ = handle.await;
                }
            }
        }

        self.inner.transport.close().await?;
        Ok(())
    }

    fn reopen(&self) -> Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send + '_>> {
        Box::pin(self.open_inner())
    }

    // === Shared state helpers ===

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.inner
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_session(&self) {
        *self.lock_session() = None;
        self.inner.sequence.reset();
        tracing::debug!("session cleared");
    }

    fn set_state(&self, next: ConnState) {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            tracing::debug!(from = %*state, to = %next, "connection state");
            *state = next;
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .field("sequence", &self.sequence())
            .finish()
    }
}

/// Reads frames until the connection dies, then tears down and reopens
///
/// Reconnect is non-reentrant: the loop has already exited by the time the
/// teardown runs, and `open_inner` spawns the next supervisor itself.
async fn run_supervisor(
    gw: Gateway,
    mut death_rx: mpsc::Receiver<Option<GatewayError>>,
    read_deadline: Duration,
) {
    match gw.event_loop(&mut death_rx, read_deadline).await {
        Ok(()) => {
            tracing::debug!("event loop stopped cleanly");
        }
        Err(err) => {
            gw.inner.error(&err);
            gw.set_state(ConnState::Closing);
            if let Err(teardown_err) = gw.teardown(false).await {
                tracing::debug!(error = %teardown_err, "teardown before reconnect");
            }

            if gw.inner.shutdown.load(Ordering::SeqCst) {
                return;
            }

            if let Err(fatal) = gw.reopen().await {
                if !matches!(fatal, GatewayError::Closed) {
                    gw.inner.fatal(&fatal);
                }
            }
        }
    }
}

impl Gateway {
    async fn recv_frame(&self, deadline: Duration) -> Result<Vec<u8>, GatewayError> {
        let recv = tokio::time::timeout(deadline, self.inner.transport.recv()).await;

        let bytes = match recv {
            Err(_) => return Err(TransportError::ReadTimeout.into()),
            Ok(None) => return Err(TransportError::Closed.into()),
            Ok(Some(frame)) => frame?,
        };

        if bytes.is_empty() {
            return Err(GatewayError::EmptyFrame);
        }
        Ok(bytes)
    }
}
