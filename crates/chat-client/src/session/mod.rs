//! Session facade
//!
//! Ties a gateway to a handler table: a reader task takes decoded events off
//! the gateway's channel and feeds them through [`Handler::call`]. Login
//! helpers live here too; login itself is a REST concern.

use crate::api::{ApiClient, ApiError};
use crate::gateway::{Gateway, GatewayError};
use crate::handler::{Handler, Removal};
use chat_proto::Event;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// The account has multi-factor authentication enabled and no one-time
    /// code was provided; retry `login` with the code
    #[error("account has 2FA enabled")]
    MfaRequired,

    /// `open()` was called while the session is already running
    #[error("session is already open")]
    AlreadyOpen,

    /// The gateway's events channel was taken by someone else
    #[error("gateway events channel already taken")]
    EventsTaken,

    /// REST failure
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Gateway failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

struct ReaderState {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// A gateway plus the handler table its events are routed through
pub struct Session {
    api: ApiClient,
    gateway: Gateway,
    handler: Handler,
    /// The events receiver parks here between open/close cycles.
    events_slot: Arc<Mutex<Option<mpsc::Receiver<Event>>>>,
    reader: Mutex<Option<ReaderState>>,
}

impl Session {
    /// Create a session from a token, discovering the gateway via REST
    pub async fn new(token: impl Into<String>) -> Result<Self, SessionError> {
        let token = token.into();
        let gateway = Gateway::new(&token).await?;
        Self::with_gateway(gateway)
    }

    /// Wrap an already-built gateway
    pub fn with_gateway(gateway: Gateway) -> Result<Self, SessionError> {
        let api = ApiClient::new(gateway.token())?;
        let events = gateway.events().ok_or(SessionError::EventsTaken)?;

        Ok(Self {
            api,
            gateway,
            handler: Handler::new(),
            events_slot: Arc::new(Mutex::new(Some(events))),
            reader: Mutex::new(None),
        })
    }

    /// Log in as a user account; MFA is optional
    ///
    /// If the account requires a one-time code and none is given, this fails
    /// with [`SessionError::MfaRequired`]; call again with the code.
    pub async fn login(
        email: &str,
        password: &str,
        mfa: Option<&str>,
    ) -> Result<Self, SessionError> {
        // Scratch client without a token.
        let api = ApiClient::new("")?;

        let login = api.login(email, password).await?;
        if !login.token.is_empty() && !login.mfa {
            return Self::new(login.token).await;
        }

        let code = mfa
            .filter(|code| !code.is_empty())
            .ok_or(SessionError::MfaRequired)?;

        let login = api
            .totp(code, login.ticket.as_deref().unwrap_or_default())
            .await?;
        Self::new(login.token).await
    }

    /// The handler table events are dispatched through
    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// The underlying gateway
    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// The REST client bound to this session's token
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Register a typed handler; see [`Handler::add_handler`]
    pub fn add_handler<E, F>(&self, handler: F) -> Removal
    where
        E: chat_proto::EventPayload,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.handler.add_handler(handler)
    }

    /// Wait for the first matching event; see [`Handler::wait_for`]
    pub async fn wait_for<F>(&self, predicate: F) -> Option<Event>
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.handler.wait_for(predicate).await
    }

    /// Stream matching events; see [`Handler::chan_for`]
    pub fn chan_for<F>(&self, predicate: F) -> (mpsc::Receiver<Event>, Removal)
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.handler.chan_for(predicate)
    }

    /// Open the gateway and start dispatching events to handlers
    pub async fn open(&self) -> Result<(), SessionError> {
        let mut reader = self.reader.lock().await;
        if reader.is_some() {
            return Err(SessionError::AlreadyOpen);
        }

        self.gateway.open().await?;

        let events = self
            .events_slot
            .lock()
            .await
            .take()
            .ok_or(SessionError::EventsTaken)?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_reader(
            self.handler.clone(),
            events,
            stop_rx,
            self.events_slot.clone(),
        ));

        *reader = Some(ReaderState { stop_tx, handle });
        Ok(())
    }

    /// Stop dispatching and close the gateway
    pub async fn close(&self) -> Result<(), SessionError> {
        if let Some(reader) = self.reader.lock().await.take() {
            drop(reader.stop_tx);
            let _ = reader.handle.await;
        }

        self.gateway.close().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("gateway", &self.gateway)
            .field("handler", &self.handler)
            .finish()
    }
}

/// Forwards gateway events into the handler table until stopped
async fn run_reader(
    handler: Handler,
    mut events: mpsc::Receiver<Event>,
    mut stop: watch::Receiver<bool>,
    slot: Arc<Mutex<Option<mpsc::Receiver<Event>>>>,
) {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            event = events.recv() => match event {
                Some(event) => handler.call(&event),
                None => break,
            }
        }
    }

    // Park the receiver so the session can be opened again.
    *slot.lock().await = Some(events);
    tracing::debug!("session reader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mfa_error_message() {
        let err = SessionError::MfaRequired;
        assert!(err.to_string().contains("2FA"));
    }
}
