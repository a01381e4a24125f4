//! WebSocket transport
//!
//! The gateway talks to the socket through the [`Transport`] trait so tests
//! can script connections in memory; [`WsTransport`] is the production
//! implementation over tokio-tungstenite.

use super::error::TransportError;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// One inbound frame: payload bytes, or the error the read produced
pub type Frame = Result<Vec<u8>, TransportError>;

/// Duplex byte transport beneath the gateway
///
/// `dial` may be called again after a drop to establish a fresh connection;
/// the previous stream is discarded.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection
    async fn dial(&self) -> Result<(), TransportError>;

    /// Write one frame
    async fn send(&self, data: Vec<u8>) -> Result<(), TransportError>;

    /// Read the next frame; `None` means the stream ended
    async fn recv(&self) -> Option<Frame>;

    /// Tear the connection down
    async fn close(&self) -> Result<(), TransportError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Production transport over a tokio-tungstenite WebSocket
pub struct WsTransport {
    url: String,
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    stream: Mutex<Option<SplitStream<WsStream>>>,
}

impl WsTransport {
    /// Create an undialed transport for the given URL
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sink: Mutex::new(None),
            stream: Mutex::new(None),
        }
    }

    /// The URL this transport dials
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn dial(&self) -> Result<(), TransportError> {
        tracing::debug!(url = %self.url, "dialing websocket");

        let (ws, _response) = connect_async(self.url.as_str())
            .await
            .map_err(TransportError::Dial)?;

        let (sink, stream) = ws.split();
        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);

        Ok(())
    }

    async fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        let text = String::from_utf8(data).map_err(|_| TransportError::NonTextPayload)?;

        let mut guard = self.sink.lock().await;
        let sink = guard.as_mut().ok_or(TransportError::NotConnected)?;
        sink.send(Message::Text(text))
            .await
            .map_err(TransportError::Send)
    }

    async fn recv(&self) -> Option<Frame> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut()?;

        loop {
            match stream.next().await {
                None => return None,
                Some(Err(err)) => return Some(Err(TransportError::Recv(err))),
                Some(Ok(Message::Text(text))) => return Some(Ok(text.into_bytes())),
                Some(Ok(Message::Binary(data))) => return Some(Ok(data)),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(frame = ?frame, "websocket closed by server");
                    return None;
                }
                // Ping/pong is answered by tungstenite itself.
                Some(Ok(_)) => continue,
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
        self.stream.lock().await.take();
        Ok(())
    }
}
