//! The raw frame channel beneath a session.
//!
//! A [`Transport`] carries text frames in both directions over one ordered
//! channel. The production implementation is a DevTools WebSocket; the test
//! harness provides a scripted implementation so session behavior can be
//! exercised without a browser.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::ProtocolError;

/// A bidirectional, ordered text-frame channel.
///
/// The session's I/O task is the sole owner of a transport, so both sides
/// take `&mut self`.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Write one frame. An error means the channel is unusable.
    async fn send(&mut self, text: &str) -> Result<(), ProtocolError>;

    /// Read the next frame. `None` means the remote side closed the channel.
    async fn recv(&mut self) -> Option<String>;

    /// Close the channel. Idempotent best-effort.
    async fn close(&mut self);
}

/// WebSocket transport to a DevTools endpoint, e.g.
/// `ws://localhost:9222/devtools/page/{target_id}`.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Dial the endpoint and complete the WebSocket handshake.
    pub async fn connect(endpoint: &str) -> Result<Self, ProtocolError> {
        tracing::info!(url = endpoint, "connecting to remote session");

        let (stream, _) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| ProtocolError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(url = endpoint, "connection established");
        Ok(Self { stream })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: &str) -> Result<(), ProtocolError> {
        self.stream
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| ProtocolError::Malformed {
                detail: format!("failed to send frame: {e}"),
            })
    }

    async fn recv(&mut self) -> Option<String> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(text.to_string()),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(text),
                    Err(_) => continue,
                },
                Ok(Message::Close(_)) => {
                    tracing::info!("channel closed by remote");
                    return None;
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "transport read error, treating as closed");
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
