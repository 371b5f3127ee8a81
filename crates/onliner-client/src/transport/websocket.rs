//! WebSocket transport for the gateway.
//!
//! One websocket per session. Text frames carry JSON; pings are answered
//! inline; a close frame, end of stream, or reset without a closing
//! handshake all surface as [`GatewayError::ConnectionClosed`].

use std::io;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use onliner_core::{GatewayError, GatewayResult};

use super::{validate_url, Connector, GatewayTransport, TransportFuture};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An abortive close by the peer, as opposed to a local I/O fault.
fn is_peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

/// Map a tungstenite error, separating "the peer is gone" from the rest.
fn map_ws_error(e: tungstenite::Error) -> GatewayError {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            GatewayError::ConnectionClosed(None)
        }
        tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            GatewayError::ConnectionClosed(Some("reset without closing handshake".into()))
        }
        tungstenite::Error::Io(e) if is_peer_gone(&e) => {
            GatewayError::ConnectionClosed(Some(e.to_string()))
        }
        tungstenite::Error::Io(e) => GatewayError::Io(e),
        other => GatewayError::Transport(other.to_string()),
    }
}

/// A connected gateway websocket.
pub struct WebSocketTransport {
    ws: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Connect to a gateway over WebSocket.
    pub async fn connect(url: &str) -> GatewayResult<Self> {
        validate_url(url)?;
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| GatewayError::Transport(format!("WebSocket connect error: {e}")))?;

        tracing::debug!(url = %url, "WebSocket connected");
        Ok(Self { ws, closed: false })
    }

    async fn next_text(&mut self) -> GatewayResult<String> {
        loop {
            let msg = match self.ws.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(map_ws_error(e)),
                None => {
                    self.closed = true;
                    return Err(GatewayError::ConnectionClosed(None));
                }
            };

            match msg {
                Message::Text(text) => return Ok(text),
                Message::Binary(data) => {
                    return String::from_utf8(data).map_err(|_| {
                        GatewayError::InvalidMessage("binary frame is not UTF-8".into())
                    });
                }
                Message::Close(frame) => {
                    self.closed = true;
                    let reason = frame.map(|f| format!("{} {}", u16::from(f.code), f.reason));
                    tracing::debug!(reason = ?reason, "WebSocket close frame received");
                    return Err(GatewayError::ConnectionClosed(reason));
                }
                Message::Ping(payload) => {
                    self.ws
                        .send(Message::Pong(payload))
                        .await
                        .map_err(map_ws_error)?;
                }
                Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }
}

impl GatewayTransport for WebSocketTransport {
    fn send_text<'a>(&'a mut self, text: String) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            self.ws.send(Message::Text(text)).await.map_err(map_ws_error)
        })
    }

    fn recv_text(&mut self) -> TransportFuture<'_, String> {
        Box::pin(self.next_text())
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            if !self.closed {
                self.closed = true;
                let _ = self.ws.close(None).await;
            }
            Ok(())
        })
    }
}

/// Opens real websocket connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect<'a>(&'a self, url: &'a str) -> TransportFuture<'a, Box<dyn GatewayTransport>> {
        Box::pin(async move {
            let transport = WebSocketTransport::connect(url).await?;
            Ok(Box::new(transport) as Box<dyn GatewayTransport>)
        })
    }
}
