//! Transport layer for the gateway.
//!
//! The session talks to the gateway through [`GatewayTransport`] and opens
//! connections through a [`Connector`], so the state machine can run over a
//! real websocket or an in-memory script.

pub mod websocket;

pub use websocket::{WebSocketConnector, WebSocketTransport};

use std::future::Future;
use std::pin::Pin;

use onliner_core::{GatewayError, GatewayResult};

/// Boxed future returned by transport methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = GatewayResult<T>> + Send + 'a>>;

/// One open connection carrying JSON text frames.
pub trait GatewayTransport: Send {
    /// Send one text frame.
    fn send_text<'a>(&'a mut self, text: String) -> TransportFuture<'a, ()>;

    /// Wait for the next text frame.
    ///
    /// Returns [`GatewayError::ConnectionClosed`] once the peer has closed.
    /// Must be cancel-safe: dropping the future loses no frame.
    fn recv_text(&mut self) -> TransportFuture<'_, String>;

    /// Close the connection. Best effort; errors are not interesting here.
    fn close(&mut self) -> TransportFuture<'_, ()>;
}

/// Opens transports to a gateway URL.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, url: &'a str) -> TransportFuture<'a, Box<dyn GatewayTransport>>;
}

/// Check that a gateway URL uses a websocket scheme.
pub fn validate_url(url: &str) -> GatewayResult<()> {
    let lower = url.to_lowercase();
    if lower.starts_with("ws://") || lower.starts_with("wss://") {
        Ok(())
    } else {
        Err(GatewayError::Transport(format!(
            "unsupported URL scheme: {url} (expected ws:// or wss://)"
        )))
    }
}
