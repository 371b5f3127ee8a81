//! In-memory transports and a scripted gateway for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::mpsc;

use onliner_core::{GatewayError, GatewayResult};

use crate::transport::{Connector, GatewayTransport, TransportFuture};

/// Client half of an in-memory connection.
pub struct ScriptedTransport {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
}

impl ScriptedTransport {
    /// Flag set once the session calls `close`.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

impl GatewayTransport for ScriptedTransport {
    fn send_text<'a>(&'a mut self, text: String) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            self.outbound
                .send(text)
                .map_err(|_| GatewayError::ConnectionClosed(None))
        })
    }

    fn recv_text(&mut self) -> TransportFuture<'_, String> {
        Box::pin(async move {
            self.inbound
                .recv()
                .await
                .ok_or(GatewayError::ConnectionClosed(None))
        })
    }

    fn close(&mut self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Server half of an in-memory connection. Dropping it closes the link.
pub struct ServerEnd {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl ServerEnd {
    pub fn send(&self, frame: Value) {
        self.send_raw(&frame.to_string());
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.to_client.send(text.to_string());
    }

    /// Next frame from the client, or `None` once it hung up.
    pub async fn recv(&mut self) -> Option<Value> {
        let text = self.from_client.recv().await?;
        Some(serde_json::from_str(&text).expect("client sent invalid JSON"))
    }
}

pub fn pair() -> (ScriptedTransport, ServerEnd) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    (
        ScriptedTransport {
            inbound,
            outbound,
            closed: Arc::new(AtomicBool::new(false)),
        },
        ServerEnd {
            to_client,
            from_client,
        },
    )
}

/// Hands out one prepared transport, then refuses.
pub struct SingleConnector(Mutex<Option<ScriptedTransport>>);

impl SingleConnector {
    pub fn new(transport: ScriptedTransport) -> Self {
        Self(Mutex::new(Some(transport)))
    }
}

impl Connector for SingleConnector {
    fn connect<'a>(&'a self, _url: &'a str) -> TransportFuture<'a, Box<dyn GatewayTransport>> {
        let taken = self.0.lock().unwrap().take();
        Box::pin(async move {
            match taken {
                Some(t) => Ok(Box::new(t) as Box<dyn GatewayTransport>),
                None => Err(GatewayError::Transport("connection refused".into())),
            }
        })
    }
}

/// Every connect fails.
pub struct FailingConnector;

impl Connector for FailingConnector {
    fn connect<'a>(&'a self, _url: &'a str) -> TransportFuture<'a, Box<dyn GatewayTransport>> {
        Box::pin(async { Err(GatewayError::Transport("connection refused".into())) })
    }
}

/// Every connect hangs forever.
pub struct HangingConnector;

impl Connector for HangingConnector {
    fn connect<'a>(&'a self, _url: &'a str) -> TransportFuture<'a, Box<dyn GatewayTransport>> {
        Box::pin(std::future::pending())
    }
}

/// How the fake gateway treats one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Close right after identify.
    Reject,
    /// Accept identify, then hang up.
    DropAfterReady,
    /// Accept identify and ack heartbeats until the client leaves.
    StayLive,
}

type Policy = dyn Fn(&str, u32) -> Script + Send + Sync;

#[derive(Default)]
struct GatewayState {
    connections: HashMap<String, u32>,
    live: HashMap<String, u32>,
    max_live: HashMap<String, u32>,
}

/// A gateway that decides per token and per connection number how to act.
#[derive(Clone)]
pub struct FakeGateway {
    interval_ms: u64,
    policy: Arc<Policy>,
    state: Arc<Mutex<GatewayState>>,
}

impl FakeGateway {
    pub fn new(
        interval_ms: u64,
        policy: impl Fn(&str, u32) -> Script + Send + Sync + 'static,
    ) -> Self {
        Self {
            interval_ms,
            policy: Arc::new(policy),
            state: Arc::default(),
        }
    }

    /// Identifies seen for `token`.
    pub fn connections(&self, token: &str) -> u32 {
        let state = self.state.lock().unwrap();
        state.connections.get(token).copied().unwrap_or(0)
    }

    /// Highest number of simultaneous identified connections for `token`.
    pub fn max_concurrent(&self, token: &str) -> u32 {
        let state = self.state.lock().unwrap();
        state.max_live.get(token).copied().unwrap_or(0)
    }

    async fn serve(self, mut server: ServerEnd) {
        server.send(json!({"op": 10, "d": {"heartbeat_interval": self.interval_ms}}));
        let Some(identify) = server.recv().await else {
            return;
        };
        let token = identify["d"]["token"].as_str().unwrap_or_default().to_string();

        let script = {
            let mut state = self.state.lock().unwrap();
            let n = state.connections.entry(token.clone()).or_insert(0);
            *n += 1;
            let nth = *n;
            let live = state.live.entry(token.clone()).or_insert(0);
            *live += 1;
            let live = *live;
            let max = state.max_live.entry(token.clone()).or_insert(0);
            *max = (*max).max(live);
            (self.policy)(&token, nth)
        };

        match script {
            Script::Reject => {}
            Script::DropAfterReady => {
                server.send(ready(&token));
            }
            Script::StayLive => {
                server.send(ready(&token));
                while let Some(frame) = server.recv().await {
                    if frame["op"] == 1 {
                        server.send(json!({"op": 11}));
                    }
                }
            }
        }

        drop(server);
        let mut state = self.state.lock().unwrap();
        if let Some(live) = state.live.get_mut(&token) {
            *live -= 1;
        }
    }
}

fn ready(token: &str) -> Value {
    json!({
        "op": 0, "t": "READY", "s": 1,
        "d": {"user": {"username": format!("user-{token}")}}
    })
}

impl Connector for FakeGateway {
    fn connect<'a>(&'a self, _url: &'a str) -> TransportFuture<'a, Box<dyn GatewayTransport>> {
        let (transport, server) = pair();
        tokio::spawn(self.clone().serve(server));
        Box::pin(async move { GatewayResult::Ok(Box::new(transport) as Box<dyn GatewayTransport>) })
    }
}
