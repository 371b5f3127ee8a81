//! One gateway session: connect, hello, identify, then heartbeat forever.
//!
//! A `GatewaySession` is single-use. It owns its transport for exactly one
//! connection and always ends in [`SessionPhase::Closed`]; the supervisor
//! builds a fresh session for every restart.
//!
//! ```text
//! Connecting -> AwaitingHello -> Authenticating -> Live -> Closed(reason)
//!      \______________\_________________\____________\_____^
//! ```
//!
//! Every wait (connect, hello, identify reply, poll tick, inbound frame)
//! also watches the shutdown listener, so cancellation never has to wait
//! for a socket timeout.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::{self, Instant};

use onliner_core::codec::{decode_frame, decode_hello, decode_ready, encode_heartbeat, encode_identify};
use onliner_core::messages::{intents, opcode, ConnectionProperties, IdentifyPayload};
use onliner_core::{Credential, GatewayError, HeartbeatScheduler, PresenceSpec, DEFAULT_GATEWAY_URL};

use crate::observer::SessionObserver;
use crate::shutdown::ShutdownListener;
use crate::transport::{Connector, GatewayTransport};

/// Upper bound on the best-effort close at the end of a session.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Settings shared by every session in a fleet.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub gateway_url: String,
    /// Intent bitmask sent on identify.
    pub intents: u64,
    pub properties: ConnectionProperties,
    /// Subtracted from the server's heartbeat interval.
    pub guard_margin: Duration,
    /// How often the live loop re-checks the heartbeat deadline.
    pub poll_interval: Duration,
    pub connect_timeout: Duration,
    /// Applies separately to the HELLO wait and the identify reply wait.
    pub handshake_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            intents: intents::DEFAULT,
            properties: ConnectionProperties::default(),
            guard_margin: onliner_core::DEFAULT_GUARD_MARGIN,
            poll_interval: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(30),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// DNS, TCP, TLS or upgrade failure, or connect timeout.
    ConnectError,
    /// Missing or malformed HELLO, or a malformed identify reply.
    HandshakeError,
    /// The gateway closed the connection instead of answering identify.
    AuthConnectionClosed,
    /// Decode failure, I/O error or remote close after the handshake.
    TransportError,
    /// Shutdown was requested.
    CallerCancelled,
}

/// What the supervisor should do after a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retry,
    /// The credential is invalid; retrying would fail the same way.
    Reject,
    Stop,
}

impl CloseReason {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::ConnectError | Self::HandshakeError | Self::TransportError => Disposition::Retry,
            Self::AuthConnectionClosed => Disposition::Reject,
            Self::CallerCancelled => Disposition::Stop,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.disposition() == Disposition::Retry
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectError => "connect_error",
            Self::HandshakeError => "handshake_error",
            Self::AuthConnectionClosed => "auth_connection_closed",
            Self::TransportError => "transport_error",
            Self::CallerCancelled => "caller_cancelled",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    AwaitingHello,
    Authenticating,
    Live,
    Closed(CloseReason),
}

/// Summary handed back when a session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub reason: CloseReason,
    /// Human-readable cause, when there is one.
    pub detail: Option<String>,
    pub reached_live: bool,
    pub identity: Option<String>,
    pub heartbeats_sent: u64,
}

/// Internal early-exit value carried through the phases.
#[derive(Debug)]
struct Abort {
    reason: CloseReason,
    detail: Option<String>,
}

impl Abort {
    fn new(reason: CloseReason, detail: impl std::fmt::Display) -> Self {
        Self {
            reason,
            detail: Some(detail.to_string()),
        }
    }

    fn cancelled() -> Self {
        Self {
            reason: CloseReason::CallerCancelled,
            detail: None,
        }
    }
}

enum LiveEvent {
    Cancelled,
    Tick,
    Frame(Result<String, GatewayError>),
}

/// Run `fut` unless shutdown fires first.
async fn cancellable<F: Future>(shutdown: &mut ShutdownListener, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = shutdown.triggered() => None,
        out = fut => Some(out),
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// A single connection attempt for one credential.
pub struct GatewaySession {
    credential: Credential,
    credential_ref: String,
    presence: PresenceSpec,
    config: Arc<SessionConfig>,
    observer: Arc<dyn SessionObserver>,
    phase: SessionPhase,
    heartbeat_interval: Option<Duration>,
    last_heartbeat_sent_at: Option<Instant>,
    heartbeats_sent: u64,
    identity: Option<String>,
    required_action: Option<String>,
}

impl GatewaySession {
    pub fn new(
        credential: Credential,
        presence: PresenceSpec,
        config: Arc<SessionConfig>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let credential_ref = credential.fingerprint();
        Self {
            credential,
            credential_ref,
            presence,
            config,
            observer,
            phase: SessionPhase::Connecting,
            heartbeat_interval: None,
            last_heartbeat_sent_at: None,
            heartbeats_sent: 0,
            identity: None,
            required_action: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn presence(&self) -> &PresenceSpec {
        &self.presence
    }

    /// Interval declared by the server in HELLO.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
    }

    pub fn last_heartbeat_sent_at(&self) -> Option<Instant> {
        self.last_heartbeat_sent_at
    }

    /// Beacons sent so far, counting the one implied by authentication.
    pub fn heartbeats_sent(&self) -> u64 {
        self.heartbeats_sent
    }

    /// Display name returned by the gateway on identify.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn required_action(&self) -> Option<&str> {
        self.required_action.as_deref()
    }

    /// Name used in logs: the identity once known, else the credential ref.
    fn who(&self) -> &str {
        self.identity.as_deref().unwrap_or(&self.credential_ref)
    }

    /// Drive the session until it closes.
    ///
    /// The transport lives only inside this call and is closed before it
    /// returns. Calling `run` again on a closed session returns immediately.
    pub async fn run(
        &mut self,
        connector: &dyn Connector,
        shutdown: &mut ShutdownListener,
    ) -> SessionOutcome {
        if let SessionPhase::Closed(reason) = self.phase {
            return self.outcome(reason, Some("session already closed".into()));
        }

        let mut slot: Option<Box<dyn GatewayTransport>> = None;
        let abort = match self.drive(connector, shutdown, &mut slot).await {
            Ok(never) => match never {},
            Err(abort) => abort,
        };

        if let Some(mut transport) = slot.take() {
            let _ = time::timeout(CLOSE_TIMEOUT, transport.close()).await;
        }

        self.phase = SessionPhase::Closed(abort.reason);
        match &abort.detail {
            Some(detail) => tracing::debug!(
                session = %self.who(),
                reason = %abort.reason,
                detail = %detail,
                "session ended"
            ),
            None => tracing::debug!(session = %self.who(), reason = %abort.reason, "session ended"),
        }
        self.observer.session_closed(self.who(), abort.reason);
        self.outcome(abort.reason, abort.detail)
    }

    fn outcome(&self, reason: CloseReason, detail: Option<String>) -> SessionOutcome {
        SessionOutcome {
            reason,
            detail,
            reached_live: self.identity.is_some(),
            identity: self.identity.clone(),
            heartbeats_sent: self.heartbeats_sent,
        }
    }

    async fn drive(
        &mut self,
        connector: &dyn Connector,
        shutdown: &mut ShutdownListener,
        slot: &mut Option<Box<dyn GatewayTransport>>,
    ) -> Result<Infallible, Abort> {
        let transport = slot.insert(self.connect(connector, shutdown).await?);
        self.await_hello(&mut **transport, shutdown).await?;
        self.authenticate(&mut **transport, shutdown).await?;
        self.live(&mut **transport, shutdown).await
    }

    // ── Connecting ───────────────────────────────────────────────────

    async fn connect(
        &mut self,
        connector: &dyn Connector,
        shutdown: &mut ShutdownListener,
    ) -> Result<Box<dyn GatewayTransport>, Abort> {
        self.phase = SessionPhase::Connecting;
        tracing::debug!(credential = %self.credential_ref, url = %self.config.gateway_url, "connecting");

        let connect = time::timeout(
            self.config.connect_timeout,
            connector.connect(&self.config.gateway_url),
        );
        match cancellable(shutdown, connect).await {
            None => Err(Abort::cancelled()),
            Some(Err(_)) => Err(Abort::new(CloseReason::ConnectError, GatewayError::Timeout)),
            Some(Ok(Err(e))) => Err(Abort::new(CloseReason::ConnectError, e)),
            Some(Ok(Ok(transport))) => Ok(transport),
        }
    }

    // ── AwaitingHello ────────────────────────────────────────────────

    async fn await_hello(
        &mut self,
        transport: &mut dyn GatewayTransport,
        shutdown: &mut ShutdownListener,
    ) -> Result<(), Abort> {
        self.phase = SessionPhase::AwaitingHello;

        let recv = time::timeout(self.config.handshake_timeout, transport.recv_text());
        let text = match cancellable(shutdown, recv).await {
            None => return Err(Abort::cancelled()),
            Some(Err(_)) => {
                return Err(Abort::new(CloseReason::HandshakeError, "timed out waiting for HELLO"))
            }
            Some(Ok(Err(e))) => {
                return Err(Abort::new(CloseReason::HandshakeError, format!("no HELLO: {e}")))
            }
            Some(Ok(Ok(text))) => text,
        };

        let hello = decode_frame(&text)
            .and_then(|frame| decode_hello(&frame))
            .map_err(|e| Abort::new(CloseReason::HandshakeError, e))?;

        self.heartbeat_interval = Some(Duration::from_millis(hello.heartbeat_interval));
        tracing::debug!(
            credential = %self.credential_ref,
            heartbeat_interval_ms = hello.heartbeat_interval,
            "received HELLO"
        );
        Ok(())
    }

    // ── Authenticating ───────────────────────────────────────────────

    fn rejected(&self, cause: GatewayError) -> Abort {
        self.observer.auth_failed(&self.credential_ref);
        Abort::new(CloseReason::AuthConnectionClosed, cause)
    }

    async fn authenticate(
        &mut self,
        transport: &mut dyn GatewayTransport,
        shutdown: &mut ShutdownListener,
    ) -> Result<(), Abort> {
        self.phase = SessionPhase::Authenticating;

        let identify = IdentifyPayload {
            token: self.credential.expose().to_string(),
            intents: self.config.intents,
            properties: self.config.properties.clone(),
            presence: self.presence.to_update(unix_now()),
        };
        let frame =
            encode_identify(&identify).map_err(|e| Abort::new(CloseReason::HandshakeError, e))?;

        match cancellable(shutdown, transport.send_text(frame)).await {
            None => return Err(Abort::cancelled()),
            Some(Err(e)) if e.is_closed() => return Err(self.rejected(e)),
            Some(Err(e)) => return Err(Abort::new(CloseReason::TransportError, e)),
            Some(Ok(())) => {}
        }

        let recv = time::timeout(self.config.handshake_timeout, transport.recv_text());
        let text = match cancellable(shutdown, recv).await {
            None => return Err(Abort::cancelled()),
            Some(Err(_)) => {
                return Err(Abort::new(
                    CloseReason::HandshakeError,
                    "timed out waiting for identify reply",
                ))
            }
            Some(Ok(Err(e))) if e.is_closed() => return Err(self.rejected(e)),
            Some(Ok(Err(e))) => return Err(Abort::new(CloseReason::TransportError, e)),
            Some(Ok(Ok(text))) => text,
        };

        let ready = decode_frame(&text)
            .and_then(|frame| decode_ready(&frame))
            .map_err(|e| Abort::new(CloseReason::HandshakeError, e))?;

        self.identity = Some(ready.user.username);
        self.required_action = ready.required_action;
        self.heartbeats_sent = 1;
        self.last_heartbeat_sent_at = Some(Instant::now());

        self.observer.authenticated(
            &self.credential_ref,
            self.who(),
            self.required_action.as_deref(),
        );
        Ok(())
    }

    // ── Live ─────────────────────────────────────────────────────────

    async fn live(
        &mut self,
        transport: &mut dyn GatewayTransport,
        shutdown: &mut ShutdownListener,
    ) -> Result<Infallible, Abort> {
        self.phase = SessionPhase::Live;

        let scheduler = HeartbeatScheduler::new(self.config.guard_margin);
        let interval = self.heartbeat_interval.ok_or_else(|| {
            Abort::new(CloseReason::HandshakeError, "live without a heartbeat interval")
        })?;
        let poll = self.config.poll_interval;

        loop {
            let last_sent = self.last_heartbeat_sent_at.unwrap_or_else(Instant::now);
            if scheduler.is_due(interval, last_sent.into_std(), Instant::now().into_std()) {
                self.send_heartbeat(transport, shutdown, interval).await?;
            }

            let event = tokio::select! {
                biased;
                _ = shutdown.triggered() => LiveEvent::Cancelled,
                frame = transport.recv_text() => LiveEvent::Frame(frame),
                _ = time::sleep(poll) => LiveEvent::Tick,
            };

            match event {
                LiveEvent::Cancelled => return Err(Abort::cancelled()),
                LiveEvent::Tick => {}
                LiveEvent::Frame(Err(e)) => return Err(Abort::new(CloseReason::TransportError, e)),
                LiveEvent::Frame(Ok(text)) => {
                    let frame = decode_frame(&text)
                        .map_err(|e| Abort::new(CloseReason::TransportError, e))?;
                    match frame.op {
                        opcode::HEARTBEAT_ACK => {
                            tracing::trace!(session = %self.who(), "heartbeat acknowledged")
                        }
                        op => tracing::trace!(
                            session = %self.who(),
                            op,
                            event = ?frame.t,
                            "ignoring gateway event"
                        ),
                    }
                }
            }
        }
    }

    async fn send_heartbeat(
        &mut self,
        transport: &mut dyn GatewayTransport,
        shutdown: &mut ShutdownListener,
        interval: Duration,
    ) -> Result<(), Abort> {
        let frame = encode_heartbeat().map_err(|e| Abort::new(CloseReason::TransportError, e))?;
        match cancellable(shutdown, transport.send_text(frame)).await {
            None => return Err(Abort::cancelled()),
            Some(Err(e)) => return Err(Abort::new(CloseReason::TransportError, e)),
            Some(Ok(())) => {}
        }

        self.heartbeats_sent += 1;
        self.last_heartbeat_sent_at = Some(Instant::now());
        self.observer
            .heartbeat_sent(self.who(), self.heartbeats_sent, interval.as_millis() as u64);
        Ok(())
    }
}
