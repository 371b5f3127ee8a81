//! Console reporter: one aligned line per session event.
//!
//! ```text
//! [🔑]          Authenticated |                       piggy | -
//! [💓] Sending Heartbeat 0002 |                       piggy | 41250ms
//! ```

use onliner_client::{CloseReason, SessionObserver, TracingObserver};

/// Format one console line: `[symbol] text | who | extra`.
pub fn format_line(symbol: &str, text: &str, who: &str, extra: &str) -> String {
    format!(
        "[{symbol}] {:>25} {:>32} {extra}",
        format!("{text} |"),
        format!("{who} |")
    )
}

/// Prints console lines and forwards every event to [`TracingObserver`].
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    tracing: TracingObserver,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionObserver for ConsoleReporter {
    fn authenticated(&self, credential_ref: &str, identity: &str, required_action: Option<&str>) {
        self.tracing.authenticated(credential_ref, identity, required_action);
        println!(
            "{}",
            format_line("🔑", "Authenticated", identity, required_action.unwrap_or("-"))
        );
    }

    fn auth_failed(&self, credential_ref: &str) {
        self.tracing.auth_failed(credential_ref);
        println!(
            "{}",
            format_line("🔐", "Failed to Authenticate", credential_ref, "TOKEN INVALID")
        );
    }

    fn heartbeat_sent(&self, identity: &str, sequence: u64, interval_ms: u64) {
        self.tracing.heartbeat_sent(identity, sequence, interval_ms);
        println!(
            "{}",
            format_line(
                "💓",
                &format!("Sending Heartbeat {sequence:04}"),
                identity,
                &format!("{interval_ms}ms")
            )
        );
    }

    fn session_closed(&self, who: &str, reason: CloseReason) {
        self.tracing.session_closed(who, reason);
        match reason {
            // Rejection already has its own line.
            CloseReason::AuthConnectionClosed | CloseReason::CallerCancelled => {}
            CloseReason::ConnectError | CloseReason::HandshakeError | CloseReason::TransportError => {
                println!("{}", format_line("🔌", "Disconnected", who, reason.as_str()))
            }
        }
    }
}
