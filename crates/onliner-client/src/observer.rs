//! Observability sink for session events.
//!
//! Sessions and the supervisor report through a [`SessionObserver`]; the
//! default [`TracingObserver`] turns each event into a structured `tracing`
//! record. Identities are display names; accounts without one are named by
//! their credential fingerprint.

use crate::session::CloseReason;

/// Receives lifecycle events from sessions.
pub trait SessionObserver: Send + Sync {
    /// Identify succeeded.
    fn authenticated(&self, credential_ref: &str, identity: &str, required_action: Option<&str>);

    /// The gateway closed the connection in response to identify.
    fn auth_failed(&self, credential_ref: &str);

    /// A heartbeat went out. `sequence` counts the beacon implied by
    /// authentication as number one.
    fn heartbeat_sent(&self, identity: &str, sequence: u64, interval_ms: u64);

    /// The session reached a terminal state.
    fn session_closed(&self, who: &str, reason: CloseReason);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn authenticated(&self, credential_ref: &str, identity: &str, required_action: Option<&str>) {
        tracing::info!(
            credential = %credential_ref,
            identity = %identity,
            required_action = ?required_action,
            "authenticated"
        );
    }

    fn auth_failed(&self, credential_ref: &str) {
        tracing::warn!(credential = %credential_ref, "authentication failed, token invalid");
    }

    fn heartbeat_sent(&self, identity: &str, sequence: u64, interval_ms: u64) {
        tracing::debug!(identity = %identity, sequence, interval_ms, "heartbeat sent");
    }

    fn session_closed(&self, who: &str, reason: CloseReason) {
        match reason {
            CloseReason::CallerCancelled => {
                tracing::debug!(session = %who, reason = %reason, "session closed")
            }
            _ => tracing::info!(session = %who, reason = %reason, "session closed"),
        }
    }
}
