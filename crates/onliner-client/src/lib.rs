//! onliner-client: keeps a fleet of gateway sessions online.
//!
//! Each assignment (credential plus presence) gets a unit that connects,
//! identifies, heartbeats, and reconnects with backoff when the link drops.
//! A rejected credential stops its unit; everything else is retried until
//! the fleet is cancelled.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use onliner_client::{
//!     Assignment, BackoffPolicy, SessionConfig, SessionSupervisor, TracingObserver,
//!     WebSocketConnector,
//! };
//! use onliner_core::{Credential, OnlineStatus, PresenceSpec};
//!
//! # async fn example() {
//! let supervisor = SessionSupervisor::new(
//!     Arc::new(WebSocketConnector),
//!     SessionConfig::default(),
//!     BackoffPolicy::default(),
//!     Arc::new(TracingObserver),
//! );
//! let fleet = supervisor.spawn(vec![Assignment::new(
//!     Credential::new("token"),
//!     PresenceSpec::new(OnlineStatus::Online),
//! )]);
//!
//! tokio::signal::ctrl_c().await.ok();
//! fleet.cancel();
//! let report = fleet.wait().await;
//! println!("{} rejected", report.rejected().count());
//! # }
//! ```

pub mod backoff;
pub mod observer;
pub mod session;
pub mod shutdown;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export primary public types.
pub use backoff::{Backoff, BackoffPolicy};
pub use observer::{SessionObserver, TracingObserver};
pub use session::{
    CloseReason, Disposition, GatewaySession, SessionConfig, SessionOutcome, SessionPhase,
};
pub use shutdown::{ShutdownHandle, ShutdownListener};
pub use supervisor::{Assignment, Fleet, FleetReport, SessionSupervisor, UnitState, UnitStatus};
pub use transport::{Connector, GatewayTransport, WebSocketConnector, WebSocketTransport};

// Re-export onliner-core error types for convenience.
pub use onliner_core::{GatewayError, GatewayResult};
