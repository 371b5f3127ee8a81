//! onliner-core: shared protocol library for onliner.
//!
//! Provides gateway opcodes and JSON payload types, the text-frame codec,
//! the heartbeat timing policy, and log-safe credentials.

pub mod codec;
pub mod credential;
pub mod error;
pub mod heartbeat;
pub mod messages;

// Re-export commonly used items at crate root.
pub use codec::{decode_frame, decode_hello, decode_ready, encode_heartbeat, encode_identify};
pub use credential::Credential;
pub use error::{GatewayError, GatewayResult};
pub use heartbeat::{HeartbeatScheduler, DEFAULT_GUARD_MARGIN};
pub use messages::{
    opcode, ActivityDescriptor, ActivityKind, ConnectionProperties, GatewayFrame, OnlineStatus,
    PresenceSpec, DEFAULT_GATEWAY_URL,
};
