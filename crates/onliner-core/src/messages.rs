//! Gateway message types: opcodes, envelopes, and typed payloads.
//!
//! Outbound payloads (identify, heartbeat) are fully typed. Inbound traffic
//! is decoded only as far as the generic [`GatewayFrame`] envelope; the hello
//! and identify-reply payloads are then pulled out of its `d` field.

use serde::{Deserialize, Serialize};

/// Default gateway endpoint (API v10, JSON encoding).
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Gateway opcodes used by this client.
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const PRESENCE_UPDATE: u8 = 3;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Gateway intent bits.
pub mod intents {
    pub const GUILDS: u64 = 1 << 0;
    pub const GUILD_MESSAGES: u64 = 1 << 9;

    /// The fixed mask sent on identify.
    pub const DEFAULT: u64 = GUILDS | GUILD_MESSAGES;
}

// ── Presence model ───────────────────────────────────────────────────

/// Online status shown to other users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OnlineStatus {
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "dnd")]
    DoNotDisturb,
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "invisible")]
    Invisible,
    #[serde(rename = "offline")]
    Offline,
}

impl OnlineStatus {
    pub const ALL: [OnlineStatus; 5] = [
        Self::Online,
        Self::DoNotDisturb,
        Self::Idle,
        Self::Invisible,
        Self::Offline,
    ];

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::DoNotDisturb => "dnd",
            Self::Idle => "idle",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for OnlineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OnlineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown online status: {s}"))
    }
}

/// Kind of a rich-presence activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Game,
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 6] = [
        Self::Game,
        Self::Streaming,
        Self::Listening,
        Self::Watching,
        Self::Custom,
        Self::Competing,
    ];

    /// Numeric `type` value on the wire.
    pub fn code(&self) -> u8 {
        match self {
            Self::Game => 0,
            Self::Streaming => 1,
            Self::Listening => 2,
            Self::Watching => 3,
            Self::Custom => 4,
            Self::Competing => 5,
        }
    }

    /// Lowercase name, as used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Streaming => "streaming",
            Self::Listening => "listening",
            Self::Watching => "watching",
            Self::Custom => "custom",
            Self::Competing => "competing",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One activity shown in a presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityDescriptor {
    pub display_name: String,
    pub kind: ActivityKind,
    /// Only meaningful for [`ActivityKind::Streaming`]; ignored otherwise.
    pub stream_url: Option<String>,
}

impl ActivityDescriptor {
    pub fn new(display_name: impl Into<String>, kind: ActivityKind) -> Self {
        Self {
            display_name: display_name.into(),
            kind,
            stream_url: None,
        }
    }

    pub fn streaming(display_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            kind: ActivityKind::Streaming,
            stream_url: Some(url.into()),
        }
    }

    /// Build the wire form. The URL is dropped unless the kind is streaming.
    pub fn to_payload(&self) -> ActivityPayload {
        let url = match self.kind {
            ActivityKind::Streaming => self.stream_url.clone(),
            ActivityKind::Game
            | ActivityKind::Listening
            | ActivityKind::Watching
            | ActivityKind::Custom
            | ActivityKind::Competing => None,
        };
        ActivityPayload {
            name: self.display_name.clone(),
            kind: self.kind.code(),
            url,
        }
    }
}

/// Status plus ordered activities for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSpec {
    pub online_status: OnlineStatus,
    pub activities: Vec<ActivityDescriptor>,
}

impl PresenceSpec {
    pub fn new(online_status: OnlineStatus) -> Self {
        Self {
            online_status,
            activities: Vec::new(),
        }
    }

    /// Append an activity and return its index.
    pub fn add_activity(&mut self, activity: ActivityDescriptor) -> usize {
        self.activities.push(activity);
        self.activities.len() - 1
    }

    /// Remove the activity at `index`. Returns `false` if out of range.
    pub fn remove_activity(&mut self, index: usize) -> bool {
        if index < self.activities.len() {
            self.activities.remove(index);
            true
        } else {
            false
        }
    }

    /// Build the presence update embedded in identify.
    pub fn to_update(&self, since: f64) -> PresenceUpdate {
        PresenceUpdate {
            activities: self.activities.iter().map(|a| a.to_payload()).collect(),
            status: self.online_status,
            since,
            afk: false,
        }
    }
}

// ── Wire payloads ────────────────────────────────────────────────────

/// Generic inbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(default)]
    pub d: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

/// Outbound envelope: `{"op": .., "d": ..}`.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame<T: Serialize> {
    pub op: u8,
    pub d: T,
}

/// `d` of the hello frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HelloPayload {
    /// Milliseconds.
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    /// Always serialized, as `null` when absent.
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceUpdate {
    pub activities: Vec<ActivityPayload>,
    pub status: OnlineStatus,
    /// Unix time in seconds.
    pub since: f64,
    pub afk: bool,
}

/// Client/device metadata sent on identify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: "linux".to_string(),
            browser: "Brave".to_string(),
            device: "Desktop".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: u64,
    pub properties: ConnectionProperties,
    pub presence: PresenceUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadyUser {
    pub username: String,
}

/// The parts of the identify reply this client consumes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadyPayload {
    pub user: ReadyUser,
    #[serde(default)]
    pub required_action: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        assert_eq!(serde_json::to_string(&OnlineStatus::DoNotDisturb).unwrap(), "\"dnd\"");
        assert_eq!(serde_json::to_string(&OnlineStatus::Invisible).unwrap(), "\"invisible\"");
        assert_eq!("idle".parse::<OnlineStatus>().unwrap(), OnlineStatus::Idle);
        assert!("away".parse::<OnlineStatus>().is_err());
    }

    #[test]
    fn activity_codes_follow_declaration_order() {
        let codes: Vec<u8> = ActivityKind::ALL.iter().map(|k| k.code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4, 5]);
        let kind: ActivityKind = serde_json::from_str("\"competing\"").unwrap();
        assert_eq!(kind, ActivityKind::Competing);
    }

    #[test]
    fn streaming_keeps_url() {
        let payload = ActivityDescriptor::streaming("live", "https://x").to_payload();
        assert_eq!(payload.kind, 1);
        assert_eq!(payload.url.as_deref(), Some("https://x"));
    }

    #[test]
    fn non_streaming_drops_url() {
        let activity = ActivityDescriptor {
            display_name: "Celeste".into(),
            kind: ActivityKind::Game,
            stream_url: Some("https://x".into()),
        };
        let json = serde_json::to_value(activity.to_payload()).unwrap();
        assert_eq!(json["url"], serde_json::Value::Null);
        assert_eq!(json["type"], 0);
        assert_eq!(json["name"], "Celeste");
    }

    #[test]
    fn add_and_remove_activities() {
        let mut presence = PresenceSpec::new(OnlineStatus::Online);
        assert_eq!(presence.add_activity(ActivityDescriptor::new("a", ActivityKind::Game)), 0);
        assert_eq!(presence.add_activity(ActivityDescriptor::new("b", ActivityKind::Watching)), 1);
        assert!(presence.remove_activity(0));
        assert!(!presence.remove_activity(5));
        assert_eq!(presence.activities.len(), 1);
        assert_eq!(presence.activities[0].display_name, "b");
    }

    #[test]
    fn presence_update_shape() {
        let presence = PresenceSpec::new(OnlineStatus::Idle);
        let json = serde_json::to_value(presence.to_update(1.5)).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["since"], 1.5);
        assert_eq!(json["afk"], false);
        assert!(json["activities"].as_array().unwrap().is_empty());
    }

    #[test]
    fn ready_payload_optional_action() {
        let ready: ReadyPayload =
            serde_json::from_str(r#"{"user":{"username":"piggy","id":"1"},"v":10}"#).unwrap();
        assert_eq!(ready.user.username, "piggy");
        assert_eq!(ready.required_action, None);

        let ready: ReadyPayload = serde_json::from_str(
            r#"{"user":{"username":"piggy"},"required_action":"REQUIRE_VERIFIED_EMAIL"}"#,
        )
        .unwrap();
        assert_eq!(ready.required_action.as_deref(), Some("REQUIRE_VERIFIED_EMAIL"));
    }

    #[test]
    fn default_intents_mask() {
        assert_eq!(intents::DEFAULT, 513);
    }
}
