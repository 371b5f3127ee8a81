//! Settings at `~/.onliner/config.toml`.
//!
//! Gateway identity, timing and reconnect policy. Every key is optional;
//! a missing file means defaults. CLI flags override file values.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use onliner_client::{BackoffPolicy, SessionConfig};
use onliner_core::messages::{intents, ConnectionProperties};
use onliner_core::DEFAULT_GATEWAY_URL;

/// Top-level settings file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Where to connect and how to present the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_intents")]
    pub intents: u64,

    #[serde(default = "default_os")]
    pub os: String,

    #[serde(default = "default_browser")]
    pub browser: String,

    #[serde(default = "default_device")]
    pub device: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            intents: default_intents(),
            os: default_os(),
            browser: default_browser(),
            device: default_device(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Sent this long before the server's heartbeat deadline.
    #[serde(default = "default_guard_margin_ms")]
    pub guard_margin_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            guard_margin_ms: default_guard_margin_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
        }
    }
}

/// Delay between a dropped session and the next attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// `false` restarts immediately.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Fraction of each delay randomised, 0.0 to 1.0.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_intents() -> u64 {
    intents::DEFAULT
}

fn default_os() -> String {
    ConnectionProperties::default().os
}

fn default_browser() -> String {
    ConnectionProperties::default().browser
}

fn default_device() -> String {
    ConnectionProperties::default().device
}

fn default_guard_margin_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_handshake_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.2
}

impl Config {
    /// Load settings from a TOML file, returning defaults if the file does
    /// not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            gateway_url: self.gateway.url.clone(),
            intents: self.gateway.intents,
            properties: ConnectionProperties {
                os: self.gateway.os.clone(),
                browser: self.gateway.browser.clone(),
                device: self.gateway.device.clone(),
            },
            guard_margin: Duration::from_millis(self.timing.guard_margin_ms),
            poll_interval: Duration::from_millis(self.timing.poll_interval_ms.max(1)),
            connect_timeout: Duration::from_secs(self.timing.connect_timeout_secs),
            handshake_timeout: Duration::from_secs(self.timing.handshake_timeout_secs),
        }
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            enabled: self.reconnect.enabled,
            initial: Duration::from_millis(self.reconnect.initial_delay_ms),
            max: Duration::from_millis(self.reconnect.max_delay_ms),
            multiplier: self.reconnect.multiplier,
            jitter: self.reconnect.jitter,
        }
    }
}

/// `~/.onliner/config.toml`, or a relative path if there is no home.
pub fn default_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".onliner")
        .join("config.toml")
}
