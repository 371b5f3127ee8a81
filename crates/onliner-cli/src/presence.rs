//! Presence config (`config.json`): the pools each account's status and
//! activity are drawn from.
//!
//! ```json
//! { "choose_random_online_status_from": ["online", "dnd"],
//!   "choose_random_activity_type_from": ["game", "streaming"],
//!   "game":      { "choose_random_game_from": ["Celeste"] },
//!   "streaming": { "choose_random_name_from": ["Live"],
//!                  "choose_random_url_from": ["https://twitch.tv/x"] } }
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

use onliner_core::{ActivityDescriptor, ActivityKind, OnlineStatus, PresenceSpec};

#[derive(Debug, Clone, Deserialize)]
pub struct GameSection {
    #[serde(default)]
    pub choose_random_game_from: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamingSection {
    #[serde(default)]
    pub choose_random_name_from: Vec<String>,
    #[serde(default)]
    pub choose_random_url_from: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedSection {
    #[serde(default)]
    pub choose_random_name_from: Vec<String>,
}

/// Selection pools, one optional section per activity kind.
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    pub choose_random_online_status_from: Vec<OnlineStatus>,
    pub choose_random_activity_type_from: Vec<ActivityKind>,
    pub game: Option<GameSection>,
    pub streaming: Option<StreamingSection>,
    pub listening: Option<NamedSection>,
    pub watching: Option<NamedSection>,
    pub custom: Option<NamedSection>,
    pub competing: Option<NamedSection>,
}

impl PresenceConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("invalid presence config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read presence config at {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Names available for `kind`; empty if its section is missing.
    fn names(&self, kind: ActivityKind) -> &[String] {
        let names = match kind {
            ActivityKind::Game => self.game.as_ref().map(|s| &s.choose_random_game_from[..]),
            ActivityKind::Streaming => {
                self.streaming.as_ref().map(|s| &s.choose_random_name_from[..])
            }
            ActivityKind::Listening => {
                self.listening.as_ref().map(|s| &s.choose_random_name_from[..])
            }
            ActivityKind::Watching => self.watching.as_ref().map(|s| &s.choose_random_name_from[..]),
            ActivityKind::Custom => self.custom.as_ref().map(|s| &s.choose_random_name_from[..]),
            ActivityKind::Competing => {
                self.competing.as_ref().map(|s| &s.choose_random_name_from[..])
            }
        };
        names.unwrap_or(&[])
    }

    fn urls(&self) -> &[String] {
        self.streaming
            .as_ref()
            .map(|s| &s.choose_random_url_from[..])
            .unwrap_or(&[])
    }

    /// Every kind that can be drawn must have something to draw from.
    fn validate(&self) -> Result<()> {
        if self.choose_random_online_status_from.is_empty() {
            bail!("choose_random_online_status_from is empty");
        }
        if self.choose_random_activity_type_from.is_empty() {
            bail!("choose_random_activity_type_from is empty");
        }
        for &kind in &self.choose_random_activity_type_from {
            if self.names(kind).is_empty() {
                bail!("activity type \"{kind}\" is selectable but has no names configured");
            }
            if kind == ActivityKind::Streaming && self.urls().is_empty() {
                bail!("activity type \"streaming\" is selectable but has no URLs configured");
            }
        }
        Ok(())
    }

    /// Draw a status and a single activity.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<PresenceSpec> {
        let status = *self
            .choose_random_online_status_from
            .choose(rng)
            .context("no online status to choose from")?;
        let kind = *self
            .choose_random_activity_type_from
            .choose(rng)
            .context("no activity type to choose from")?;
        let name = self
            .names(kind)
            .choose(rng)
            .with_context(|| format!("no names for activity type \"{kind}\""))?;

        let activity = match kind {
            ActivityKind::Streaming => {
                let url = self.urls().choose(rng).context("no streaming URLs")?;
                ActivityDescriptor::streaming(name.clone(), url.clone())
            }
            ActivityKind::Game
            | ActivityKind::Listening
            | ActivityKind::Watching
            | ActivityKind::Custom
            | ActivityKind::Competing => ActivityDescriptor::new(name.clone(), kind),
        };

        let mut presence = PresenceSpec::new(status);
        presence.add_activity(activity);
        Ok(presence)
    }
}
