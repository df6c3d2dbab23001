//! Antiflood settings and approvals.

use serde::{Deserialize, Serialize};

/// Punishment applied when a chat's flood limit is exceeded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FloodPenalty {
    /// Ban permanently
    #[default]
    Ban,
    /// Ban then unban, the user may rejoin
    Kick,
    /// Remove send permission
    Mute,
    /// Ban for the configured duration
    #[serde(rename = "tban")]
    TempBan,
    /// Mute for the configured duration
    #[serde(rename = "tmute")]
    TempMute,
}

impl FloodPenalty {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "ban" => Some(Self::Ban),
            "kick" => Some(Self::Kick),
            "mute" => Some(Self::Mute),
            "tban" => Some(Self::TempBan),
            "tmute" => Some(Self::TempMute),
            _ => None,
        }
    }

    /// Whether this penalty needs a duration.
    pub fn is_timed(self) -> bool {
        matches!(self, Self::TempBan | Self::TempMute)
    }

    pub fn verb(self) -> &'static str {
        match self {
            Self::Ban => "Banned",
            Self::Kick => "Kicked",
            Self::Mute => "Muted",
            Self::TempBan => "Temporarily banned",
            Self::TempMute => "Temporarily muted",
        }
    }
}

/// Antiflood settings for a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FloodSettings {
    /// Telegram chat ID (indexed)
    pub chat_id: i64,

    /// Consecutive messages allowed, 0 = disabled
    #[serde(default)]
    pub limit: u32,

    #[serde(default)]
    pub penalty: FloodPenalty,

    /// Duration string for timed penalties (`3d`, `30m`, ...)
    #[serde(default)]
    pub duration: Option<String>,
}

impl FloodSettings {
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            limit: 0,
            penalty: FloodPenalty::default(),
            duration: None,
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }
}

/// A user exempted from flood control in one chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Approval {
    pub chat_id: i64,
    pub user_id: i64,
}
