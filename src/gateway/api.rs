//! The chat platform as seen by the gateway.
//!
//! Everything the gateway needs from Telegram goes through [`ChatApi`], so the
//! decision logic can run against a mock in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure of a platform call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The platform refused the request (missing rights, unknown chat, ...).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Network or unexpected failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Membership status of a user in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl MemberStatus {
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Owner | Self::Administrator)
    }

    /// Still inside the group, whatever the role.
    pub fn is_present(self) -> bool {
        matches!(self, Self::Owner | Self::Administrator | Self::Member | Self::Restricted)
    }
}

/// A restriction applied to a group member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restriction {
    Ban { until: Option<DateTime<Utc>> },
    /// Ban followed by an immediate unban.
    Kick,
    Mute { until: Option<DateTime<Utc>> },
}

/// Platform operations the gateway depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Ids of every administrator of a group.
    async fn list_administrators(&self, chat_id: i64) -> Result<Vec<u64>, ApiError>;

    async fn member_status(&self, chat_id: i64, user_id: u64) -> Result<MemberStatus, ApiError>;

    async fn chat_title(&self, chat_id: i64) -> Result<Option<String>, ApiError>;

    async fn restrict(&self, chat_id: i64, user_id: u64, restriction: Restriction) -> Result<(), ApiError>;

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), ApiError>;

    /// Send HTML text, optionally as a reply.
    async fn send_text(&self, chat_id: i64, text: &str, reply_to: Option<i32>) -> Result<(), ApiError>;
}
