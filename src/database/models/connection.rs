//! Connection models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum history entries kept per user.
pub const CONNECTION_HISTORY_LIMIT: usize = 5;

/// Active connection of a user to a group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Connection {
    pub user_id: i64,
    pub chat_id: i64,
}

/// One remembered connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub chat_id: i64,
    pub chat_name: String,
    pub connected_at: DateTime<Utc>,
}

/// Connection history of a user, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionHistory {
    pub user_id: i64,
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
}

/// Whether plain members of a group may connect to it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionAccess {
    pub chat_id: i64,
    #[serde(default)]
    pub allow_members: bool,
}
