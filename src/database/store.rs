//! The persistent store behind the gateway's in-memory mirrors.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{
    Approval, BlacklistedUser, Connection, ConnectionAccess, DisabledCommand, ElevatedUsers, FloodSettings,
    HistoryEntry,
};

/// Store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Rows the gateway reads on startup and writes through on every change.
#[async_trait]
pub trait GatewayStore: Send + Sync {
    // Disabled commands

    async fn disabled_commands(&self) -> StoreResult<Vec<DisabledCommand>>;

    /// Returns true if the row did not exist before.
    async fn disable_command(&self, chat_id: i64, command: &str) -> StoreResult<bool>;

    /// Returns true if a row was removed.
    async fn enable_command(&self, chat_id: i64, command: &str) -> StoreResult<bool>;

    async fn migrate_disabled(&self, old_chat_id: i64, new_chat_id: i64) -> StoreResult<()>;

    // Antiflood

    async fn flood_settings(&self) -> StoreResult<Vec<FloodSettings>>;

    async fn save_flood_settings(&self, settings: &FloodSettings) -> StoreResult<()>;

    async fn migrate_flood(&self, old_chat_id: i64, new_chat_id: i64) -> StoreResult<()>;

    async fn approvals(&self) -> StoreResult<Vec<Approval>>;

    async fn approve(&self, chat_id: i64, user_id: u64) -> StoreResult<bool>;

    async fn unapprove(&self, chat_id: i64, user_id: u64) -> StoreResult<bool>;

    // Connections

    async fn connections(&self) -> StoreResult<Vec<Connection>>;

    async fn save_connection(&self, connection: Connection) -> StoreResult<()>;

    async fn delete_connection(&self, user_id: u64) -> StoreResult<bool>;

    /// History of a user, newest first.
    async fn connection_history(&self, user_id: u64) -> StoreResult<Vec<HistoryEntry>>;

    /// Replace the history of a user.
    async fn save_connection_history(&self, user_id: u64, entries: &[HistoryEntry]) -> StoreResult<()>;

    async fn connection_access(&self) -> StoreResult<Vec<ConnectionAccess>>;

    async fn set_connection_access(&self, access: ConnectionAccess) -> StoreResult<()>;

    async fn migrate_connections(&self, old_chat_id: i64, new_chat_id: i64) -> StoreResult<()>;

    // Trust tiers and blacklist

    async fn elevated_users(&self) -> StoreResult<ElevatedUsers>;

    async fn save_elevated_users(&self, users: &ElevatedUsers) -> StoreResult<()>;

    async fn blacklisted_users(&self) -> StoreResult<Vec<BlacklistedUser>>;

    async fn blacklist_user(&self, entry: &BlacklistedUser) -> StoreResult<()>;

    async fn unblacklist_user(&self, user_id: u64) -> StoreResult<bool>;
}
