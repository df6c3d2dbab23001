//! In-memory store, used when no MongoDB URI is configured and in tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::models::{
    Approval, BlacklistedUser, Connection, ConnectionAccess, DisabledCommand, ElevatedUsers, FloodSettings,
    HistoryEntry,
};
use super::store::{GatewayStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    disabled: BTreeSet<(i64, String)>,
    flood: BTreeMap<i64, FloodSettings>,
    approvals: BTreeSet<(i64, u64)>,
    connections: HashMap<u64, i64>,
    history: HashMap<u64, Vec<HistoryEntry>>,
    access: BTreeMap<i64, bool>,
    elevated: ElevatedUsers,
    blacklist: BTreeMap<u64, Option<String>>,
}

/// [`GatewayStore`] held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail until reset (failure injection).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("writes disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GatewayStore for MemoryStore {
    async fn disabled_commands(&self) -> StoreResult<Vec<DisabledCommand>> {
        Ok(self
            .tables
            .lock()
            .disabled
            .iter()
            .map(|(chat_id, command)| DisabledCommand::new(*chat_id, command.clone()))
            .collect())
    }

    async fn disable_command(&self, chat_id: i64, command: &str) -> StoreResult<bool> {
        self.writable()?;
        Ok(self.tables.lock().disabled.insert((chat_id, command.to_string())))
    }

    async fn enable_command(&self, chat_id: i64, command: &str) -> StoreResult<bool> {
        self.writable()?;
        Ok(self.tables.lock().disabled.remove(&(chat_id, command.to_string())))
    }

    async fn migrate_disabled(&self, old_chat_id: i64, new_chat_id: i64) -> StoreResult<()> {
        self.writable()?;
        let mut tables = self.tables.lock();
        let moved: Vec<String> = tables
            .disabled
            .iter()
            .filter(|(chat, _)| *chat == old_chat_id)
            .map(|(_, cmd)| cmd.clone())
            .collect();
        for cmd in moved {
            tables.disabled.remove(&(old_chat_id, cmd.clone()));
            tables.disabled.insert((new_chat_id, cmd));
        }
        Ok(())
    }

    async fn flood_settings(&self) -> StoreResult<Vec<FloodSettings>> {
        Ok(self.tables.lock().flood.values().cloned().collect())
    }

    async fn save_flood_settings(&self, settings: &FloodSettings) -> StoreResult<()> {
        self.writable()?;
        self.tables.lock().flood.insert(settings.chat_id, settings.clone());
        Ok(())
    }

    async fn migrate_flood(&self, old_chat_id: i64, new_chat_id: i64) -> StoreResult<()> {
        self.writable()?;
        let mut tables = self.tables.lock();
        if let Some(mut settings) = tables.flood.remove(&old_chat_id) {
            settings.chat_id = new_chat_id;
            tables.flood.insert(new_chat_id, settings);
        }
        let moved: Vec<u64> = tables
            .approvals
            .iter()
            .filter(|(chat, _)| *chat == old_chat_id)
            .map(|(_, user)| *user)
            .collect();
        for user in moved {
            tables.approvals.remove(&(old_chat_id, user));
            tables.approvals.insert((new_chat_id, user));
        }
        Ok(())
    }

    async fn approvals(&self) -> StoreResult<Vec<Approval>> {
        Ok(self
            .tables
            .lock()
            .approvals
            .iter()
            .map(|(chat_id, user_id)| Approval {
                chat_id: *chat_id,
                user_id: *user_id as i64,
            })
            .collect())
    }

    async fn approve(&self, chat_id: i64, user_id: u64) -> StoreResult<bool> {
        self.writable()?;
        Ok(self.tables.lock().approvals.insert((chat_id, user_id)))
    }

    async fn unapprove(&self, chat_id: i64, user_id: u64) -> StoreResult<bool> {
        self.writable()?;
        Ok(self.tables.lock().approvals.remove(&(chat_id, user_id)))
    }

    async fn connections(&self) -> StoreResult<Vec<Connection>> {
        Ok(self
            .tables
            .lock()
            .connections
            .iter()
            .map(|(user_id, chat_id)| Connection {
                user_id: *user_id as i64,
                chat_id: *chat_id,
            })
            .collect())
    }

    async fn save_connection(&self, connection: Connection) -> StoreResult<()> {
        self.writable()?;
        self.tables
            .lock()
            .connections
            .insert(connection.user_id as u64, connection.chat_id);
        Ok(())
    }

    async fn delete_connection(&self, user_id: u64) -> StoreResult<bool> {
        self.writable()?;
        Ok(self.tables.lock().connections.remove(&user_id).is_some())
    }

    async fn connection_history(&self, user_id: u64) -> StoreResult<Vec<HistoryEntry>> {
        Ok(self.tables.lock().history.get(&user_id).cloned().unwrap_or_default())
    }

    async fn save_connection_history(&self, user_id: u64, entries: &[HistoryEntry]) -> StoreResult<()> {
        self.writable()?;
        self.tables.lock().history.insert(user_id, entries.to_vec());
        Ok(())
    }

    async fn connection_access(&self) -> StoreResult<Vec<ConnectionAccess>> {
        Ok(self
            .tables
            .lock()
            .access
            .iter()
            .map(|(chat_id, allow)| ConnectionAccess {
                chat_id: *chat_id,
                allow_members: *allow,
            })
            .collect())
    }

    async fn set_connection_access(&self, access: ConnectionAccess) -> StoreResult<()> {
        self.writable()?;
        self.tables.lock().access.insert(access.chat_id, access.allow_members);
        Ok(())
    }

    async fn migrate_connections(&self, old_chat_id: i64, new_chat_id: i64) -> StoreResult<()> {
        self.writable()?;
        let mut tables = self.tables.lock();
        for chat in tables.connections.values_mut() {
            if *chat == old_chat_id {
                *chat = new_chat_id;
            }
        }
        if let Some(allow) = tables.access.remove(&old_chat_id) {
            tables.access.insert(new_chat_id, allow);
        }
        Ok(())
    }

    async fn elevated_users(&self) -> StoreResult<ElevatedUsers> {
        Ok(self.tables.lock().elevated.clone())
    }

    async fn save_elevated_users(&self, users: &ElevatedUsers) -> StoreResult<()> {
        self.writable()?;
        self.tables.lock().elevated = users.clone();
        Ok(())
    }

    async fn blacklisted_users(&self) -> StoreResult<Vec<BlacklistedUser>> {
        Ok(self
            .tables
            .lock()
            .blacklist
            .iter()
            .map(|(user_id, reason)| BlacklistedUser {
                user_id: *user_id as i64,
                reason: reason.clone(),
            })
            .collect())
    }

    async fn blacklist_user(&self, entry: &BlacklistedUser) -> StoreResult<()> {
        self.writable()?;
        self.tables
            .lock()
            .blacklist
            .insert(entry.user_id as u64, entry.reason.clone());
        Ok(())
    }

    async fn unblacklist_user(&self, user_id: u64) -> StoreResult<bool> {
        self.writable()?;
        Ok(self.tables.lock().blacklist.remove(&user_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disable_reports_new_rows_only() {
        let store = MemoryStore::new();
        assert!(store.disable_command(-1, "notes").await.unwrap());
        assert!(!store.disable_command(-1, "notes").await.unwrap());
        assert!(store.enable_command(-1, "notes").await.unwrap());
        assert!(!store.enable_command(-1, "notes").await.unwrap());
    }

    #[tokio::test]
    async fn migration_moves_rows() {
        let store = MemoryStore::new();
        store.disable_command(-1, "notes").await.unwrap();
        store.approve(-1, 5).await.unwrap();
        let mut settings = FloodSettings::new(-1);
        settings.limit = 7;
        store.save_flood_settings(&settings).await.unwrap();

        store.migrate_disabled(-1, -100).await.unwrap();
        store.migrate_flood(-1, -100).await.unwrap();

        assert_eq!(store.disabled_commands().await.unwrap(), vec![DisabledCommand::new(-100, "notes")]);
        let flood = store.flood_settings().await.unwrap();
        assert_eq!(flood.len(), 1);
        assert_eq!((flood[0].chat_id, flood[0].limit), (-100, 7));
        assert_eq!(store.approvals().await.unwrap()[0].chat_id, -100);
    }

    #[tokio::test]
    async fn failed_writes_leave_tables_untouched() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        assert!(store.disable_command(-1, "notes").await.is_err());
        assert!(store.disabled_commands().await.unwrap().is_empty());
    }
}
