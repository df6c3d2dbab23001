//! Per-chat command enable/disable registry.
//!
//! Commands opt in at registration time (when their module is attached).
//! Disabled rows live in the store and are mirrored here; every mutation
//! is persisted first and mirrored after the store accepted it.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::error::GatewayError;
use crate::database::{DisabledCommand, GatewayStore};
use crate::utils::normalize_command;

/// Result of one command within a bulk operation.
#[derive(Debug)]
pub struct BulkResult {
    pub command: String,
    pub result: Result<bool, GatewayError>,
}

pub struct CommandRegistry {
    store: Arc<dyn GatewayStore>,
    disableable: RwLock<BTreeSet<String>>,
    admin_exempt: RwLock<BTreeSet<String>>,
    disabled: DashMap<i64, HashSet<String>>,
}

impl CommandRegistry {
    pub fn new(store: Arc<dyn GatewayStore>) -> Self {
        Self {
            store,
            disableable: RwLock::new(BTreeSet::new()),
            admin_exempt: RwLock::new(BTreeSet::new()),
            disabled: DashMap::new(),
        }
    }

    /// Load persisted rows into the mirror.
    pub fn hydrate(&self, rows: Vec<DisabledCommand>) {
        self.disabled.clear();
        for row in rows {
            self.disabled
                .entry(row.chat_id)
                .or_default()
                .insert(normalize_command(&row.command));
        }
        debug!("Hydrated disabled commands for {} chats", self.disabled.len());
    }

    /// Opt a command into the disable subsystem.
    pub fn register(&self, command: &str, admin_exempt: bool) {
        let command = normalize_command(command);
        if admin_exempt {
            self.admin_exempt.write().insert(command.clone());
        }
        self.disableable.write().insert(command);
    }

    /// Remove a command from the disableable and admin-exempt sets.
    ///
    /// Persisted rows are kept so the setting survives a module reload.
    pub fn unregister(&self, command: &str) {
        let command = normalize_command(command);
        self.admin_exempt.write().remove(&command);
        self.disableable.write().remove(&command);
    }

    pub fn is_disableable(&self, command: &str) -> bool {
        self.disableable.read().contains(&normalize_command(command))
    }

    pub fn is_admin_exempt(&self, command: &str) -> bool {
        self.admin_exempt.read().contains(&normalize_command(command))
    }

    /// Every disableable command, sorted.
    pub fn disableable(&self) -> Vec<String> {
        self.disableable.read().iter().cloned().collect()
    }

    /// Admin-exempt commands, sorted.
    pub fn admin_exempt(&self) -> Vec<String> {
        self.admin_exempt.read().iter().cloned().collect()
    }

    pub fn is_disabled(&self, chat_id: i64, command: &str) -> bool {
        self.disabled
            .get(&chat_id)
            .is_some_and(|set| set.contains(&normalize_command(command)))
    }

    /// Disabled commands of a chat, sorted.
    pub fn disabled_in(&self, chat_id: i64) -> Vec<String> {
        let mut commands: Vec<String> = self
            .disabled
            .get(&chat_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        commands.sort();
        commands
    }

    /// Disable a command in a chat. Returns true if it was newly disabled.
    pub async fn disable(&self, chat_id: i64, command: &str) -> Result<bool, GatewayError> {
        let command = normalize_command(command);
        if !self.is_disableable(&command) {
            return Err(GatewayError::NotDisableable(command));
        }

        self.store.disable_command(chat_id, &command).await?;
        let newly = self.disabled.entry(chat_id).or_default().insert(command.clone());
        if newly {
            info!("Disabled /{} in chat {}", command, chat_id);
        }
        Ok(newly)
    }

    /// Enable a command in a chat. Returns true if it was disabled.
    pub async fn enable(&self, chat_id: i64, command: &str) -> Result<bool, GatewayError> {
        let command = normalize_command(command);
        if !self.is_disableable(&command) {
            return Err(GatewayError::NotDisableable(command));
        }

        self.store.enable_command(chat_id, &command).await?;
        let was_disabled = self
            .disabled
            .get_mut(&chat_id)
            .is_some_and(|mut set| set.remove(&command));
        self.disabled.remove_if(&chat_id, |_, set| set.is_empty());
        if was_disabled {
            info!("Enabled /{} in chat {}", command, chat_id);
        }
        Ok(was_disabled)
    }

    /// Disable every listed command, continuing past failures.
    pub async fn disable_many(&self, chat_id: i64, commands: &[String]) -> Vec<BulkResult> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            results.push(BulkResult {
                command: command.clone(),
                result: self.disable(chat_id, command).await,
            });
        }
        results
    }

    /// Enable every listed command, continuing past failures.
    pub async fn enable_many(&self, chat_id: i64, commands: &[String]) -> Vec<BulkResult> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            results.push(BulkResult {
                command: command.clone(),
                result: self.enable(chat_id, command).await,
            });
        }
        results
    }

    /// Move a chat's disabled commands to its new id.
    pub async fn migrate(&self, old_chat_id: i64, new_chat_id: i64) -> Result<(), GatewayError> {
        self.store.migrate_disabled(old_chat_id, new_chat_id).await?;
        if let Some((_, moved)) = self.disabled.remove(&old_chat_id) {
            self.disabled.entry(new_chat_id).or_default().extend(moved);
        }
        Ok(())
    }

    /// (disabled items, chats with at least one).
    pub fn stats(&self) -> (usize, usize) {
        let items = self.disabled.iter().map(|e| e.value().len()).sum();
        (items, self.disabled.len())
    }
}
