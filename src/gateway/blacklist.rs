//! Globally ignored users.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use super::error::GatewayError;
use crate::database::{BlacklistedUser, GatewayStore};

pub struct Blacklist {
    store: Arc<dyn GatewayStore>,
    users: DashMap<u64, Option<String>>,
}

impl Blacklist {
    pub fn new(store: Arc<dyn GatewayStore>) -> Self {
        Self {
            store,
            users: DashMap::new(),
        }
    }

    pub fn hydrate(&self, rows: Vec<BlacklistedUser>) {
        self.users.clear();
        for row in rows {
            self.users.insert(row.user_id as u64, row.reason);
        }
    }

    #[inline]
    pub fn contains(&self, user_id: u64) -> bool {
        self.users.contains_key(&user_id)
    }

    /// Ignore a user. Returns false if they already were.
    pub async fn add(&self, user_id: u64, reason: Option<String>) -> Result<bool, GatewayError> {
        let entry = BlacklistedUser {
            user_id: user_id as i64,
            reason: reason.clone(),
        };
        self.store.blacklist_user(&entry).await?;
        let added = self.users.insert(user_id, reason).is_none();
        info!("Blacklisted user {}", user_id);
        Ok(added)
    }

    pub async fn remove(&self, user_id: u64) -> Result<bool, GatewayError> {
        self.store.unblacklist_user(user_id).await?;
        let removed = self.users.remove(&user_id).is_some();
        if removed {
            info!("User {} removed from blacklist", user_id);
        }
        Ok(removed)
    }

    /// (user id, reason) pairs, sorted by id.
    pub fn list(&self) -> Vec<(u64, Option<String>)> {
        let mut users: Vec<(u64, Option<String>)> = self
            .users
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        users.sort_by_key(|(id, _)| *id);
        users
    }
}
