//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::api::{ApiError, ChatApi, MemberStatus, Restriction};
use super::{FeatureModule, Gateway, GatewaySettings};
use crate::database::MemoryStore;
use crate::permissions::StaticTiers;

/// Scriptable [`ChatApi`] that records every call.
#[derive(Default)]
pub struct MockApi {
    admins: Mutex<HashMap<i64, Vec<u64>>>,
    statuses: Mutex<HashMap<(i64, u64), MemberStatus>>,
    titles: Mutex<HashMap<i64, String>>,
    admin_calls: AtomicUsize,
    fail_admins: Mutex<Option<ApiError>>,
    fail_restrict: Mutex<Option<ApiError>>,
    sent: Mutex<Vec<(i64, String)>>,
    deleted: Mutex<Vec<(i64, i32)>>,
    restrictions: Mutex<Vec<(i64, u64, Restriction)>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admins(self, chat_id: i64, admins: &[u64]) -> Self {
        self.set_admins(chat_id, admins);
        self
    }

    pub fn with_member(self, chat_id: i64, user_id: u64, status: MemberStatus) -> Self {
        self.statuses.lock().insert((chat_id, user_id), status);
        self
    }

    pub fn with_title(self, chat_id: i64, title: &str) -> Self {
        self.titles.lock().insert(chat_id, title.to_string());
        self
    }

    pub fn set_admins(&self, chat_id: i64, admins: &[u64]) {
        self.admins.lock().insert(chat_id, admins.to_vec());
    }

    pub fn set_member(&self, chat_id: i64, user_id: u64, status: MemberStatus) {
        self.statuses.lock().insert((chat_id, user_id), status);
    }

    pub fn fail_admin_lookups(&self, error: Option<ApiError>) {
        *self.fail_admins.lock() = error;
    }

    pub fn fail_restrictions(&self, error: Option<ApiError>) {
        *self.fail_restrict.lock() = error;
    }

    pub fn admin_calls(&self) -> usize {
        self.admin_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().clone()
    }

    pub fn deleted(&self) -> Vec<(i64, i32)> {
        self.deleted.lock().clone()
    }

    pub fn restrictions(&self) -> Vec<(i64, u64, Restriction)> {
        self.restrictions.lock().clone()
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn list_administrators(&self, chat_id: i64) -> Result<Vec<u64>, ApiError> {
        self.admin_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.fail_admins.lock().clone() {
            return Err(e);
        }
        Ok(self.admins.lock().get(&chat_id).cloned().unwrap_or_default())
    }

    async fn member_status(&self, chat_id: i64, user_id: u64) -> Result<MemberStatus, ApiError> {
        if let Some(status) = self.statuses.lock().get(&(chat_id, user_id)) {
            return Ok(*status);
        }
        let is_admin = self
            .admins
            .lock()
            .get(&chat_id)
            .is_some_and(|a| a.contains(&user_id));
        Ok(if is_admin { MemberStatus::Administrator } else { MemberStatus::Left })
    }

    async fn chat_title(&self, chat_id: i64) -> Result<Option<String>, ApiError> {
        Ok(self.titles.lock().get(&chat_id).cloned())
    }

    async fn restrict(&self, chat_id: i64, user_id: u64, restriction: Restriction) -> Result<(), ApiError> {
        if let Some(e) = self.fail_restrict.lock().clone() {
            return Err(e);
        }
        self.restrictions.lock().push((chat_id, user_id, restriction));
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), ApiError> {
        self.deleted.lock().push((chat_id, message_id));
        Ok(())
    }

    async fn send_text(&self, chat_id: i64, text: &str, _reply_to: Option<i32>) -> Result<(), ApiError> {
        self.sent.lock().push((chat_id, text.to_string()));
        Ok(())
    }
}

pub const OWNER: u64 = 1;
pub const DEV: u64 = 2;
pub const SUDO: u64 = 3;
pub const WOLF: u64 = 5;

pub fn tiers() -> StaticTiers {
    StaticTiers {
        owner: Some(OWNER),
        developers: [DEV].into(),
        dragons: [SUDO].into(),
        wolves: [WOLF].into(),
        ..Default::default()
    }
}

/// A gateway over a mock API and an in-memory store.
pub fn gateway_with(
    api: Arc<MockApi>,
    settings: GatewaySettings,
    catalog: Vec<Arc<dyn FeatureModule>>,
) -> (Arc<Gateway>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let gw = Gateway::new(settings, tiers(), api, store.clone(), catalog);
    (Arc::new(gw), store)
}

pub fn gateway(api: Arc<MockApi>) -> (Arc<Gateway>, Arc<MemoryStore>) {
    gateway_with(api, GatewaySettings::default(), Vec::new())
}
