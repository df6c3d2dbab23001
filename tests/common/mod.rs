//! Shared harness: a recording chat platform and a gateway with every module.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use warden::database::MemoryStore;
use warden::gateway::{
    ApiError, ChatApi, ChatKind, ChatRef, CommandContext, DispatchOutcome, Gateway, GatewaySettings, MemberStatus,
    Restriction, UserRef,
};
use warden::permissions::StaticTiers;
use warden::plugins;

pub const OWNER: u64 = 1;
pub const DEV: u64 = 2;
pub const ADMIN: u64 = 100;
pub const MEMBER: u64 = 200;
pub const GROUP: i64 = -1_001_234_567_890;

/// Chat platform double that records what the bot sent.
#[derive(Default)]
pub struct RecordingApi {
    admins: Mutex<HashMap<i64, Vec<u64>>>,
    members: Mutex<HashMap<(i64, u64), MemberStatus>>,
    pub sent: Mutex<Vec<(i64, String)>>,
    pub deleted: Mutex<Vec<(i64, i32)>>,
    pub restricted: Mutex<Vec<(i64, u64, Restriction)>>,
}

impl RecordingApi {
    pub fn set_admins(&self, chat_id: i64, admins: &[u64]) {
        self.admins.lock().insert(chat_id, admins.to_vec());
    }

    pub fn set_member(&self, chat_id: i64, user_id: u64, status: MemberStatus) {
        self.members.lock().insert((chat_id, user_id), status);
    }

    pub fn last_text(&self) -> Option<String> {
        self.sent.lock().last().map(|(_, text)| text.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl ChatApi for RecordingApi {
    async fn list_administrators(&self, chat_id: i64) -> Result<Vec<u64>, ApiError> {
        Ok(self.admins.lock().get(&chat_id).cloned().unwrap_or_default())
    }

    async fn member_status(&self, chat_id: i64, user_id: u64) -> Result<MemberStatus, ApiError> {
        if let Some(status) = self.members.lock().get(&(chat_id, user_id)) {
            return Ok(*status);
        }
        let admin = self.admins.lock().get(&chat_id).is_some_and(|a| a.contains(&user_id));
        Ok(if admin { MemberStatus::Administrator } else { MemberStatus::Left })
    }

    async fn chat_title(&self, chat_id: i64) -> Result<Option<String>, ApiError> {
        Ok((chat_id == GROUP).then(|| "Test Group".to_string()))
    }

    async fn restrict(&self, chat_id: i64, user_id: u64, restriction: Restriction) -> Result<(), ApiError> {
        self.restricted.lock().push((chat_id, user_id, restriction));
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

pub struct Harness {
    pub gateway: Arc<Gateway>,
    pub api: Arc<RecordingApi>,
    pub store: Arc<MemoryStore>,
}

pub fn tiers() -> StaticTiers {
    StaticTiers {
        owner: Some(OWNER),
        developers: [DEV].into(),
        ..Default::default()
    }
}

impl Harness {
    /// A gateway with every catalog module loaded.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        let api = Arc::new(RecordingApi::default());
        api.set_admins(GROUP, &[ADMIN]);
        let gateway = Arc::new(Gateway::new(
            GatewaySettings {
                bot_username: "warden_bot".to_string(),
                ..Default::default()
            },
            tiers(),
            api.clone(),
            store.clone(),
            plugins::catalog(),
        ));
        for module in gateway.modules().available() {
            gateway.load_module(&module).expect("catalog modules load cleanly");
        }
        Self { gateway, api, store }
    }

    pub async fn in_group(&self, user: u64, text: &str) -> DispatchOutcome {
        self.send(ChatRef::group(GROUP, Some("Test Group".into())), user, text).await
    }

    pub async fn in_private(&self, user: u64, text: &str) -> DispatchOutcome {
        self.send(ChatRef::new(user as i64, ChatKind::Private, None), user, text).await
    }

    async fn send(&self, chat: ChatRef, user: u64, text: &str) -> DispatchOutcome {
        let parsed = warden::utils::parse_command(text, false, "warden_bot").expect("test input is a command");
        let ctx = CommandContext::new(chat, UserRef::new(user, "tester"), parsed.name, parsed.args).with_message_id(1);
        Arc::clone(&self.gateway).receive_command(ctx).await
    }
}
