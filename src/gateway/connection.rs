//! Remote connections from a private chat to a group.
//!
//! A user holds at most one active connection. Every use re-checks that the
//! user may still act on the group; when that fails the connection is
//! dropped instead of granting stale access.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::api::{ApiError, ChatApi};
use super::context::ChatRef;
use super::error::GatewayError;
use super::Gateway;
use crate::cache::{CacheConfig, TypedCache};
use crate::database::{Connection, ConnectionAccess, GatewayStore, HistoryEntry, CONNECTION_HISTORY_LIMIT};
use crate::permissions::is_anonymous_admin;

/// How a private-chat command's target was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The command was sent in a group; it acts on that group.
    NotPrivate,
    /// Private chat without an active connection.
    NotConnected,
    Connected(ChatRef),
    /// The user lost the right to connect and was disconnected.
    Revoked,
    /// Connected, but the command needs admin rights the user lacks there.
    AdminRequired,
    /// Membership could not be checked this time.
    Unavailable,
}

impl Resolution {
    /// The redirected chat, if any.
    pub fn target(&self) -> Option<&ChatRef> {
        match self {
            Self::Connected(chat) => Some(chat),
            _ => None,
        }
    }
}

/// Relationship of a user to a group, for connection purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    Admin,
    Member,
    Denied,
}

pub struct ConnectionBroker {
    store: Arc<dyn GatewayStore>,
    api: Arc<dyn ChatApi>,
    active: DashMap<u64, i64>,
    allow_members: DashMap<i64, bool>,
    history: DashMap<u64, Arc<Vec<HistoryEntry>>>,
    titles: TypedCache<i64, String>,
}

impl ConnectionBroker {
    pub fn new(store: Arc<dyn GatewayStore>, api: Arc<dyn ChatApi>) -> Self {
        Self {
            store,
            api,
            active: DashMap::new(),
            allow_members: DashMap::new(),
            history: DashMap::new(),
            titles: TypedCache::new("chat_titles", CacheConfig::chat_titles()),
        }
    }

    pub fn hydrate(&self, connections: Vec<Connection>, access: Vec<ConnectionAccess>) {
        self.active.clear();
        self.allow_members.clear();
        for c in connections {
            self.active.insert(c.user_id as u64, c.chat_id);
        }
        for a in access {
            self.allow_members.insert(a.chat_id, a.allow_members);
        }
    }

    /// Active connection of a user.
    pub fn active(&self, user_id: u64) -> Option<i64> {
        self.active.get(&user_id).map(|c| *c)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Whether plain members may connect to a group.
    pub fn allows_members(&self, chat_id: i64) -> bool {
        self.allow_members.get(&chat_id).map(|a| *a).unwrap_or(false)
    }

    pub async fn set_allow_members(&self, chat_id: i64, allow: bool) -> Result<(), GatewayError> {
        self.store
            .set_connection_access(ConnectionAccess {
                chat_id,
                allow_members: allow,
            })
            .await?;
        self.allow_members.insert(chat_id, allow);
        info!("Member connections in chat {} set to {}", chat_id, allow);
        Ok(())
    }

    /// Title of a group, cached.
    pub async fn chat_title(&self, chat_id: i64) -> Option<String> {
        if let Some(title) = self.titles.get(&chat_id) {
            return Some(title);
        }
        match self.api.chat_title(chat_id).await {
            Ok(Some(title)) => {
                self.titles.insert(chat_id, title.clone());
                Some(title)
            }
            Ok(None) => None,
            Err(e) => {
                debug!("No title for chat {}: {}", chat_id, e);
                None
            }
        }
    }

    /// A failed admin lookup is an error, never a denial, unless the member
    /// lookup below can still answer.
    async fn standing(&self, gw: &Gateway, chat: &ChatRef, user_id: u64) -> Result<Standing, ApiError> {
        if is_anonymous_admin(user_id) || gw.trust().is_whitelist_plus(user_id) {
            return Ok(Standing::Admin);
        }
        match gw.admins().admins(chat.id).await {
            Ok(admins) if admins.contains(&user_id) => return Ok(Standing::Admin),
            Ok(_) if !self.allows_members(chat.id) => return Ok(Standing::Denied),
            Ok(_) => {}
            Err(e) if !self.allows_members(chat.id) => return Err(e),
            Err(e) => debug!("Admin lookup for chat {} failed, asking membership: {}", chat.id, e),
        }
        let status = self.api.member_status(chat.id, user_id).await?;
        Ok(if status.is_admin() {
            Standing::Admin
        } else if status.is_present() {
            Standing::Member
        } else {
            Standing::Denied
        })
    }

    /// Resolve the target group of a command sent from `origin`.
    pub async fn resolve(&self, gw: &Gateway, origin: &ChatRef, user_id: u64, need_admin: bool) -> Resolution {
        if !origin.is_private() {
            return Resolution::NotPrivate;
        }
        let Some(chat_id) = self.active(user_id) else {
            return Resolution::NotConnected;
        };

        let chat = ChatRef::group(chat_id, self.chat_title(chat_id).await);
        match self.standing(gw, &chat, user_id).await {
            Ok(Standing::Admin) => Resolution::Connected(chat),
            Ok(Standing::Member) if need_admin => Resolution::AdminRequired,
            Ok(Standing::Member) => Resolution::Connected(chat),
            Ok(Standing::Denied) => {
                info!("User {} lost access to chat {}, disconnecting", user_id, chat_id);
                if let Err(e) = self.disconnect(user_id).await {
                    warn!("Could not drop connection of user {}: {}", user_id, e);
                    self.active.remove(&user_id);
                }
                Resolution::Revoked
            }
            Err(e) => {
                warn!("Could not verify connection of user {} to {}: {}", user_id, chat_id, e);
                Resolution::Unavailable
            }
        }
    }

    /// Connect a user to a group, replacing any previous connection.
    pub async fn connect(&self, gw: &Gateway, user_id: u64, chat_id: i64) -> Result<ChatRef, GatewayError> {
        let chat = ChatRef::group(chat_id, self.chat_title(chat_id).await);
        match self.standing(gw, &chat, user_id).await? {
            Standing::Admin | Standing::Member => {}
            Standing::Denied => {
                return Err(GatewayError::ConnectionDenied(
                    "connections to this chat are limited to admins".to_string(),
                ));
            }
        }

        self.store
            .save_connection(Connection {
                user_id: user_id as i64,
                chat_id,
            })
            .await?;
        self.active.insert(user_id, chat_id);

        let mut entries: Vec<HistoryEntry> = self.history(user_id).await?.as_ref().clone();
        entries.retain(|e| e.chat_id != chat_id);
        entries.insert(
            0,
            HistoryEntry {
                chat_id,
                chat_name: chat.display_name(),
                connected_at: Utc::now(),
            },
        );
        entries.truncate(CONNECTION_HISTORY_LIMIT);
        self.store.save_connection_history(user_id, &entries).await?;
        self.history.insert(user_id, Arc::new(entries));

        info!("User {} connected to chat {}", user_id, chat_id);
        Ok(chat)
    }

    /// Drop the active connection. Returns whether there was one.
    pub async fn disconnect(&self, user_id: u64) -> Result<bool, GatewayError> {
        self.store.delete_connection(user_id).await?;
        let removed = self.active.remove(&user_id).is_some();
        if removed {
            info!("User {} disconnected", user_id);
        }
        Ok(removed)
    }

    /// Connection history of a user, newest first.
    pub async fn history(&self, user_id: u64) -> Result<Arc<Vec<HistoryEntry>>, GatewayError> {
        if let Some(entries) = self.history.get(&user_id) {
            return Ok(Arc::clone(entries.value()));
        }
        let entries = Arc::new(self.store.connection_history(user_id).await?);
        self.history.insert(user_id, Arc::clone(&entries));
        Ok(entries)
    }

    pub async fn clear_history(&self, user_id: u64) -> Result<(), GatewayError> {
        self.store.save_connection_history(user_id, &[]).await?;
        self.history.insert(user_id, Arc::new(Vec::new()));
        Ok(())
    }

    pub async fn migrate(&self, old_chat_id: i64, new_chat_id: i64) -> Result<(), GatewayError> {
        self.store.migrate_connections(old_chat_id, new_chat_id).await?;
        for mut chat in self.active.iter_mut() {
            if *chat == old_chat_id {
                *chat = new_chat_id;
            }
        }
        if let Some((_, allow)) = self.allow_members.remove(&old_chat_id) {
            self.allow_members.insert(new_chat_id, allow);
        }
        self.titles.invalidate(&old_chat_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{gateway, MockApi, WOLF};
    use crate::gateway::{ChatKind, MemberStatus};

    const A: i64 = -1001;
    const B: i64 = -1002;
    const USER: u64 = 40;

    fn pm(user_id: u64) -> ChatRef {
        ChatRef::new(user_id as i64, ChatKind::Private, None)
    }

    #[tokio::test]
    async fn connecting_twice_keeps_one_active_connection() {
        let api = Arc::new(
            MockApi::new()
                .with_admins(A, &[USER])
                .with_admins(B, &[USER])
                .with_title(A, "Alpha")
                .with_title(B, "Beta"),
        );
        let (gw, _) = gateway(api);
        let broker = gw.connections();

        assert_eq!(broker.connect(&gw, USER, A).await.unwrap().display_name(), "Alpha");
        broker.connect(&gw, USER, B).await.unwrap();
        assert_eq!(broker.active(USER), Some(B));

        let history: Vec<i64> = broker.history(USER).await.unwrap().iter().map(|e| e.chat_id).collect();
        assert_eq!(history, vec![B, A]);

        assert!(broker.disconnect(USER).await.unwrap());
        assert!(!broker.disconnect(USER).await.unwrap());
        assert_eq!(broker.active(USER), None);
        assert_eq!(broker.history(USER).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn history_is_deduplicated_and_capped() {
        let api = Arc::new(MockApi::new());
        for chat in 1..=7 {
            api.set_admins(-chat, &[USER]);
        }
        let (gw, store) = gateway(api);
        let broker = gw.connections();

        for chat in 1..=6 {
            broker.connect(&gw, USER, -chat).await.unwrap();
        }
        broker.connect(&gw, USER, -4).await.unwrap();

        let history: Vec<i64> = broker.history(USER).await.unwrap().iter().map(|e| e.chat_id).collect();
        assert_eq!(history, vec![-4, -6, -5, -3, -2]);
        assert_eq!(store.connection_history(USER).await.unwrap().len(), CONNECTION_HISTORY_LIMIT);

        broker.clear_history(USER).await.unwrap();
        assert!(broker.history(USER).await.unwrap().is_empty());
        assert_eq!(broker.active(USER), Some(-4));
    }

    #[tokio::test]
    async fn lost_admin_rights_disconnect_on_next_use() {
        let api = Arc::new(MockApi::new().with_admins(A, &[USER]));
        let (gw, _) = gateway(api.clone());
        let broker = gw.connections();

        broker.connect(&gw, USER, A).await.unwrap();
        assert!(matches!(broker.resolve(&gw, &pm(USER), USER, true).await, Resolution::Connected(c) if c.id == A));

        api.set_admins(A, &[]);
        gw.admins().invalidate(A);
        assert_eq!(broker.resolve(&gw, &pm(USER), USER, false).await, Resolution::Revoked);
        assert_eq!(broker.active(USER), None);
        assert_eq!(broker.resolve(&gw, &pm(USER), USER, false).await, Resolution::NotConnected);
    }

    #[tokio::test]
    async fn members_connect_only_where_allowed() {
        let api = Arc::new(MockApi::new().with_member(A, USER, MemberStatus::Member));
        let (gw, _) = gateway(api);
        let broker = gw.connections();

        assert!(matches!(
            broker.connect(&gw, USER, A).await,
            Err(GatewayError::ConnectionDenied(_))
        ));
        assert_eq!(broker.active(USER), None);

        broker.set_allow_members(A, true).await.unwrap();
        broker.connect(&gw, USER, A).await.unwrap();
        assert_eq!(broker.resolve(&gw, &pm(USER), USER, true).await, Resolution::AdminRequired);
        assert_eq!(broker.active(USER), Some(A));
        assert!(broker.resolve(&gw, &pm(USER), USER, false).await.target().is_some());

        broker.set_allow_members(A, false).await.unwrap();
        assert_eq!(broker.resolve(&gw, &pm(USER), USER, false).await, Resolution::Revoked);
    }

    #[tokio::test]
    async fn privileged_tiers_connect_anywhere() {
        let api = Arc::new(MockApi::new());
        let (gw, _) = gateway(api.clone());
        let broker = gw.connections();

        broker.connect(&gw, WOLF, A).await.unwrap();
        assert!(broker.resolve(&gw, &pm(WOLF), WOLF, true).await.target().is_some());
        assert_eq!(api.admin_calls(), 0);
    }

    #[tokio::test]
    async fn group_commands_are_not_redirected() {
        let api = Arc::new(MockApi::new().with_admins(A, &[USER]));
        let (gw, _) = gateway(api);
        gw.connections().connect(&gw, USER, A).await.unwrap();

        let group = ChatRef::group(B, None);
        assert_eq!(gw.connections().resolve(&gw, &group, USER, false).await, Resolution::NotPrivate);
    }

    #[tokio::test]
    async fn transport_errors_keep_the_connection() {
        let api = Arc::new(MockApi::new().with_member(A, USER, MemberStatus::Member));
        let (gw, _) = gateway(api.clone());
        let broker = gw.connections();
        broker.set_allow_members(A, true).await.unwrap();
        broker.connect(&gw, USER, A).await.unwrap();

        api.fail_admin_lookups(Some(crate::gateway::ApiError::Transport("down".into())));
        // Admin lookup fails (deny), member lookup still succeeds.
        assert!(broker.resolve(&gw, &pm(USER), USER, false).await.target().is_some());
        assert_eq!(broker.active(USER), Some(A));
    }

    #[tokio::test]
    async fn failed_admin_lookups_keep_an_admin_connection() {
        let api = Arc::new(MockApi::new().with_admins(A, &[USER]));
        let (gw, _) = gateway(api.clone());
        let broker = gw.connections();
        broker.connect(&gw, USER, A).await.unwrap();

        gw.admins().invalidate(A);
        api.fail_admin_lookups(Some(ApiError::Transport("down".into())));
        assert_eq!(broker.resolve(&gw, &pm(USER), USER, true).await, Resolution::Unavailable);
        assert_eq!(broker.active(USER), Some(A));

        api.fail_admin_lookups(None);
        assert!(matches!(broker.resolve(&gw, &pm(USER), USER, true).await, Resolution::Connected(c) if c.id == A));
    }
}
