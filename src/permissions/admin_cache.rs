//! Per-group administrator cache.
//!
//! Admin lists are fetched from the platform on a miss and kept for a fixed
//! TTL. `/admincache` drops the entry outright; the next lookup refetches.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::tier::{is_anonymous_admin, TrustRegistry};
use crate::cache::{CacheConfig, TypedCache};
use crate::gateway::{ApiError, ChatApi, ChatRef};

/// Cached administrator ids, keyed by chat id.
pub struct AdminCache {
    api: Arc<dyn ChatApi>,
    trust: Arc<TrustRegistry>,
    cache: TypedCache<i64, Arc<HashSet<u64>>>,
}

impl AdminCache {
    pub fn new(api: Arc<dyn ChatApi>, trust: Arc<TrustRegistry>, ttl: Duration) -> Self {
        Self {
            api,
            trust,
            cache: TypedCache::new("admin_lists", CacheConfig::admin_lists(ttl)),
        }
    }

    /// Whether `user_id` counts as an admin of `chat`.
    ///
    /// Private chats, anonymous-admin accounts and whitelist-or-higher tiers
    /// pass without a lookup. Fetch failures resolve to `false`.
    pub async fn is_admin(&self, chat: &ChatRef, user_id: u64) -> bool {
        if chat.is_private() || is_anonymous_admin(user_id) || self.trust.is_whitelist_plus(user_id) {
            return true;
        }

        match self.admins(chat.id).await {
            Ok(admins) => admins.contains(&user_id),
            Err(e) => {
                warn!("Could not fetch admins of chat {}: {}", chat.id, e);
                false
            }
        }
    }

    /// Administrator ids of a chat, fetched on miss or expiry.
    ///
    /// No lock is held across the fetch: two concurrent misses may both
    /// fetch, and the later insert replaces the earlier one whole.
    pub async fn admins(&self, chat_id: i64) -> Result<Arc<HashSet<u64>>, ApiError> {
        if let Some(admins) = self.cache.get(&chat_id) {
            debug!("Admin cache hit for chat {}", chat_id);
            return Ok(admins);
        }

        debug!("Admin cache miss for chat {}", chat_id);
        let fresh: Arc<HashSet<u64>> = Arc::new(self.api.list_administrators(chat_id).await?.into_iter().collect());
        self.cache.insert(chat_id, Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Drop the cached list of a chat.
    pub fn invalidate(&self, chat_id: i64) {
        self.cache.invalidate(&chat_id);
        debug!("Admin cache invalidated for chat {}", chat_id);
    }

    /// Cached list without fetching.
    pub fn cached(&self, chat_id: i64) -> Option<Arc<HashSet<u64>>> {
        self.cache.get(&chat_id)
    }

    /// Groups with a live administrator list.
    pub fn cached_groups(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::MockApi;
    use crate::gateway::ChatKind;
    use crate::permissions::StaticTiers;

    fn group() -> ChatRef {
        ChatRef::new(-1001, ChatKind::Supergroup, Some("group"))
    }

    fn cache_with(api: Arc<MockApi>, ttl: Duration) -> AdminCache {
        let trust = Arc::new(TrustRegistry::new(StaticTiers {
            wolves: [50].into(),
            ..Default::default()
        }));
        AdminCache::new(api, trust, ttl)
    }

    #[tokio::test]
    async fn lookups_within_ttl_fetch_once() {
        let api = Arc::new(MockApi::new().with_admins(-1001, &[10, 11]));
        let cache = cache_with(api.clone(), Duration::from_secs(60));

        assert!(cache.is_admin(&group(), 10).await);
        assert!(cache.is_admin(&group(), 11).await);
        assert!(!cache.is_admin(&group(), 12).await);
        assert_eq!(api.admin_calls(), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_fetched_again_once() {
        let api = Arc::new(MockApi::new().with_admins(-1001, &[10]));
        let cache = cache_with(api.clone(), Duration::from_millis(50));

        assert!(cache.is_admin(&group(), 10).await);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.is_admin(&group(), 10).await);
        assert!(cache.is_admin(&group(), 10).await);
        assert_eq!(api.admin_calls(), 2);
    }

    #[tokio::test]
    async fn short_circuits_skip_the_platform() {
        let api = Arc::new(MockApi::new());
        let cache = cache_with(api.clone(), Duration::from_secs(60));
        let private = ChatRef::new(7, ChatKind::Private, None);

        assert!(cache.is_admin(&private, 7).await);
        assert!(cache.is_admin(&group(), 1087968824).await);
        assert!(cache.is_admin(&group(), 50).await);
        assert_eq!(api.admin_calls(), 0);
    }

    #[tokio::test]
    async fn fetch_failure_denies() {
        let api = Arc::new(MockApi::new().with_admins(-1001, &[10]));
        api.fail_admin_lookups(Some(ApiError::Transport("timeout".into())));
        let cache = cache_with(api.clone(), Duration::from_secs(60));

        assert!(!cache.is_admin(&group(), 10).await);
        assert!(cache.cached(-1001).is_none());

        api.fail_admin_lookups(None);
        assert!(cache.is_admin(&group(), 10).await);
    }

    #[tokio::test]
    async fn invalidate_forces_a_refresh() {
        let api = Arc::new(MockApi::new().with_admins(-1001, &[10]));
        let cache = cache_with(api.clone(), Duration::from_secs(60));

        assert!(!cache.is_admin(&group(), 20).await);
        api.set_admins(-1001, &[10, 20]);
        assert!(!cache.is_admin(&group(), 20).await);

        cache.invalidate(-1001);
        assert!(cache.cached(-1001).is_none());
        assert!(cache.is_admin(&group(), 20).await);
        assert_eq!(api.admin_calls(), 2);
    }
}
