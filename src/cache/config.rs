//! Cache configuration.

use std::time::Duration;

/// How long a group's administrator list stays valid.
pub const ADMIN_LIST_TTL: Duration = Duration::from_secs(600);

/// Configuration for a cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Entries expire this long after insertion.
    pub ttl: Option<Duration>,

    /// Entries expire if not read within this duration.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)),
            tti: None,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with the given max capacity.
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ..Default::default()
        }
    }

    /// Set time-to-live for cache entries.
    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    /// Per-group administrator lists.
    ///
    /// Fixed TTL, no idle expiry: a busy group must still refresh every
    /// `ttl` even if it is read constantly.
    pub fn admin_lists(ttl: Duration) -> Self {
        Self {
            max_capacity: 512,
            ttl: Some(ttl),
            tti: None,
        }
    }

    /// Chat titles shown in connection replies.
    pub fn chat_titles() -> Self {
        Self {
            max_capacity: 5_000,
            ttl: Some(Duration::from_secs(1800)),
            tti: Some(Duration::from_secs(600)),
        }
    }
}
