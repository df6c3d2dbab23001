//! Global command abuse detector.
//!
//! Three bounded timestamp queues per key (6 in 15s, 20 in 60s, 100 in an
//! hour). A key is blocked while any queue is full and its oldest entry is
//! still inside that queue's horizon.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::permissions::{TrustRegistry, GROUP_ANONYMOUS_BOT};

/// (capacity, horizon) of each window.
pub const ABUSE_WINDOWS: [(usize, Duration); 3] = [
    (6, Duration::from_secs(15)),
    (20, Duration::from_secs(60)),
    (100, Duration::from_secs(3600)),
];

/// Who a command is accounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbuseKey {
    User(u64),
    /// Anonymous admins all share one id, so their chat is tracked instead.
    Chat(i64),
}

impl AbuseKey {
    pub fn for_sender(chat_id: i64, user_id: u64) -> Self {
        if user_id == GROUP_ANONYMOUS_BOT {
            Self::Chat(chat_id)
        } else {
            Self::User(user_id)
        }
    }
}

#[derive(Debug, Clone, Default)]
struct AbuseWindow {
    queues: [VecDeque<Instant>; 3],
}

impl AbuseWindow {
    /// Record one event and report whether any window tripped.
    fn record(&mut self, now: Instant) -> bool {
        let mut tripped = false;
        for (queue, (capacity, horizon)) in self.queues.iter_mut().zip(ABUSE_WINDOWS) {
            queue.push_back(now);
            while queue.len() > capacity {
                queue.pop_front();
            }
            if queue.len() == capacity
                && let Some(oldest) = queue.front()
                && now.saturating_duration_since(*oldest) < horizon
            {
                tripped = true;
            }
        }
        tripped
    }

    fn last_seen(&self) -> Option<Instant> {
        self.queues[0].back().copied()
    }
}

/// Sliding-window burst detector shared by every chat.
#[derive(Debug, Default)]
pub struct GlobalAbuseGuard {
    windows: DashMap<AbuseKey, AbuseWindow>,
}

impl GlobalAbuseGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a command from this sender should be dropped.
    ///
    /// Whitelist-or-higher tiers are never blocked and never recorded.
    pub fn check(&self, trust: &TrustRegistry, chat_id: i64, user_id: u64) -> bool {
        if trust.is_whitelist_plus(user_id) {
            return false;
        }
        let key = AbuseKey::for_sender(chat_id, user_id);
        let blocked = self.check_at(key, Instant::now());
        if blocked {
            debug!("Dropping command from {:?}: rate exceeded", key);
        }
        blocked
    }

    /// Record an event for `key` at `now`.
    pub fn check_at(&self, key: AbuseKey, now: Instant) -> bool {
        self.windows.entry(key).or_default().record(now)
    }

    /// Forget keys idle for longer than the widest horizon.
    pub fn prune(&self, now: Instant) -> usize {
        let horizon = ABUSE_WINDOWS[ABUSE_WINDOWS.len() - 1].1;
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            window
                .last_seen()
                .is_some_and(|seen| now.saturating_duration_since(seen) < horizon)
        });
        before - self.windows.len()
    }

    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::StaticTiers;

    fn trust() -> TrustRegistry {
        TrustRegistry::new(StaticTiers {
            owner: Some(1),
            developers: [2].into(),
            tigers: [3].into(),
            ..Default::default()
        })
    }

    #[test]
    fn sixth_command_within_fifteen_seconds_is_blocked() {
        let guard = GlobalAbuseGuard::new();
        let key = AbuseKey::User(42);
        let start = Instant::now();

        for i in 0..5 {
            assert!(!guard.check_at(key, start + Duration::from_secs(i)));
        }
        assert!(guard.check_at(key, start + Duration::from_secs(5)));
    }

    #[test]
    fn same_six_spread_over_the_horizon_pass() {
        let guard = GlobalAbuseGuard::new();
        let key = AbuseKey::User(42);
        let start = Instant::now();

        for i in 0..6 {
            assert!(!guard.check_at(key, start + Duration::from_secs(i * 4)));
        }
    }

    #[test]
    fn minute_window_catches_sustained_bursts() {
        let guard = GlobalAbuseGuard::new();
        let key = AbuseKey::User(7);
        let start = Instant::now();

        // One command every 3s never trips the 15s window but fills 20 in 60s.
        let results: Vec<bool> = (0..20)
            .map(|i| guard.check_at(key, start + Duration::from_millis(i * 3_000)))
            .collect();
        assert!(results[..19].iter().all(|blocked| !blocked));
        assert!(results[19]);
    }

    #[test]
    fn whitelisted_tiers_are_never_blocked() {
        let guard = GlobalAbuseGuard::new();
        let trust = trust();
        for user in [1, 2, 3] {
            for _ in 0..200 {
                assert!(!guard.check(&trust, -1, user));
            }
        }
        assert_eq!(guard.tracked(), 0);
    }

    #[test]
    fn anonymous_admins_are_keyed_by_chat() {
        assert_eq!(AbuseKey::for_sender(-5, GROUP_ANONYMOUS_BOT), AbuseKey::Chat(-5));
        assert_eq!(AbuseKey::for_sender(-5, 9), AbuseKey::User(9));

        let guard = GlobalAbuseGuard::new();
        let trust = trust();
        for _ in 0..5 {
            assert!(!guard.check(&trust, -5, GROUP_ANONYMOUS_BOT));
        }
        // Another chat has its own budget.
        assert!(!guard.check(&trust, -6, GROUP_ANONYMOUS_BOT));
        assert!(guard.check(&trust, -5, GROUP_ANONYMOUS_BOT));
    }

    #[test]
    fn prune_drops_idle_keys() {
        let guard = GlobalAbuseGuard::new();
        let start = Instant::now();
        guard.check_at(AbuseKey::User(1), start);
        guard.check_at(AbuseKey::User(2), start + Duration::from_secs(3000));

        assert_eq!(guard.prune(start + Duration::from_secs(3700)), 1);
        assert_eq!(guard.tracked(), 1);
    }
}
