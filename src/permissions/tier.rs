//! Trust tiers and the process-wide trust registry.
//!
//! Tiers are ordered strongest first, so `tier <= threshold` means "at
//! least as trusted as". The four custom tiers (Dragon, Demon, Wolf,
//! Tiger) are mutually exclusive: every change goes through
//! [`TrustRegistry::promote`] / [`TrustRegistry::demote`], which update all
//! sets under one write lock.

use std::collections::BTreeSet;
use std::fmt;

use parking_lot::RwLock;
use tracing::info;

use crate::database::ElevatedUsers;
use crate::gateway::{ChatRef, GatewayError};

/// Platform system accounts that stand in for anonymous group admins.
pub const ANONYMOUS_ADMINS: [u64; 3] = [1087968824, 136817688, 777000];

/// The anonymous-admin placeholder ("GroupAnonymousBot").
pub const GROUP_ANONYMOUS_BOT: u64 = 1087968824;

/// Check whether an id is a reserved anonymous-admin account.
#[inline]
pub fn is_anonymous_admin(user_id: u64) -> bool {
    ANONYMOUS_ADMINS.contains(&user_id)
}

/// A user's trust level, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrustTier {
    Owner,
    Developer,
    /// Sudo.
    Dragon,
    /// Support.
    Demon,
    /// Whitelist.
    Wolf,
    Tiger,
    GroupAdmin,
    Member,
}

impl TrustTier {
    /// Tiers that can be granted or revoked at runtime.
    pub const ASSIGNABLE: [TrustTier; 4] = [Self::Dragon, Self::Demon, Self::Wolf, Self::Tiger];

    /// Whether this tier is at least as strong as `threshold`.
    #[inline]
    pub fn at_least(self, threshold: TierThreshold) -> bool {
        self <= threshold.weakest()
    }

    pub fn is_assignable(self) -> bool {
        Self::ASSIGNABLE.contains(&self)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Owner => "Owner",
            Self::Developer => "Developer",
            Self::Dragon => "Dragon",
            Self::Demon => "Demon",
            Self::Wolf => "Wolf",
            Self::Tiger => "Tiger",
            Self::GroupAdmin => "Group admin",
            Self::Member => "Member",
        }
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Named thresholds used by tier guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierThreshold {
    /// Owner and developers.
    DevPlus,
    /// Adds Dragons.
    SudoPlus,
    /// Adds Demons.
    SupportPlus,
    /// Adds Wolves and Tigers.
    WhitelistPlus,
}

impl TierThreshold {
    /// The weakest tier that still passes.
    pub fn weakest(self) -> TrustTier {
        match self {
            Self::DevPlus => TrustTier::Developer,
            Self::SudoPlus => TrustTier::Dragon,
            Self::SupportPlus => TrustTier::Demon,
            Self::WhitelistPlus => TrustTier::Tiger,
        }
    }
}

/// Static tier membership as loaded at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticTiers {
    pub owner: Option<u64>,
    pub developers: BTreeSet<u64>,
    pub dragons: BTreeSet<u64>,
    pub demons: BTreeSet<u64>,
    pub wolves: BTreeSet<u64>,
    pub tigers: BTreeSet<u64>,
}

impl StaticTiers {
    fn set_mut(&mut self, tier: TrustTier) -> Option<&mut BTreeSet<u64>> {
        match tier {
            TrustTier::Dragon => Some(&mut self.dragons),
            TrustTier::Demon => Some(&mut self.demons),
            TrustTier::Wolf => Some(&mut self.wolves),
            TrustTier::Tiger => Some(&mut self.tigers),
            _ => None,
        }
    }

    fn set(&self, tier: TrustTier) -> Option<&BTreeSet<u64>> {
        match tier {
            TrustTier::Developer => Some(&self.developers),
            TrustTier::Dragon => Some(&self.dragons),
            TrustTier::Demon => Some(&self.demons),
            TrustTier::Wolf => Some(&self.wolves),
            TrustTier::Tiger => Some(&self.tigers),
            _ => None,
        }
    }

    /// Strongest static tier of a user, if any.
    pub fn tier_of(&self, user_id: u64) -> Option<TrustTier> {
        if self.owner == Some(user_id) {
            return Some(TrustTier::Owner);
        }
        [
            TrustTier::Developer,
            TrustTier::Dragon,
            TrustTier::Demon,
            TrustTier::Wolf,
            TrustTier::Tiger,
        ]
        .into_iter()
        .find(|tier| self.set(*tier).is_some_and(|s| s.contains(&user_id)))
    }

    /// Keep the custom tiers disjoint, strongest tier wins.
    fn normalize(&mut self) {
        let mut seen: BTreeSet<u64> = BTreeSet::new();
        for tier in TrustTier::ASSIGNABLE {
            if let Some(set) = self.set_mut(tier) {
                set.retain(|id| !seen.contains(id));
                seen.extend(set.iter().copied());
            }
        }
    }
}

/// Result of a promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierChange {
    /// Custom tier the user held before, if any.
    pub previous: Option<TrustTier>,
    pub current: TrustTier,
}

impl TierChange {
    pub fn changed(&self) -> bool {
        self.previous != Some(self.current)
    }
}

/// Process-wide trust registry shared by every gateway component.
#[derive(Debug, Default)]
pub struct TrustRegistry {
    tiers: RwLock<StaticTiers>,
}

impl TrustRegistry {
    pub fn new(mut tiers: StaticTiers) -> Self {
        tiers.normalize();
        Self {
            tiers: RwLock::new(tiers),
        }
    }

    /// Resolve the tier of a user in a chat.
    ///
    /// Private chats and anonymous-admin accounts resolve to at least
    /// `GroupAdmin`; real group admin status comes from the admin cache.
    pub fn tier_of(&self, chat: &ChatRef, user_id: u64) -> TrustTier {
        if let Some(tier) = self.static_tier(user_id) {
            return tier;
        }
        if chat.is_private() || is_anonymous_admin(user_id) {
            TrustTier::GroupAdmin
        } else {
            TrustTier::Member
        }
    }

    /// Static tier of a user, ignoring chat context.
    pub fn static_tier(&self, user_id: u64) -> Option<TrustTier> {
        self.tiers.read().tier_of(user_id)
    }

    pub fn passes(&self, user_id: u64, threshold: TierThreshold) -> bool {
        self.static_tier(user_id)
            .is_some_and(|tier| tier.at_least(threshold))
    }

    pub fn is_whitelist_plus(&self, user_id: u64) -> bool {
        self.passes(user_id, TierThreshold::WhitelistPlus)
    }

    /// Members of a tier, sorted.
    pub fn members(&self, tier: TrustTier) -> Vec<u64> {
        let tiers = self.tiers.read();
        match tier {
            TrustTier::Owner => tiers.owner.into_iter().collect(),
            other => tiers
                .set(other)
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default(),
        }
    }

    /// Move a user into a custom tier, removing them from any other one.
    pub fn promote(&self, user_id: u64, tier: TrustTier) -> Result<TierChange, GatewayError> {
        if !tier.is_assignable() {
            return Err(GatewayError::InvalidTierChange(format!(
                "{} cannot be granted at runtime",
                tier
            )));
        }

        let mut tiers = self.tiers.write();
        if matches!(tiers.tier_of(user_id), Some(TrustTier::Owner | TrustTier::Developer)) {
            return Err(GatewayError::InvalidTierChange(
                "owner and developers are configured statically".to_string(),
            ));
        }

        let previous = TrustTier::ASSIGNABLE
            .into_iter()
            .find(|t| tiers.set(*t).is_some_and(|s| s.contains(&user_id)));

        for other in TrustTier::ASSIGNABLE {
            if let Some(set) = tiers.set_mut(other) {
                set.remove(&user_id);
            }
        }
        if let Some(set) = tiers.set_mut(tier) {
            set.insert(user_id);
        }

        let change = TierChange { previous, current: tier };
        if change.changed() {
            info!("User {} moved from {:?} to {}", user_id, previous, tier);
        }
        Ok(change)
    }

    /// Remove a user from a custom tier. Returns whether they were in it.
    pub fn demote(&self, user_id: u64, tier: TrustTier) -> Result<bool, GatewayError> {
        if !tier.is_assignable() {
            return Err(GatewayError::InvalidTierChange(format!(
                "{} cannot be revoked at runtime",
                tier
            )));
        }
        let removed = self
            .tiers
            .write()
            .set_mut(tier)
            .is_some_and(|set| set.remove(&user_id));
        if removed {
            info!("User {} removed from {}", user_id, tier);
        }
        Ok(removed)
    }

    /// Custom tiers in their persisted shape.
    pub fn elevated(&self) -> ElevatedUsers {
        let tiers = self.tiers.read();
        ElevatedUsers {
            sudos: tiers.dragons.iter().map(|id| *id as i64).collect(),
            supports: tiers.demons.iter().map(|id| *id as i64).collect(),
            whitelists: tiers.wolves.iter().map(|id| *id as i64).collect(),
            tigers: tiers.tigers.iter().map(|id| *id as i64).collect(),
        }
    }

    /// Replace the custom tiers wholesale (startup hydration or rollback).
    ///
    /// Static configuration is merged in so environment ids are never lost.
    pub fn restore_elevated(&self, elevated: &ElevatedUsers, statics: &StaticTiers) {
        let mut next = statics.clone();
        let to_ids = |v: &[i64]| v.iter().map(|id| *id as u64).collect::<BTreeSet<_>>();
        next.dragons.extend(to_ids(&elevated.sudos));
        next.demons.extend(to_ids(&elevated.supports));
        next.wolves.extend(to_ids(&elevated.whitelists));
        next.tigers.extend(to_ids(&elevated.tigers));
        next.normalize();
        *self.tiers.write() = next;
    }

    /// Copy of the current membership.
    pub fn snapshot(&self) -> StaticTiers {
        self.tiers.read().clone()
    }

    /// Put back a membership taken with [`snapshot`](Self::snapshot).
    pub fn replace(&self, tiers: StaticTiers) {
        *self.tiers.write() = tiers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ChatKind;

    fn registry() -> TrustRegistry {
        TrustRegistry::new(StaticTiers {
            owner: Some(1),
            developers: [2].into(),
            dragons: [3].into(),
            demons: [4].into(),
            wolves: [5].into(),
            tigers: [6].into(),
        })
    }

    fn group() -> ChatRef {
        ChatRef::new(-100, ChatKind::Supergroup, Some("g"))
    }

    #[test]
    fn resolves_static_tiers_in_order() {
        let reg = registry();
        let chat = group();
        assert_eq!(reg.tier_of(&chat, 1), TrustTier::Owner);
        assert_eq!(reg.tier_of(&chat, 2), TrustTier::Developer);
        assert_eq!(reg.tier_of(&chat, 3), TrustTier::Dragon);
        assert_eq!(reg.tier_of(&chat, 6), TrustTier::Tiger);
        assert_eq!(reg.tier_of(&chat, 99), TrustTier::Member);
    }

    #[test]
    fn private_chats_and_anonymous_admins_are_group_admin() {
        let reg = registry();
        let private = ChatRef::new(99, ChatKind::Private, None);
        assert_eq!(reg.tier_of(&private, 99), TrustTier::GroupAdmin);
        assert_eq!(reg.tier_of(&group(), GROUP_ANONYMOUS_BOT), TrustTier::GroupAdmin);
    }

    #[test]
    fn thresholds_compose() {
        let reg = registry();
        assert!(reg.passes(1, TierThreshold::DevPlus));
        assert!(reg.passes(2, TierThreshold::DevPlus));
        assert!(!reg.passes(3, TierThreshold::DevPlus));
        assert!(reg.passes(3, TierThreshold::SudoPlus));
        assert!(!reg.passes(4, TierThreshold::SudoPlus));
        assert!(reg.passes(4, TierThreshold::SupportPlus));
        assert!(!reg.passes(5, TierThreshold::SupportPlus));
        assert!(reg.passes(5, TierThreshold::WhitelistPlus));
        assert!(reg.passes(6, TierThreshold::WhitelistPlus));
        assert!(!reg.passes(99, TierThreshold::WhitelistPlus));
    }

    #[test]
    fn promoting_a_wolf_to_dragon_leaves_only_dragon() {
        let reg = registry();
        let change = reg.promote(5, TrustTier::Dragon).unwrap();
        assert_eq!(change.previous, Some(TrustTier::Wolf));
        assert!(change.changed());
        assert!(reg.members(TrustTier::Dragon).contains(&5));
        assert!(!reg.members(TrustTier::Wolf).contains(&5));
        assert_eq!(reg.static_tier(5), Some(TrustTier::Dragon));
    }

    #[test]
    fn promoting_into_same_tier_is_a_no_op() {
        let reg = registry();
        let change = reg.promote(3, TrustTier::Dragon).unwrap();
        assert!(!change.changed());
    }

    #[test]
    fn static_roles_cannot_be_changed() {
        let reg = registry();
        assert!(reg.promote(9, TrustTier::Developer).is_err());
        assert!(reg.promote(1, TrustTier::Tiger).is_err());
        assert!(reg.demote(9, TrustTier::GroupAdmin).is_err());
    }

    #[test]
    fn demote_reports_membership() {
        let reg = registry();
        assert!(reg.demote(4, TrustTier::Demon).unwrap());
        assert!(!reg.demote(4, TrustTier::Demon).unwrap());
        assert_eq!(reg.static_tier(4), None);
    }

    #[test]
    fn restore_keeps_tiers_disjoint() {
        let reg = registry();
        let elevated = ElevatedUsers {
            sudos: vec![10],
            supports: vec![10, 11],
            whitelists: vec![],
            tigers: vec![11],
        };
        reg.restore_elevated(&elevated, &reg.snapshot());
        assert_eq!(reg.static_tier(10), Some(TrustTier::Dragon));
        assert!(!reg.members(TrustTier::Demon).contains(&10));
        assert_eq!(reg.static_tier(11), Some(TrustTier::Demon));
        assert!(!reg.members(TrustTier::Tiger).contains(&11));
    }
}
