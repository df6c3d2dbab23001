//! Permissions module - trust tiers and the group admin cache.

mod admin_cache;
mod tier;

pub use admin_cache::AdminCache;
pub use tier::{
    is_anonymous_admin, StaticTiers, TierChange, TierThreshold, TrustRegistry, TrustTier, ANONYMOUS_ADMINS,
    GROUP_ANONYMOUS_BOT,
};
