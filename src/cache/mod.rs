//! Cache module - typed TTL caches built on Moka.
//!
//! The gateway keeps short-lived copies of platform data here (group
//! administrator lists, chat titles). Durable state lives in the store and
//! is mirrored by the owning component instead.

mod config;
mod typed;

pub use config::{CacheConfig, ADMIN_LIST_TTL};
pub use typed::TypedCache;
