//! Warden - command gateway for a Telegram group moderation bot.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - Persistent store (MongoDB or in-memory)
//! - `cache` - TTL caches with Moka
//! - `permissions` - Trust tiers and the admin cache
//! - `gateway` - Command dispatch: guards, rate limits, connections, modules
//! - `plugins` - Feature modules registered through the gateway
//! - `events` - Non-command message handlers
//! - `bot` - Telegram transport (with Throttle for API rate limiting)
//! - `utils` - Utility functions

pub mod bot;
pub mod cache;
pub mod config;
pub mod database;
pub mod events;
pub mod gateway;
pub mod permissions;
pub mod plugins;
pub mod utils;
