//! Configuration module.
//!
//! Loads configuration from environment variables (and `.env`).

use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::cache::ADMIN_LIST_TTL;
use crate::gateway::GatewaySettings;
use crate::permissions::StaticTiers;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} contains an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Bot running mode
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,

    /// Bot username (without @). Fetched via getMe when unset.
    pub bot_username: Option<String>,

    /// Static trust tiers loaded at startup.
    pub tiers: StaticTiers,

    /// Delete refused commands that carry no arguments instead of replying.
    pub del_cmds: bool,
    /// Accept `!` as a command prefix.
    pub allow_excl: bool,
    pub support_chat: Option<String>,
    pub admin_cache_ttl: Duration,
    pub flood_exempt_interrupts: bool,
    /// Modules not loaded at startup.
    pub no_load: Vec<String>,

    // MongoDB (optional, in-memory store when absent)
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let bot_mode = match env::var("BOT_MODE")
            .unwrap_or_else(|_| "polling".to_string())
            .to_lowercase()
            .as_str()
        {
            "webhook" => BotMode::Webhook,
            _ => BotMode::Polling,
        };

        let webhook_url = non_empty("WEBHOOK_URL");
        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            return Err(ConfigError::Missing("WEBHOOK_URL"));
        }

        let bot_token = non_empty("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let owner_id = match non_empty("OWNER_ID") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "OWNER_ID",
                value: raw,
            })?),
            None => None,
        };

        let tiers = StaticTiers {
            owner: owner_id,
            developers: id_list("DEV_USERS")?,
            dragons: id_list("DRAGONS")?,
            demons: id_list("DEMONS")?,
            wolves: id_list("WOLVES")?,
            tigers: id_list("TIGERS")?,
        };

        let admin_cache_ttl = match non_empty("ADMIN_CACHE_TTL_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| ConfigError::Invalid {
                name: "ADMIN_CACHE_TTL_SECS",
                value: raw,
            })?),
            None => ADMIN_LIST_TTL,
        };

        let webhook_port = match non_empty("WEBHOOK_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "WEBHOOK_PORT",
                value: raw,
            })?,
            None => 8443,
        };

        Ok(Self {
            bot_token,
            bot_mode,
            webhook_url,
            webhook_port,
            webhook_secret: non_empty("WEBHOOK_SECRET"),
            bot_username: non_empty("BOT_USERNAME").map(|s| s.trim_start_matches('@').to_string()),
            tiers,
            del_cmds: flag("DEL_CMDS", false),
            allow_excl: flag("ALLOW_EXCL", false),
            support_chat: non_empty("SUPPORT_CHAT").map(|s| s.trim_start_matches('@').to_string()),
            admin_cache_ttl,
            flood_exempt_interrupts: flag("FLOOD_EXEMPT_INTERRUPTS", true),
            no_load: env::var("NO_LOAD")
                .unwrap_or_default()
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase)
                .collect(),
            mongodb_uri: non_empty("MONGODB_URI"),
            mongodb_database: non_empty("MONGODB_DATABASE").unwrap_or_else(|| "warden".to_string()),
        })
    }

    /// The subset of configuration the gateway consumes.
    pub fn gateway_settings(&self, bot_username: &str) -> GatewaySettings {
        GatewaySettings {
            bot_username: bot_username.to_string(),
            del_cmds: self.del_cmds,
            allow_excl: self.allow_excl,
            support_chat: self.support_chat.clone(),
            admin_cache_ttl: self.admin_cache_ttl,
            flood_exempt_interrupts: self.flood_exempt_interrupts,
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn flag(name: &str, default: bool) -> bool {
    match non_empty(name) {
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

/// Parse a comma or whitespace separated list of user ids.
fn id_list(name: &'static str) -> Result<BTreeSet<u64>, ConfigError> {
    parse_id_list(&env::var(name).unwrap_or_default()).map_err(|value| ConfigError::Invalid { name, value })
}

fn parse_id_list(raw: &str) -> Result<BTreeSet<u64>, String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u64>().map_err(|_| s.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lists_accept_commas_and_spaces() {
        let ids = parse_id_list("1, 2 3,,4").unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn id_lists_reject_garbage() {
        assert_eq!(parse_id_list("1 abc"), Err("abc".to_string()));
        assert!(parse_id_list("").unwrap().is_empty());
    }
}
