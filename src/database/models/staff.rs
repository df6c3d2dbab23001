//! Runtime trust tiers and the user blacklist.

use serde::{Deserialize, Serialize};

/// Users promoted into custom tiers at runtime.
///
/// Stored as a single document; every promotion rewrites it whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElevatedUsers {
    #[serde(default)]
    pub sudos: Vec<i64>,
    #[serde(default)]
    pub supports: Vec<i64>,
    #[serde(default)]
    pub whitelists: Vec<i64>,
    #[serde(default)]
    pub tigers: Vec<i64>,
}

/// A globally ignored user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlacklistedUser {
    pub user_id: i64,
    #[serde(default)]
    pub reason: Option<String>,
}
