//! Disabled command rows.

use serde::{Deserialize, Serialize};

/// A command disabled in one chat. Existence of the row means disabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DisabledCommand {
    pub chat_id: i64,
    pub command: String,
}

impl DisabledCommand {
    pub fn new(chat_id: i64, command: impl Into<String>) -> Self {
        Self {
            chat_id,
            command: command.into(),
        }
    }
}
