//! Utility functions.
//!
//! Collection of helpers used across the gateway and its plugins.

pub mod command;
pub mod parser;

pub use command::{normalize_command, parse_command, ParsedCommand};
pub use parser::{format_duration, html_escape, parse_duration, parse_toggle};

/// HTML mention link for a user.
pub fn mention_html(user_id: u64, name: &str) -> String {
    format!("<a href=\"tg://user?id={}\">{}</a>", user_id, html_escape(name))
}
