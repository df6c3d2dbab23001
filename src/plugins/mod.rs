//! Feature modules served through the gateway.
//!
//! Add a module by:
//! 1. Creating a new file in this directory implementing [`FeatureModule`]
//! 2. Adding `pub mod your_module;` below
//! 3. Adding it to [`catalog`]

pub mod admin;
pub mod antiflood;
pub mod approvals;
pub mod connection;
pub mod disable;
pub mod disasters;
pub mod modules;

use std::sync::Arc;

use crate::gateway::{CommandContext, FeatureModule};

/// Every module the bot knows about, loaded or not.
pub fn catalog() -> Vec<Arc<dyn FeatureModule>> {
    vec![
        Arc::new(modules::Modules),
        Arc::new(admin::Admin),
        Arc::new(disable::Disable),
        Arc::new(antiflood::Antiflood),
        Arc::new(approvals::Approvals),
        Arc::new(connection::Connections),
        Arc::new(disasters::Disasters),
    ]
}

/// User a command is aimed at: the replied-to author, else a numeric first argument.
pub(crate) fn target_user(ctx: &CommandContext) -> Option<u64> {
    if let Some(user) = &ctx.reply_to {
        return Some(user.id);
    }
    ctx.arg(0).and_then(|a| a.parse().ok())
}

/// Everything after the target: all args when replying, the rest otherwise.
pub(crate) fn trailing_text(ctx: &CommandContext) -> Option<String> {
    let skip = if ctx.reply_to.is_some() { 0 } else { 1 };
    let text = ctx.args.iter().skip(skip).cloned().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ChatRef, UserRef};

    fn ctx(args: &[&str]) -> CommandContext {
        CommandContext::new(
            ChatRef::group(-100, None),
            UserRef::new(1, "a"),
            "ignore",
            args.iter().map(|a| a.to_string()).collect(),
        )
    }

    #[test]
    fn target_prefers_the_replied_user() {
        let c = ctx(&["42", "spam"]).with_reply_to(UserRef::new(7, "b"));
        assert_eq!(target_user(&c), Some(7));
        assert_eq!(trailing_text(&c).as_deref(), Some("42 spam"));

        let c = ctx(&["42", "spam", "bot"]);
        assert_eq!(target_user(&c), Some(42));
        assert_eq!(trailing_text(&c).as_deref(), Some("spam bot"));

        assert_eq!(target_user(&ctx(&["someone"])), None);
        assert_eq!(trailing_text(&ctx(&["42"])), None);
    }

    #[test]
    fn catalog_names_are_unique() {
        let mut names: Vec<&str> = catalog().iter().map(|m| m.name()).collect();
        names.sort_unstable();
        let len = names.len();
        names.dedup();
        assert_eq!(names.len(), len);
    }
}
