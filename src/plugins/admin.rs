//! Admin cache refresh and the settings overview.

use std::sync::Arc;

use async_trait::async_trait;

use crate::gateway::{handler, CommandContext, DispatchEntry, FeatureModule, Gateway};
use crate::utils::html_escape;

pub struct Admin;

#[async_trait]
impl FeatureModule for Admin {
    fn name(&self) -> &'static str {
        "admin"
    }

    fn help(&self) -> Option<&'static str> {
        Some(
            "- /admincache: refresh the list of admins of this chat\n\
             - /settings: settings of this (or the connected) chat; your own settings in PM",
        )
    }

    fn entries(&self) -> Vec<DispatchEntry> {
        vec![
            DispatchEntry::new(&["admincache"], handler(admin_cache))
                .group_only()
                .admin_only(),
            DispatchEntry::new(&["settings"], handler(settings)).connection_aware(true),
        ]
    }
}

async fn admin_cache(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    gw.admins().invalidate(ctx.chat.id);
    gw.reply(&ctx, "Admin cache refreshed!").await?;
    Ok(())
}

async fn settings(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let (title, sections) = if ctx.chat.is_group() {
        if !gw.is_admin(&ctx.chat, ctx.user.id).await {
            gw.reply(&ctx, "You need to be an admin of this chat to do this.").await?;
            return Ok(());
        }
        (
            format!("Settings of <b>{}</b>", html_escape(&ctx.chat.display_name())),
            gw.chat_settings(ctx.chat.id, ctx.user.id).await,
        )
    } else {
        ("Your settings".to_string(), gw.user_settings(ctx.user.id).await)
    };

    let mut text = title;
    if sections.is_empty() {
        text.push_str("\nNothing to show.");
    }
    for (module, section) in sections {
        text.push_str(&format!("\n\n<b>{}</b>\n{}", html_escape(&module), section));
    }
    gw.reply(&ctx, &text).await?;
    Ok(())
}
