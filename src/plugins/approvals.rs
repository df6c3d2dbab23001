//! Approved users: exempt from flood control in one chat.

use std::sync::Arc;

use async_trait::async_trait;

use super::target_user;
use crate::gateway::{handler, CommandContext, DispatchEntry, FeatureModule, Gateway};
use crate::utils::{html_escape, mention_html};

pub struct Approvals;

#[async_trait]
impl FeatureModule for Approvals {
    fn name(&self) -> &'static str {
        "approvals"
    }

    fn help(&self) -> Option<&'static str> {
        Some(
            "Approved users are ignored by antiflood.\n\
             - /approval: check whether you are approved here\n\
             Admins only:\n\
             - /approve <reply|id>: approve a user\n\
             - /unapprove <reply|id>: unapprove a user\n\
             - /approved: list approved users",
        )
    }

    fn entries(&self) -> Vec<DispatchEntry> {
        vec![
            DispatchEntry::new(&["approve"], handler(approve))
                .connection_aware(true)
                .group_only()
                .admin_only(),
            DispatchEntry::new(&["unapprove"], handler(unapprove))
                .connection_aware(true)
                .group_only()
                .admin_only(),
            DispatchEntry::new(&["approved"], handler(approved))
                .connection_aware(true)
                .group_only()
                .admin_only(),
            DispatchEntry::new(&["approval"], handler(approval))
                .disableable()
                .group_only(),
        ]
    }
}

async fn approve(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let Some(user_id) = target_user(&ctx) else {
        gw.reply(&ctx, "Reply to a user or give me their id.").await?;
        return Ok(());
    };
    if gw.is_admin(&ctx.chat, user_id).await {
        gw.reply(&ctx, "User is already admin - admins are exempt from antiflood anyway.")
            .await?;
        return Ok(());
    }
    let text = if gw.flood().approve(ctx.chat.id, user_id).await? {
        format!(
            "User {} has been approved in {}! They will now be ignored by antiflood.",
            user_id,
            html_escape(&ctx.chat.display_name())
        )
    } else {
        format!("User {} is already approved.", user_id)
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn unapprove(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let Some(user_id) = target_user(&ctx) else {
        gw.reply(&ctx, "Reply to a user or give me their id.").await?;
        return Ok(());
    };
    let text = if gw.flood().unapprove(ctx.chat.id, user_id).await? {
        format!("User {} is no longer approved in {}.", user_id, html_escape(&ctx.chat.display_name()))
    } else {
        format!("User {} isn't approved yet!", user_id)
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn approved(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let users = gw.flood().approved(ctx.chat.id);
    let text = if users.is_empty() {
        format!("No users are approved in {}.", html_escape(&ctx.chat.display_name()))
    } else {
        let lines: Vec<String> = users.iter().map(|id| format!(" - <code>{}</code>", id)).collect();
        format!("Approved users:\n{}", lines.join("\n"))
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn approval(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let (user_id, name) = match &ctx.reply_to {
        Some(user) => (user.id, user.first_name.clone()),
        None => (ctx.user.id, ctx.user.first_name.clone()),
    };
    let mention = mention_html(user_id, &name);
    let text = if gw.flood().is_approved(ctx.chat.id, user_id) {
        format!("{} is an approved user. Antiflood won't apply to them.", mention)
    } else {
        format!("{} is not an approved user. They are affected by antiflood.", mention)
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}
