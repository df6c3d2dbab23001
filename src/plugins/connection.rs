//! Remote connections: manage a group's settings from a private chat.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::gateway::{handler, CommandContext, DispatchEntry, FeatureModule, Gateway, GatewayError, HookKind};
use crate::utils::{html_escape, parse_toggle};

const HELP: &str = "Sometimes you just want to tweak a chat's settings without spamming it.\n\
    Connections let you manage a group from this private chat.\n\
    - /connect <chat id>: connect to a chat (or use /connect in the group)\n\
    - /connect: show your recently connected chats\n\
    - /connect clear: forget your connection history\n\
    - /connection: show the connected chat\n\
    - /disconnect: disconnect from the chat\n\
    - /allowconnect <yes/no>: allow non-admin members to connect (admins only)";

pub struct Connections;

#[async_trait]
impl FeatureModule for Connections {
    fn name(&self) -> &'static str {
        "connection"
    }

    fn help(&self) -> Option<&'static str> {
        Some(HELP)
    }

    fn entries(&self) -> Vec<DispatchEntry> {
        vec![
            DispatchEntry::new(&["connect"], handler(connect)),
            DispatchEntry::new(&["disconnect"], handler(disconnect)),
            DispatchEntry::new(&["connection"], handler(connection)),
            DispatchEntry::new(&["allowconnect"], handler(allow_connect))
                .connection_aware(true)
                .group_only()
                .admin_only(),
            DispatchEntry::new(&["helpconnect"], handler(help_connect)),
        ]
    }

    fn hooks(&self) -> &'static [HookKind] {
        &[HookKind::Migrate, HookKind::UserSettings]
    }

    async fn migrate(&self, gw: &Gateway, old_chat_id: i64, new_chat_id: i64) -> anyhow::Result<()> {
        gw.connections().migrate(old_chat_id, new_chat_id).await?;
        Ok(())
    }

    async fn user_settings(&self, gw: &Gateway, user_id: u64) -> Option<String> {
        let chat_id = gw.connections().active(user_id)?;
        let title = gw
            .connections()
            .chat_title(chat_id)
            .await
            .unwrap_or_else(|| chat_id.to_string());
        Some(format!("You are currently connected to <b>{}</b>.", html_escape(&title)))
    }
}

async fn connect(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    if ctx.origin.is_group() {
        return connect_to(&gw, &ctx, ctx.origin.id).await;
    }

    match ctx.arg(0) {
        Some("clear") => {
            gw.connections().clear_history(ctx.user.id).await?;
            gw.reply(&ctx, "Connection history cleared.").await?;
            Ok(())
        }
        Some(raw) => match raw.parse::<i64>() {
            Ok(chat_id) => connect_to(&gw, &ctx, chat_id).await,
            Err(_) => {
                gw.reply(&ctx, "Invalid chat ID provided!").await?;
                Ok(())
            }
        },
        None => show_history(&gw, &ctx).await,
    }
}

async fn connect_to(gw: &Gateway, ctx: &CommandContext, chat_id: i64) -> anyhow::Result<()> {
    let text = match gw.connections().connect(gw, ctx.user.id, chat_id).await {
        Ok(chat) => format!("Successfully connected to <b>{}</b>.", html_escape(&chat.display_name())),
        Err(GatewayError::ConnectionDenied(_)) => "Connection to this chat is not allowed!".to_string(),
        Err(GatewayError::Api(e)) => {
            debug!("Connect to {} failed: {}", chat_id, e);
            "Invalid chat ID provided!".to_string()
        }
        Err(e) => return Err(e.into()),
    };
    gw.reply(ctx, &text).await?;
    Ok(())
}

async fn show_history(gw: &Gateway, ctx: &CommandContext) -> anyhow::Result<()> {
    let history = gw.connections().history(ctx.user.id).await?;
    let mut text = match gw.connections().active(ctx.user.id) {
        Some(chat_id) => {
            let title = gw
                .connections()
                .chat_title(chat_id)
                .await
                .unwrap_or_else(|| chat_id.to_string());
            format!("You are currently connected to <b>{}</b>.\n", html_escape(&title))
        }
        None => "Write the chat ID to connect!\n".to_string(),
    };
    if history.is_empty() {
        text.push_str("No recently connected chats.");
    } else {
        text.push_str("Recently connected:");
        for entry in history.iter() {
            text.push_str(&format!(
                "\n - <b>{}</b> (<code>{}</code>) {}",
                html_escape(&entry.chat_name),
                entry.chat_id,
                entry.connected_at.format("%Y-%m-%d %H:%M")
            ));
        }
    }
    gw.reply(ctx, &text).await?;
    Ok(())
}

async fn disconnect(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    if !ctx.origin.is_private() {
        gw.reply(&ctx, "This command is only available in PM.").await?;
        return Ok(());
    }
    let text = if gw.connections().disconnect(ctx.user.id).await? {
        "Disconnected from chat!"
    } else {
        "You're not connected!"
    };
    gw.reply(&ctx, text).await?;
    Ok(())
}

async fn connection(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let text = match gw.connections().active(ctx.user.id) {
        Some(chat_id) => {
            let title = gw
                .connections()
                .chat_title(chat_id)
                .await
                .unwrap_or_else(|| chat_id.to_string());
            format!("You are currently connected to <b>{}</b>.", html_escape(&title))
        }
        None => "You are not connected in any group!".to_string(),
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn allow_connect(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let chat = html_escape(&ctx.chat.display_name());
    let Some(raw) = ctx.arg(0) else {
        let text = if gw.connections().allows_members(ctx.chat.id) {
            format!("Connections to <b>{}</b> are allowed for members!", chat)
        } else {
            format!("Connections to <b>{}</b> are limited to admins.", chat)
        };
        gw.reply(&ctx, &text).await?;
        return Ok(());
    };

    let text = match parse_toggle(raw) {
        Some(true) => {
            gw.connections().set_allow_members(ctx.chat.id, true).await?;
            format!("Enabled member connections to <b>{}</b>.", chat)
        }
        Some(false) => {
            gw.connections().set_allow_members(ctx.chat.id, false).await?;
            format!("Connections to <b>{}</b> are now limited to admins.", chat)
        }
        None => "Please enter <code>yes</code> or <code>no</code>!".to_string(),
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn help_connect(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    if !ctx.origin.is_private() {
        gw.reply(&ctx, "PM me with that command to get help.").await?;
        return Ok(());
    }
    gw.reply(&ctx, HELP).await?;
    Ok(())
}
