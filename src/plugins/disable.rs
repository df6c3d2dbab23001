//! Per-chat command disabling.

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};

use crate::gateway::{
    handler, normalize_module, CommandContext, DispatchEntry, FeatureModule, Gateway, GatewayError, HookKind,
};
use crate::utils::{html_escape, normalize_command};

pub struct Disable;

#[async_trait]
impl FeatureModule for Disable {
    fn name(&self) -> &'static str {
        "disable"
    }

    fn help(&self) -> Option<&'static str> {
        Some(
            "Not everyone wants every feature. Some commands are best left unused to avoid spam.\n\
             - /cmds: list disabled commands in this chat\n\
             - /listcmds: list every command that can be disabled\n\
             Admins only:\n\
             - /disable <cmd>: stop users from using a command\n\
             - /enable <cmd>: allow a command again\n\
             - /disablemodule <module>: disable every disableable command of a module\n\
             - /enablemodule <module>: enable every disableable command of a module",
        )
    }

    fn entries(&self) -> Vec<DispatchEntry> {
        vec![
            DispatchEntry::new(&["disable"], handler(disable))
                .connection_aware(true)
                .group_only()
                .admin_only(),
            DispatchEntry::new(&["enable"], handler(enable))
                .connection_aware(true)
                .group_only()
                .admin_only(),
            DispatchEntry::new(&["disablemodule"], handler(disable_module))
                .connection_aware(true)
                .group_only()
                .admin_only(),
            DispatchEntry::new(&["enablemodule"], handler(enable_module))
                .connection_aware(true)
                .group_only()
                .admin_only(),
            DispatchEntry::new(&["cmds", "disabled"], handler(list_disabled))
                .connection_aware(false)
                .group_only(),
            DispatchEntry::new(&["listcmds"], handler(list_disableable)),
        ]
    }

    fn hooks(&self) -> &'static [HookKind] {
        &[
            HookKind::Migrate,
            HookKind::Stats,
            HookKind::ChatSettings,
            HookKind::Export,
            HookKind::Import,
        ]
    }

    async fn migrate(&self, gw: &Gateway, old_chat_id: i64, new_chat_id: i64) -> anyhow::Result<()> {
        gw.commands().migrate(old_chat_id, new_chat_id).await?;
        Ok(())
    }

    async fn stats(&self, gw: &Gateway) -> Option<String> {
        let (items, chats) = gw.commands().stats();
        Some(format!("• {} disabled items, across {} chats.", items, chats))
    }

    async fn chat_settings(&self, gw: &Gateway, chat_id: i64, _user_id: u64) -> Option<String> {
        Some(disabled_text(gw, chat_id))
    }

    async fn export(&self, gw: &Gateway, chat_id: i64) -> Option<Document> {
        let disabled = gw.commands().disabled_in(chat_id);
        if disabled.is_empty() {
            return None;
        }
        Some(doc! { "disabled": disabled })
    }

    async fn import(&self, gw: &Gateway, chat_id: i64, data: &Document) -> anyhow::Result<()> {
        let Ok(commands) = data.get_array("disabled") else {
            return Ok(());
        };
        for command in commands.iter().filter_map(Bson::as_str) {
            match gw.commands().disable(chat_id, command).await {
                Ok(_) | Err(GatewayError::NotDisableable(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn disabled_text(gw: &Gateway, chat_id: i64) -> String {
    let disabled = gw.commands().disabled_in(chat_id);
    if disabled.is_empty() {
        return "No commands are disabled!".to_string();
    }
    let lines: Vec<String> = disabled
        .iter()
        .map(|c| format!(" - <code>{}</code>", html_escape(c)))
        .collect();
    format!("The following commands are currently restricted:\n{}", lines.join("\n"))
}

async fn disable(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let Some(raw) = ctx.arg(0) else {
        gw.reply(&ctx, "What should I disable?").await?;
        return Ok(());
    };
    let command = normalize_command(raw);
    let text = match gw.commands().disable(ctx.chat.id, &command).await {
        Ok(true) => format!(
            "Disabled the use of <code>{}</code> in <b>{}</b>",
            html_escape(&command),
            html_escape(&ctx.chat.display_name())
        ),
        Ok(false) => format!("<code>{}</code> is already disabled.", html_escape(&command)),
        Err(GatewayError::NotDisableable(_)) => "That command can't be disabled".to_string(),
        Err(e) => return Err(e.into()),
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn enable(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let Some(raw) = ctx.arg(0) else {
        gw.reply(&ctx, "What should I enable?").await?;
        return Ok(());
    };
    let command = normalize_command(raw);
    let text = match gw.commands().enable(ctx.chat.id, &command).await {
        Ok(true) => format!(
            "Enabled the use of <code>{}</code> in <b>{}</b>",
            html_escape(&command),
            html_escape(&ctx.chat.display_name())
        ),
        Ok(false) => "Is that even disabled?".to_string(),
        Err(GatewayError::NotDisableable(_)) => "That command can't be disabled".to_string(),
        Err(e) => return Err(e.into()),
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}

/// Disableable commands routed by a loaded module.
fn module_commands(gw: &Gateway, raw: &str) -> Option<Vec<String>> {
    let name = normalize_module(raw);
    if !gw.modules().is_loaded(&name) {
        return None;
    }
    Some(
        gw.modules()
            .commands_of(&name)
            .into_iter()
            .filter(|c| gw.commands().is_disableable(c))
            .collect(),
    )
}

async fn disable_module(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    bulk(gw, ctx, true).await
}

async fn enable_module(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    bulk(gw, ctx, false).await
}

async fn bulk(gw: Arc<Gateway>, ctx: CommandContext, disable: bool) -> anyhow::Result<()> {
    let Some(raw) = ctx.arg(0) else {
        gw.reply(&ctx, "Which module?").await?;
        return Ok(());
    };
    let Some(commands) = module_commands(&gw, raw) else {
        gw.reply(&ctx, "Is that even a loaded module?").await?;
        return Ok(());
    };
    if commands.is_empty() {
        gw.reply(&ctx, "That module has no disableable commands.").await?;
        return Ok(());
    }

    let results = if disable {
        gw.commands().disable_many(ctx.chat.id, &commands).await
    } else {
        gw.commands().enable_many(ctx.chat.id, &commands).await
    };

    let verb = if disable { "Disabled" } else { "Enabled" };
    let mut changed = Vec::new();
    let mut failed = Vec::new();
    for item in results {
        match item.result {
            Ok(true) => changed.push(item.command),
            Ok(false) => {}
            Err(e) => failed.push(format!("{} ({})", item.command, e)),
        }
    }

    let mut text = if changed.is_empty() {
        "Nothing to change.".to_string()
    } else {
        format!(
            "{} <code>{}</code> in <b>{}</b>",
            verb,
            html_escape(&changed.join(", ")),
            html_escape(&ctx.chat.display_name())
        )
    };
    if !failed.is_empty() {
        text.push_str(&format!("\nFailed: {}", html_escape(&failed.join(", "))));
    }
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn list_disabled(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    gw.reply(&ctx, &disabled_text(&gw, ctx.chat.id)).await?;
    Ok(())
}

async fn list_disableable(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let commands = gw.commands().disableable();
    if commands.is_empty() {
        gw.reply(&ctx, "No commands can be disabled.").await?;
        return Ok(());
    }
    let lines: Vec<String> = commands
        .iter()
        .map(|c| format!(" - <code>{}</code>", html_escape(c)))
        .collect();
    gw.reply(&ctx, &format!("The following commands are toggleable:\n{}", lines.join("\n")))
        .await?;
    Ok(())
}
