//! Antiflood command handlers.
//!
//! Commands for configuring consecutive-message flood control in groups.

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{self, Document};

use crate::database::{FloodPenalty, FloodSettings};
use crate::gateway::rate::describe_penalty;
use crate::gateway::{handler, CommandContext, DispatchEntry, FeatureModule, Gateway, HookKind};
use crate::utils::{html_escape, parse_duration};

/// Smallest accepted non-zero limit.
const MIN_LIMIT: u32 = 4;

pub struct Antiflood;

#[async_trait]
impl FeatureModule for Antiflood {
    fn name(&self) -> &'static str {
        "antiflood"
    }

    fn help(&self) -> Option<&'static str> {
        Some(
            "Antiflood takes action on users that send more than x messages in a row.\n\
             - /flood: get the current flood control setting\n\
             Admins only:\n\
             - /setflood <int/'no'/'off'>: enable or disable flood control\n\
             - /setfloodmode <ban/kick/mute/tban/tmute> <value>: action on users beyond the limit\n\
             Timed modes take a duration such as 4m, 3h, 6d or 5w.",
        )
    }

    fn entries(&self) -> Vec<DispatchEntry> {
        vec![
            DispatchEntry::new(&["flood"], handler(flood)).connection_aware(false).group_only(),
            DispatchEntry::new(&["setflood"], handler(set_flood))
                .connection_aware(true)
                .group_only()
                .admin_only(),
            DispatchEntry::new(&["setfloodmode"], handler(set_flood_mode))
                .connection_aware(true)
                .group_only()
                .admin_only(),
        ]
    }

    fn hooks(&self) -> &'static [HookKind] {
        &[
            HookKind::Migrate,
            HookKind::ChatSettings,
            HookKind::Export,
            HookKind::Import,
        ]
    }

    async fn migrate(&self, gw: &Gateway, old_chat_id: i64, new_chat_id: i64) -> anyhow::Result<()> {
        gw.flood().migrate(old_chat_id, new_chat_id).await?;
        Ok(())
    }

    async fn chat_settings(&self, gw: &Gateway, chat_id: i64, _user_id: u64) -> Option<String> {
        Some(status_text(&gw.flood().settings(chat_id)))
    }

    async fn export(&self, gw: &Gateway, chat_id: i64) -> Option<Document> {
        let settings = gw.flood().settings(chat_id);
        if !settings.is_enabled() {
            return None;
        }
        bson::to_document(&settings).ok()
    }

    async fn import(&self, gw: &Gateway, chat_id: i64, data: &Document) -> anyhow::Result<()> {
        let settings: FloodSettings = bson::from_document(data.clone())?;
        gw.flood()
            .set_penalty(chat_id, settings.penalty, settings.duration)
            .await?;
        gw.flood().set_limit(chat_id, settings.limit).await?;
        Ok(())
    }
}

fn status_text(settings: &FloodSettings) -> String {
    if !settings.is_enabled() {
        return "Not enforcing any flood control here!".to_string();
    }
    format!(
        "Antiflood is set to {} consecutive messages. Users exceeding it get a {}.",
        settings.limit,
        describe_penalty(settings)
    )
}

/// Outcome of parsing a `/setflood` argument.
#[derive(Debug, PartialEq, Eq)]
enum LimitArg {
    Off,
    Limit(u32),
    TooSmall,
    Invalid,
}

fn parse_limit(raw: &str) -> LimitArg {
    let raw = raw.trim().to_lowercase();
    if matches!(raw.as_str(), "off" | "no" | "0") {
        return LimitArg::Off;
    }
    match raw.parse::<u32>() {
        Ok(n) if n >= MIN_LIMIT => LimitArg::Limit(n),
        Ok(_) => LimitArg::TooSmall,
        Err(_) => LimitArg::Invalid,
    }
}

async fn flood(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    gw.reply(&ctx, &status_text(&gw.flood().settings(ctx.chat.id))).await?;
    Ok(())
}

async fn set_flood(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let Some(raw) = ctx.arg(0) else {
        gw.reply(&ctx, "Use <code>/setflood number</code> to enable anti-flood, or <code>/setflood off</code> to disable it.")
            .await?;
        return Ok(());
    };

    let chat = html_escape(&ctx.chat.display_name());
    let text = match parse_limit(raw) {
        LimitArg::Off => {
            gw.flood().set_limit(ctx.chat.id, 0).await?;
            format!("Antiflood has been disabled in {}.", chat)
        }
        LimitArg::Limit(limit) => {
            gw.flood().set_limit(ctx.chat.id, limit).await?;
            format!("Anti-flood has been updated and set to {} in {}", limit, chat)
        }
        LimitArg::TooSmall => "Antiflood must be either 0 (disabled) or number greater than 3!".to_string(),
        LimitArg::Invalid => "Invalid argument please use a number, 'off' or 'no'".to_string(),
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn set_flood_mode(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let Some(penalty) = ctx.arg(0).and_then(FloodPenalty::parse) else {
        gw.reply(&ctx, "I only understand ban/kick/mute/tban/tmute!").await?;
        return Ok(());
    };

    let duration = if penalty.is_timed() {
        match ctx.arg(1) {
            Some(raw) if parse_duration(raw).is_some() => Some(raw.to_lowercase()),
            Some(_) => {
                gw.reply(&ctx, "Invalid time value! Use m, h, d or w (for example 4m, 3h, 6d, 5w).")
                    .await?;
                return Ok(());
            }
            None => {
                gw.reply(
                    &ctx,
                    "It looks like you tried to set a time value but you didn't specify a time; \
                     try <code>/setfloodmode tban 3d</code>.",
                )
                .await?;
                return Ok(());
            }
        }
    } else {
        None
    };

    gw.flood().set_penalty(ctx.chat.id, penalty, duration).await?;
    let settings = gw.flood().settings(ctx.chat.id);
    gw.reply(
        &ctx,
        &format!(
            "Exceeding consecutive flood limit will result in {} in {}!",
            describe_penalty(&settings),
            html_escape(&ctx.chat.display_name())
        ),
    )
    .await?;
    Ok(())
}
