//! Trust tier management and the global user blacklist.
//!
//! Dragons (sudo), Demons (support), Wolves (whitelist) and Tigers are the
//! runtime-assignable tiers. Owner and developers come from configuration.

use std::sync::Arc;

use async_trait::async_trait;

use super::{target_user, trailing_text};
use crate::gateway::{handler, CommandContext, DispatchEntry, FeatureModule, Gateway, GatewayError, HookKind};
use crate::permissions::{TierThreshold, TrustTier};
use crate::utils::html_escape;

pub struct Disasters;

#[async_trait]
impl FeatureModule for Disasters {
    fn name(&self) -> &'static str {
        "disasters"
    }

    fn help(&self) -> Option<&'static str> {
        Some(
            "Bot staff management.\n\
             - /addsudo, /removesudo: Dragons (developers only)\n\
             - /addsupport, /removesupport: Demons\n\
             - /addwhitelist, /removewhitelist: Wolves\n\
             - /addtiger, /removetiger: Tigers\n\
             - /stafflist: list every privileged user\n\
             - /ignore <id> [reason], /notice <id>, /ignoredlist: global blacklist\n\
             - /info [id]: what the bot knows about a user",
        )
    }

    fn entries(&self) -> Vec<DispatchEntry> {
        vec![
            DispatchEntry::new(&["addsudo"], handler(add_sudo)).require_tier(TierThreshold::DevPlus),
            DispatchEntry::new(&["removesudo"], handler(remove_sudo)).require_tier(TierThreshold::DevPlus),
            DispatchEntry::new(&["addsupport"], handler(add_support)).require_tier(TierThreshold::SudoPlus),
            DispatchEntry::new(&["removesupport"], handler(remove_support)).require_tier(TierThreshold::SudoPlus),
            DispatchEntry::new(&["addwhitelist"], handler(add_whitelist)).require_tier(TierThreshold::SudoPlus),
            DispatchEntry::new(&["removewhitelist"], handler(remove_whitelist))
                .require_tier(TierThreshold::SudoPlus),
            DispatchEntry::new(&["addtiger"], handler(add_tiger)).require_tier(TierThreshold::SudoPlus),
            DispatchEntry::new(&["removetiger"], handler(remove_tiger)).require_tier(TierThreshold::SudoPlus),
            DispatchEntry::new(&["stafflist"], handler(staff_list)).require_tier(TierThreshold::WhitelistPlus),
            DispatchEntry::new(&["ignore"], handler(ignore)).require_tier(TierThreshold::DevPlus),
            DispatchEntry::new(&["notice"], handler(notice)).require_tier(TierThreshold::DevPlus),
            DispatchEntry::new(&["ignoredlist"], handler(ignored_list)).require_tier(TierThreshold::DevPlus),
            DispatchEntry::new(&["info"], handler(info)).disableable(),
        ]
    }

    fn hooks(&self) -> &'static [HookKind] {
        &[HookKind::UserInfo, HookKind::Stats]
    }

    async fn user_info(&self, gw: &Gateway, user_id: u64) -> Option<String> {
        let tier = gw.trust().static_tier(user_id)?;
        Some(format!("This person's trust tier is <b>{}</b>.", tier.label()))
    }

    async fn stats(&self, gw: &Gateway) -> Option<String> {
        Some(format!("• {} blacklisted users.", gw.blacklist().list().len()))
    }
}

async fn add(gw: &Gateway, ctx: &CommandContext, tier: TrustTier) -> anyhow::Result<()> {
    let Some(user_id) = target_user(ctx) else {
        gw.reply(ctx, "That's not a user I can find.").await?;
        return Ok(());
    };

    let text = match gw.promote(user_id, tier).await {
        Ok(change) if !change.changed() => format!("This member is already a {}.", tier),
        Ok(change) => match change.previous {
            Some(previous) => format!("Moved user {} from {} to {}.", user_id, previous, tier),
            None => format!("Successfully set user {} as a {}!", user_id, tier),
        },
        Err(GatewayError::InvalidTierChange(reason)) => format!("Can't do that: {}.", html_escape(&reason)),
        Err(e) => return Err(e.into()),
    };
    gw.reply(ctx, &text).await?;
    Ok(())
}

async fn remove(gw: &Gateway, ctx: &CommandContext, tier: TrustTier) -> anyhow::Result<()> {
    let Some(user_id) = target_user(ctx) else {
        gw.reply(ctx, "That's not a user I can find.").await?;
        return Ok(());
    };

    let text = if gw.demote(user_id, tier).await? {
        let mut text = format!("Demoted user {} from {}.", user_id, tier);
        if gw.configured_tier(user_id) == Some(tier) {
            text.push_str(" They are listed in the bot configuration and will be restored on restart.");
        }
        text
    } else {
        format!("This user is not a {}!", tier)
    };
    gw.reply(ctx, &text).await?;
    Ok(())
}

async fn add_sudo(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    add(&gw, &ctx, TrustTier::Dragon).await
}

async fn remove_sudo(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    remove(&gw, &ctx, TrustTier::Dragon).await
}

async fn add_support(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    add(&gw, &ctx, TrustTier::Demon).await
}

async fn remove_support(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    remove(&gw, &ctx, TrustTier::Demon).await
}

async fn add_whitelist(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    add(&gw, &ctx, TrustTier::Wolf).await
}

async fn remove_whitelist(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    remove(&gw, &ctx, TrustTier::Wolf).await
}

async fn add_tiger(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    add(&gw, &ctx, TrustTier::Tiger).await
}

async fn remove_tiger(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    remove(&gw, &ctx, TrustTier::Tiger).await
}

async fn staff_list(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let tiers = [
        TrustTier::Owner,
        TrustTier::Developer,
        TrustTier::Dragon,
        TrustTier::Demon,
        TrustTier::Wolf,
        TrustTier::Tiger,
    ];
    let mut text = String::from("<b>Bot staff</b>");
    for tier in tiers {
        let members = gw.trust().members(tier);
        if members.is_empty() {
            continue;
        }
        text.push_str(&format!("\n\n<b>{}</b>", tier.label()));
        for id in members {
            text.push_str(&format!("\n - <code>{}</code>", id));
        }
    }
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn ignore(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let Some(user_id) = target_user(&ctx) else {
        gw.reply(&ctx, "I doubt that's a user.").await?;
        return Ok(());
    };
    if gw.trust().is_whitelist_plus(user_id) {
        gw.reply(&ctx, "I'm not blacklisting a member of the bot staff.").await?;
        return Ok(());
    }

    let text = if gw.blacklist().add(user_id, trailing_text(&ctx)).await? {
        format!("I'll ignore user {} from now on.", user_id)
    } else {
        format!("User {} is already ignored; reason updated.", user_id)
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn notice(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let Some(user_id) = target_user(&ctx) else {
        gw.reply(&ctx, "I doubt that's a user.").await?;
        return Ok(());
    };
    let text = if gw.blacklist().remove(user_id).await? {
        format!("User {} is no longer ignored.", user_id)
    } else {
        "I am not ignoring them at all though!".to_string()
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn ignored_list(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let users = gw.blacklist().list();
    if users.is_empty() {
        gw.reply(&ctx, "I ain't ignoring anyone yet.").await?;
        return Ok(());
    }
    let mut text = String::from("<b>Blacklisted users</b>");
    for (id, reason) in users {
        match reason {
            Some(reason) => text.push_str(&format!("\n - <code>{}</code>: {}", id, html_escape(&reason))),
            None => text.push_str(&format!("\n - <code>{}</code>", id)),
        }
    }
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn info(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let user_id = target_user(&ctx).unwrap_or(ctx.user.id);
    let mut text = format!("<b>User info</b>\nID: <code>{}</code>", user_id);
    if user_id == ctx.user.id {
        text.push_str(&format!("\nFirst name: {}", html_escape(&ctx.user.first_name)));
    }
    if ctx.chat.is_group() {
        text.push_str(&format!("\nHere: <b>{}</b>", gw.tier_of(&ctx.chat, user_id).await.label()));
    }
    for line in gw.user_info(user_id).await {
        text.push('\n');
        text.push_str(&line);
    }
    if gw.blacklist().contains(user_id) {
        text.push_str("\nThis user is blacklisted.");
    }
    gw.reply(&ctx, &text).await?;
    Ok(())
}
