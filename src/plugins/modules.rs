//! Runtime module management, help and stats.
//!
//! This module hosts `/load` and `/unload` itself and therefore can never be
//! unloaded.

use std::sync::Arc;

use async_trait::async_trait;

use crate::gateway::{handler, normalize_module, CommandContext, DispatchEntry, FeatureModule, Gateway};
use crate::permissions::TierThreshold;
use crate::utils::html_escape;

pub struct Modules;

#[async_trait]
impl FeatureModule for Modules {
    fn name(&self) -> &'static str {
        "modules"
    }

    fn essential(&self) -> bool {
        true
    }

    fn entries(&self) -> Vec<DispatchEntry> {
        vec![
            DispatchEntry::new(&["load"], handler(load)).require_tier(TierThreshold::DevPlus),
            DispatchEntry::new(&["unload"], handler(unload)).require_tier(TierThreshold::DevPlus),
            DispatchEntry::new(&["listmodules"], handler(list_modules)).require_tier(TierThreshold::SudoPlus),
            DispatchEntry::new(&["stats"], handler(stats)).require_tier(TierThreshold::DevPlus),
            DispatchEntry::new(&["help"], handler(help)),
        ]
    }
}

async fn load(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let Some(raw) = ctx.arg(0) else {
        gw.reply(&ctx, "Which module should I load?").await?;
        return Ok(());
    };
    let text = match gw.load_module(raw) {
        Ok(touched) => format!(
            "Successfully loaded module: <b>{}</b> ({} commands)",
            html_escape(&touched.module),
            touched.routes.len()
        ),
        Err(e) => format!("Cannot load module: {}", html_escape(&e.to_string())),
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn unload(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let Some(raw) = ctx.arg(0) else {
        gw.reply(&ctx, "Which module should I unload?").await?;
        return Ok(());
    };
    let text = match gw.unload_module(raw) {
        Ok(touched) => format!("Successfully unloaded module: <b>{}</b>", html_escape(&touched.module)),
        Err(e) => format!("Cannot unload module: {}", html_escape(&e.to_string())),
    };
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn list_modules(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let mut text = String::from("<b>Modules</b>");
    for name in gw.modules().available() {
        let mark = if gw.modules().is_loaded(&name) { "loaded" } else { "not loaded" };
        text.push_str(&format!("\n - <code>{}</code>: {}", html_escape(&name), mark));
    }
    gw.reply(&ctx, &text).await?;
    Ok(())
}

async fn stats(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    let mut lines = vec![
        "<b>Current stats</b>".to_string(),
        format!("• {} active connections.", gw.connections().active_count()),
        format!("• {} chats with antiflood.", gw.flood().enabled_chats()),
        format!("• {} senders tracked for abuse.", gw.abuse().tracked()),
        format!("• {} admin lists cached.", gw.admins().cached_groups()),
    ];
    lines.extend(gw.stats().await);
    gw.reply(&ctx, &lines.join("\n")).await?;
    Ok(())
}

async fn help(gw: Arc<Gateway>, ctx: CommandContext) -> anyhow::Result<()> {
    if let Some(raw) = ctx.arg(0) {
        let name = normalize_module(raw);
        let text = match gw.modules().help(&name) {
            Some(help) => format!("Here is the help for the <b>{}</b> module:\n\n{}", html_escape(&name), help),
            None => format!("No help for <code>{}</code>. Try /help to list modules.", html_escape(&name)),
        };
        gw.reply(&ctx, &text).await?;
        return Ok(());
    }

    let documented: Vec<String> = gw
        .modules()
        .loaded()
        .into_iter()
        .filter(|name| gw.modules().help(name).is_some())
        .map(|name| format!(" - <code>{}</code>", html_escape(&name)))
        .collect();
    let text = format!(
        "Hey there! I help admins manage their groups.\nUse <code>/help module</code> for details on:\n{}",
        documented.join("\n")
    );
    gw.reply(&ctx, &text).await?;
    Ok(())
}
