//! Group to supergroup migration.

use teloxide::prelude::*;
use tracing::warn;

use crate::bot::dispatcher::AppState;

pub async fn handle(msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(new_chat) = msg.migrate_to_chat_id() else {
        return Ok(());
    };
    let report = state.gateway.migrate_chat(msg.chat.id.0, new_chat.0).await;
    let failed = report.iter().filter(|(_, result)| result.is_err()).count();
    if failed > 0 {
        warn!("{} of {} modules failed to migrate chat {}", failed, report.len(), msg.chat.id);
    }
    Ok(())
}
