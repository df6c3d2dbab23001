//! Antiflood event handler.
//!
//! Feeds every plain group message into the gateway's flood guard.

use teloxide::prelude::*;
use tracing::debug;

use crate::bot::dispatcher::AppState;
use crate::bot::telegram::{chat_ref, user_ref};
use crate::gateway::{FloodVerdict, MessageEvent};

pub async fn handle(msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let event = MessageEvent {
        chat: chat_ref(&msg.chat),
        user: user_ref(user),
        message_id: msg.id.0,
    };
    match state.gateway.observe_message(&event).await {
        FloodVerdict::Skipped | FloodVerdict::Counted | FloodVerdict::Exempt => {}
        verdict => debug!("Flood verdict in chat {}: {:?}", event.chat.id, verdict),
    }
    Ok(())
}
