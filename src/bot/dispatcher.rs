//! Message dispatcher setup.
//!
//! Turns Telegram updates into gateway commands and message events.

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::debug;

use super::telegram::{chat_ref, user_ref};
use crate::events;
use crate::gateway::{CommandContext, DispatchOutcome, Gateway};
use crate::utils::parse_command;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Command gateway shared by every handler.
    pub gateway: Arc<Gateway>,

    /// Bot username (without @), used to ignore commands for other bots.
    pub bot_username: String,
}

impl AppState {
    pub fn new(gateway: Arc<Gateway>, bot_username: String) -> Self {
        Self { gateway, bot_username }
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    gateway: Arc<Gateway>,
    bot_username: String,
) -> Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey> {
    let state = AppState::new(gateway, bot_username);

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    // Commands first (they count toward flood too); everything else is a
    // plain message event.
    let message_handler = Update::filter_message()
        .branch(dptree::filter_map(command_context).endpoint(handle_command))
        .branch(events::message_event_handler());

    dptree::entry().branch(message_handler)
}

/// Parse a message into a gateway command, if it is one addressed to us.
fn command_context(msg: Message, state: AppState) -> Option<CommandContext> {
    let text = msg.text()?;
    let parsed = parse_command(text, state.gateway.settings().allow_excl, &state.bot_username)?;
    let user = msg.from.as_ref()?;

    let mut ctx = CommandContext::new(chat_ref(&msg.chat), user_ref(user), parsed.name, parsed.args)
        .with_message_id(msg.id.0);
    if let Some(author) = msg.reply_to_message().and_then(|m| m.from.as_ref()) {
        ctx = ctx.with_reply_to(user_ref(author));
    }
    Some(ctx)
}

async fn handle_command(ctx: CommandContext, state: AppState) -> anyhow::Result<()> {
    let command = ctx.command.clone();
    let user_id = ctx.user.id;
    let outcome = Arc::clone(&state.gateway).receive_command(ctx).await;
    if outcome != DispatchOutcome::Unknown {
        debug!("/{} from {}: {:?}", command, user_id, outcome);
    }
    Ok(())
}
