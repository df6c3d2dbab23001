//! Event handler system.
//!
//! Non-command messages: chat migrations and flood accounting.

pub mod antiflood;
pub mod migration;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

/// Build the message event handler.
pub fn message_event_handler() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(dptree::filter(|msg: Message| msg.migrate_to_chat_id().is_some()).endpoint(migration::handle))
        .branch(
            dptree::filter(|msg: Message| msg.chat.is_group() || msg.chat.is_supergroup())
                .endpoint(antiflood::handle),
        )
}
