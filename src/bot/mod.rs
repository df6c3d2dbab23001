//! Bot module - Telegram transport around the gateway.

pub mod dispatcher;
mod runtime;
pub mod telegram;
pub mod webhook;

pub use dispatcher::{build_dispatcher, AppState, ThrottledBot};
pub use runtime::run;
pub use telegram::TelegramApi;
