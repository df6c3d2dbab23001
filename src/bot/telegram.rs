//! Telegram implementation of the gateway's [`ChatApi`].

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{Chat, ChatPermissions, MessageId, ParseMode, ReplyParameters, User};
use teloxide::RequestError;

use super::dispatcher::ThrottledBot;
use crate::gateway::{ApiError, ChatApi, ChatKind, ChatRef, MemberStatus, Restriction, UserRef};

/// Bot API client seen through the gateway's collaborator interface.
pub struct TelegramApi {
    bot: ThrottledBot,
}

impl TelegramApi {
    pub fn new(bot: ThrottledBot) -> Self {
        Self { bot }
    }
}

/// Platform refusals (missing rights, unknown chat) are `Rejected`,
/// everything else is a transport failure.
fn api_error(e: RequestError) -> ApiError {
    match e {
        RequestError::Api(api) => ApiError::Rejected(api.to_string()),
        other => ApiError::Transport(other.to_string()),
    }
}

#[async_trait]
impl ChatApi for TelegramApi {
    async fn list_administrators(&self, chat_id: i64) -> Result<Vec<u64>, ApiError> {
        let admins = self
            .bot
            .get_chat_administrators(ChatId(chat_id))
            .await
            .map_err(api_error)?;
        Ok(admins.into_iter().map(|m| m.user.id.0).collect())
    }

    async fn member_status(&self, chat_id: i64, user_id: u64) -> Result<MemberStatus, ApiError> {
        let member = self
            .bot
            .get_chat_member(ChatId(chat_id), UserId(user_id))
            .await
            .map_err(api_error)?;
        let kind = &member.kind;
        Ok(if kind.is_owner() {
            MemberStatus::Owner
        } else if kind.is_administrator() {
            MemberStatus::Administrator
        } else if kind.is_banned() {
            MemberStatus::Banned
        } else if kind.is_left() {
            MemberStatus::Left
        } else if kind.is_restricted() {
            MemberStatus::Restricted
        } else {
            MemberStatus::Member
        })
    }

    async fn chat_title(&self, chat_id: i64) -> Result<Option<String>, ApiError> {
        let chat = self.bot.get_chat(ChatId(chat_id)).await.map_err(api_error)?;
        Ok(chat.title().map(str::to_string))
    }

    async fn restrict(&self, chat_id: i64, user_id: u64, restriction: Restriction) -> Result<(), ApiError> {
        let chat = ChatId(chat_id);
        let user = UserId(user_id);
        match restriction {
            Restriction::Ban { until: Some(until) } => {
                self.bot.ban_chat_member(chat, user).until_date(until).await.map_err(api_error)?;
            }
            Restriction::Ban { until: None } => {
                self.bot.ban_chat_member(chat, user).await.map_err(api_error)?;
            }
            Restriction::Kick => {
                self.bot.ban_chat_member(chat, user).await.map_err(api_error)?;
                self.bot.unban_chat_member(chat, user).await.map_err(api_error)?;
            }
            Restriction::Mute { until: Some(until) } => {
                self.bot
                    .restrict_chat_member(chat, user, ChatPermissions::empty())
                    .until_date(until)
                    .await
                    .map_err(api_error)?;
            }
            Restriction::Mute { until: None } => {
                self.bot
                    .restrict_chat_member(chat, user, ChatPermissions::empty())
                    .await
                    .map_err(api_error)?;
            }
        }
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), ApiError> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn send_text(&self, chat_id: i64, text: &str, reply_to: Option<i32>) -> Result<(), ApiError> {
        let request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        match reply_to {
            Some(id) => request
                .reply_parameters(ReplyParameters::new(MessageId(id)).allow_sending_without_reply())
                .await
                .map_err(api_error)?,
            None => request.await.map_err(api_error)?,
        };
        Ok(())
    }
}

pub fn chat_ref(chat: &Chat) -> ChatRef {
    let kind = if chat.is_private() {
        ChatKind::Private
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else if chat.is_group() {
        ChatKind::Group
    } else {
        ChatKind::Channel
    };
    ChatRef::new(chat.id.0, kind, chat.title())
}

pub fn user_ref(user: &User) -> UserRef {
    UserRef {
        id: user.id.0,
        first_name: user.first_name.clone(),
        is_bot: user.is_bot,
    }
}
