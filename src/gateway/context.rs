//! Chat, user and command context passed through the gateway.

/// Kind of conversation a command arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    /// Best guess for a group known only by id (supergroups use the -100 prefix).
    pub fn from_group_id(chat_id: i64) -> Self {
        if chat_id <= -1_000_000_000_000 {
            Self::Supergroup
        } else {
            Self::Group
        }
    }
}

/// A chat the gateway reasons about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRef {
    pub id: i64,
    pub kind: ChatKind,
    pub title: Option<String>,
}

impl ChatRef {
    pub fn new(id: i64, kind: ChatKind, title: Option<&str>) -> Self {
        Self {
            id,
            kind,
            title: title.map(str::to_string),
        }
    }

    /// A group known by id and (optionally) title.
    pub fn group(id: i64, title: Option<String>) -> Self {
        Self {
            id,
            kind: ChatKind::from_group_id(id),
            title,
        }
    }

    #[inline]
    pub fn is_private(&self) -> bool {
        self.kind == ChatKind::Private
    }

    #[inline]
    pub fn is_group(&self) -> bool {
        matches!(self.kind, ChatKind::Group | ChatKind::Supergroup)
    }

    /// Title for display, falling back to the id.
    pub fn display_name(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// The user behind a command or message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: u64,
    pub first_name: String,
    pub is_bot: bool,
}

impl UserRef {
    pub fn new(id: u64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            is_bot: false,
        }
    }
}

/// Everything a guard or handler knows about one command invocation.
///
/// `origin` is where the message was sent. `chat` is the chat the command
/// acts on: the same as `origin` unless a connection guard redirected it.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub origin: ChatRef,
    pub chat: ChatRef,
    pub user: UserRef,
    pub message_id: Option<i32>,
    pub command: String,
    pub args: Vec<String>,
    /// Author of the message this command replied to.
    pub reply_to: Option<UserRef>,
}

impl CommandContext {
    pub fn new(origin: ChatRef, user: UserRef, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            chat: origin.clone(),
            origin,
            user,
            message_id: None,
            command: command.into(),
            args,
            reply_to: None,
        }
    }

    #[must_use]
    pub fn with_message_id(mut self, message_id: i32) -> Self {
        self.message_id = Some(message_id);
        self
    }

    #[must_use]
    pub fn with_reply_to(mut self, user: UserRef) -> Self {
        self.reply_to = Some(user);
        self
    }

    #[inline]
    pub fn has_args(&self) -> bool {
        !self.args.is_empty()
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Arguments joined back into one string.
    pub fn args_text(&self) -> String {
        self.args.join(" ")
    }

    /// Whether the command was redirected to a connected group.
    pub fn is_remote(&self) -> bool {
        self.chat.id != self.origin.id
    }
}

/// A non-command message observed in a chat (flood accounting input).
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub chat: ChatRef,
    pub user: UserRef,
    pub message_id: i32,
}
