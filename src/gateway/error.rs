//! Gateway errors and command rejections.

use thiserror::Error;

use super::api::ApiError;
use crate::database::StoreError;
use crate::permissions::TierThreshold;

/// Failures surfaced by gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("`{0}` cannot be disabled")]
    NotDisableable(String),

    #[error("no module named `{0}`")]
    ModuleNotFound(String),

    #[error("module `{0}` is already loaded")]
    ModuleAlreadyLoaded(String),

    #[error("module `{0}` is not loaded")]
    ModuleNotLoaded(String),

    #[error("command `{command}` is already provided by `{owner}`")]
    CommandConflict { command: String, owner: String },

    #[error("module `{0}` cannot be unloaded")]
    EssentialModule(String),

    #[error("invalid tier change: {0}")]
    InvalidTierChange(String),

    #[error("connection denied: {0}")]
    ConnectionDenied(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Why a command was dropped without any reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilentReason {
    Blacklisted,
    Abusive,
    Disabled,
    /// A collaborator failed while checking; deny for this invocation.
    Unavailable,
}

/// Templated refusals shown to the invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    AdminRequired,
    TierRequired(TierThreshold),
    GroupOnly,
    ConnectedAdminRequired,
}

impl Refusal {
    pub fn text(self, support_chat: Option<&str>) -> String {
        match self {
            Self::AdminRequired => "You need to be an admin of this chat to do this.".to_string(),
            Self::TierRequired(TierThreshold::DevPlus) => {
                "This is a developer restricted command. You do not have permissions to run this.".to_string()
            }
            Self::TierRequired(TierThreshold::SudoPlus | TierThreshold::SupportPlus) => {
                "You don't have the rights to run this command.".to_string()
            }
            Self::TierRequired(TierThreshold::WhitelistPlus) => match support_chat {
                Some(chat) => format!("You don't have access to use this.\nVisit @{}", chat),
                None => "You don't have access to use this.".to_string(),
            },
            Self::GroupOnly => {
                "This command is meant to be used in a group, or from PM while connected to one.".to_string()
            }
            Self::ConnectedAdminRequired => "You must be an admin in the connected group!".to_string(),
        }
    }
}

/// One-off explanatory messages that are always sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    ConnectionRevoked,
}

impl Notice {
    pub fn text(self) -> &'static str {
        match self {
            Self::ConnectionRevoked => {
                "The group changed the connection rights or you are no longer an admin.\nI've disconnected you."
            }
        }
    }
}

/// Outcome of a failed guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Silent(SilentReason),
    Refused(Refusal),
    Notice(Notice),
}
