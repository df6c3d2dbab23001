//! Composable command guards and dispatch entries.
//!
//! A [`DispatchEntry`] pairs a handler with an ordered list of guards. The
//! builder methods append guards in call order, so
//! `.connection_aware(true).disableable().admin_only()` resolves the target
//! group first, then checks disablement, then admin rights.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::connection::Resolution;
use super::context::CommandContext;
use super::error::{Notice, Refusal, Rejection, SilentReason};
use super::Gateway;
use crate::permissions::TierThreshold;
use crate::utils::normalize_command;

/// One check in a command's chain.
#[async_trait]
pub trait Guard: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pass, or reject. Guards may rewrite the context (target chat).
    async fn check(&self, gw: &Gateway, ctx: &mut CommandContext) -> Result<(), Rejection>;
}

/// Drops commands from globally ignored users.
pub struct BlacklistGuard;

#[async_trait]
impl Guard for BlacklistGuard {
    fn name(&self) -> &'static str {
        "blacklist"
    }

    async fn check(&self, gw: &Gateway, ctx: &mut CommandContext) -> Result<(), Rejection> {
        if gw.blacklist().contains(ctx.user.id) {
            return Err(Rejection::Silent(SilentReason::Blacklisted));
        }
        Ok(())
    }
}

/// Drops commands from senders over the global rate.
pub struct AbuseGuard;

#[async_trait]
impl Guard for AbuseGuard {
    fn name(&self) -> &'static str {
        "abuse"
    }

    async fn check(&self, gw: &Gateway, ctx: &mut CommandContext) -> Result<(), Rejection> {
        if gw.abuse().check(gw.trust(), ctx.origin.id, ctx.user.id) {
            return Err(Rejection::Silent(SilentReason::Abusive));
        }
        Ok(())
    }
}

/// Silently drops commands disabled in the chat they were sent in.
///
/// Private chats always pass. Admin-exempt commands still run for admins.
pub struct DisableGuard;

#[async_trait]
impl Guard for DisableGuard {
    fn name(&self) -> &'static str {
        "disable"
    }

    async fn check(&self, gw: &Gateway, ctx: &mut CommandContext) -> Result<(), Rejection> {
        let commands = gw.commands();
        if ctx.origin.is_private() || !commands.is_disabled(ctx.origin.id, &ctx.command) {
            return Ok(());
        }
        if commands.is_admin_exempt(&ctx.command) && gw.is_admin(&ctx.origin, ctx.user.id).await {
            return Ok(());
        }
        Err(Rejection::Silent(SilentReason::Disabled))
    }
}

/// Requires a minimum trust tier.
pub struct TierGuard(pub TierThreshold);

#[async_trait]
impl Guard for TierGuard {
    fn name(&self) -> &'static str {
        "tier"
    }

    async fn check(&self, gw: &Gateway, ctx: &mut CommandContext) -> Result<(), Rejection> {
        if gw.trust().passes(ctx.user.id, self.0) {
            Ok(())
        } else {
            Err(Rejection::Refused(Refusal::TierRequired(self.0)))
        }
    }
}

/// Requires admin rights in the target chat.
pub struct AdminGuard;

#[async_trait]
impl Guard for AdminGuard {
    fn name(&self) -> &'static str {
        "admin"
    }

    async fn check(&self, gw: &Gateway, ctx: &mut CommandContext) -> Result<(), Rejection> {
        if gw.is_admin(&ctx.chat, ctx.user.id).await {
            Ok(())
        } else {
            Err(Rejection::Refused(Refusal::AdminRequired))
        }
    }
}

/// Requires the target to be a group.
pub struct GroupGuard;

#[async_trait]
impl Guard for GroupGuard {
    fn name(&self) -> &'static str {
        "group"
    }

    async fn check(&self, _gw: &Gateway, ctx: &mut CommandContext) -> Result<(), Rejection> {
        if ctx.chat.is_group() {
            Ok(())
        } else {
            Err(Rejection::Refused(Refusal::GroupOnly))
        }
    }
}

/// Redirects a private-chat command to the user's connected group.
///
/// Without a connection the command keeps acting on the private chat; pair
/// with [`GroupGuard`] when a group target is mandatory.
pub struct ConnectionGuard {
    pub need_admin: bool,
}

#[async_trait]
impl Guard for ConnectionGuard {
    fn name(&self) -> &'static str {
        "connection"
    }

    async fn check(&self, gw: &Gateway, ctx: &mut CommandContext) -> Result<(), Rejection> {
        match gw
            .connections()
            .resolve(gw, &ctx.origin, ctx.user.id, self.need_admin)
            .await
        {
            Resolution::NotPrivate | Resolution::NotConnected => Ok(()),
            Resolution::Connected(chat) => {
                ctx.chat = chat;
                Ok(())
            }
            Resolution::Revoked => Err(Rejection::Notice(Notice::ConnectionRevoked)),
            Resolution::AdminRequired => Err(Rejection::Refused(Refusal::ConnectedAdminRequired)),
            Resolution::Unavailable => Err(Rejection::Silent(SilentReason::Unavailable)),
        }
    }
}

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A command handler.
pub type Handler = Arc<dyn Fn(Arc<Gateway>, CommandContext) -> HandlerFuture + Send + Sync>;

/// Wrap an async fn as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Arc<Gateway>, CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |gw, ctx| Box::pin(f(gw, ctx)))
}

/// A routed command: names, guard chain and handler.
#[derive(Clone)]
pub struct DispatchEntry {
    commands: Vec<String>,
    guards: Vec<Arc<dyn Guard>>,
    handler: Handler,
    disableable: bool,
    admin_exempt: bool,
}

impl DispatchEntry {
    /// An entry answering to `commands` (first name is primary, the rest aliases).
    pub fn new(commands: &[&str], handler: Handler) -> Self {
        Self {
            commands: commands.iter().map(|c| normalize_command(c)).collect(),
            guards: Vec::new(),
            handler,
            disableable: false,
            admin_exempt: false,
        }
    }

    /// Append a custom guard.
    #[must_use]
    pub fn guard(mut self, guard: impl Guard + 'static) -> Self {
        self.guards.push(Arc::new(guard));
        self
    }

    /// Register the commands as disableable and check disablement here.
    #[must_use]
    pub fn disableable(mut self) -> Self {
        self.disableable = true;
        self.guard(DisableGuard)
    }

    /// Like [`disableable`](Self::disableable), but admins may still run it while disabled.
    #[must_use]
    pub fn disableable_admin_exempt(mut self) -> Self {
        self.admin_exempt = true;
        self.disableable()
    }

    #[must_use]
    pub fn require_tier(self, threshold: TierThreshold) -> Self {
        self.guard(TierGuard(threshold))
    }

    #[must_use]
    pub fn admin_only(self) -> Self {
        self.guard(AdminGuard)
    }

    #[must_use]
    pub fn group_only(self) -> Self {
        self.guard(GroupGuard)
    }

    #[must_use]
    pub fn connection_aware(self, need_admin: bool) -> Self {
        self.guard(ConnectionGuard { need_admin })
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn is_disableable(&self) -> bool {
        self.disableable
    }

    pub fn is_admin_exempt(&self) -> bool {
        self.admin_exempt
    }

    pub fn guards(&self) -> impl Iterator<Item = &Arc<dyn Guard>> {
        self.guards.iter()
    }

    /// Guard names in chain order.
    pub fn guard_names(&self) -> Vec<&'static str> {
        self.guards.iter().map(|g| g.name()).collect()
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for DispatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEntry")
            .field("commands", &self.commands)
            .field("guards", &self.guard_names())
            .field("disableable", &self.disableable)
            .field("admin_exempt", &self.admin_exempt)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_gw: Arc<Gateway>, _ctx: CommandContext) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn guards_keep_call_order() {
        let entry = DispatchEntry::new(&["/Disable"], handler(noop))
            .connection_aware(true)
            .disableable()
            .admin_only();
        assert_eq!(entry.commands(), ["disable"]);
        assert_eq!(entry.guard_names(), vec!["connection", "disable", "admin"]);
        assert!(entry.is_disableable());
        assert!(!entry.is_admin_exempt());

        let entry = DispatchEntry::new(&["rules"], handler(noop))
            .admin_only()
            .disableable_admin_exempt();
        assert_eq!(entry.guard_names(), vec!["admin", "disable"]);
        assert!(entry.is_admin_exempt());
    }
}
