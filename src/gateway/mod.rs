//! Command gateway - decides whether, as whom and against which chat a
//! command runs.
//!
//! Every inbound command goes through [`Gateway::dispatch`]:
//!
//! 1. route lookup in the module registry (unknown commands are ignored)
//! 2. prelude: blacklist, then global abuse accounting
//! 3. the entry's own guard chain (connection, disable, tier, admin, ...)
//! 4. the handler
//!
//! A failed guard yields a [`Rejection`] that the gateway turns into
//! silence, a templated refusal or a notice.

pub mod api;
mod blacklist;
mod command_registry;
mod connection;
mod context;
mod error;
mod middleware;
mod modules;
pub mod rate;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::{Duration, Instant};

use mongodb::bson::Document;
use tracing::{debug, error, info, warn};

pub use api::{ApiError, ChatApi, MemberStatus, Restriction};
pub use blacklist::Blacklist;
pub use command_registry::{BulkResult, CommandRegistry};
pub use connection::{ConnectionBroker, Resolution};
pub use context::{ChatKind, ChatRef, CommandContext, MessageEvent, UserRef};
pub use error::{GatewayError, Notice, Refusal, Rejection, SilentReason};
pub use middleware::{
    handler, AbuseGuard, AdminGuard, BlacklistGuard, ConnectionGuard, DisableGuard, DispatchEntry, GroupGuard, Guard,
    Handler, TierGuard,
};
pub use modules::{normalize_module, FeatureModule, HookKind, ModuleRegistry, RegistrySnapshot, TouchedKeys};
pub use rate::{FloodGuard, FloodVerdict, GlobalAbuseGuard};

use crate::cache::ADMIN_LIST_TTL;
use crate::database::{GatewayStore, StoreError};
use crate::permissions::{AdminCache, StaticTiers, TierChange, TrustRegistry, TrustTier};

/// The part of the configuration the gateway consumes.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Bot username (without @), used to ignore commands for other bots.
    pub bot_username: String,
    /// Delete refused argument-less commands instead of replying.
    pub del_cmds: bool,
    pub allow_excl: bool,
    pub support_chat: Option<String>,
    pub admin_cache_ttl: Duration,
    /// Whether an exempt speaker resets a group's flood streak.
    pub flood_exempt_interrupts: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            bot_username: String::new(),
            del_cmds: false,
            allow_excl: false,
            support_chat: None,
            admin_cache_ttl: ADMIN_LIST_TTL,
            flood_exempt_interrupts: true,
        }
    }
}

/// What [`Gateway::dispatch`] did with a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    Rejected(Rejection),
    /// No loaded module routes this command.
    Unknown,
    /// The handler returned an error.
    Failed,
}

/// Per-module result of a fan-out over a hook.
pub type HookReport = Vec<(String, Result<(), String>)>;

/// Composition root shared by every handler.
pub struct Gateway {
    settings: GatewaySettings,
    api: Arc<dyn ChatApi>,
    store: Arc<dyn GatewayStore>,
    statics: StaticTiers,
    trust: Arc<TrustRegistry>,
    admins: AdminCache,
    commands: CommandRegistry,
    abuse: GlobalAbuseGuard,
    flood: FloodGuard,
    connections: ConnectionBroker,
    modules: ModuleRegistry,
    blacklist: Blacklist,
}

impl Gateway {
    pub fn new(
        settings: GatewaySettings,
        tiers: StaticTiers,
        api: Arc<dyn ChatApi>,
        store: Arc<dyn GatewayStore>,
        catalog: Vec<Arc<dyn FeatureModule>>,
    ) -> Self {
        let trust = Arc::new(TrustRegistry::new(tiers.clone()));
        Self {
            admins: AdminCache::new(Arc::clone(&api), Arc::clone(&trust), settings.admin_cache_ttl),
            commands: CommandRegistry::new(Arc::clone(&store)),
            abuse: GlobalAbuseGuard::new(),
            flood: FloodGuard::new(Arc::clone(&store), settings.flood_exempt_interrupts),
            connections: ConnectionBroker::new(Arc::clone(&store), Arc::clone(&api)),
            modules: ModuleRegistry::new(catalog),
            blacklist: Blacklist::new(Arc::clone(&store)),
            statics: tiers,
            trust,
            settings,
            api,
            store,
        }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn api(&self) -> &dyn ChatApi {
        self.api.as_ref()
    }

    pub fn store(&self) -> &dyn GatewayStore {
        self.store.as_ref()
    }

    pub fn trust(&self) -> &TrustRegistry {
        &self.trust
    }

    pub fn admins(&self) -> &AdminCache {
        &self.admins
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn abuse(&self) -> &GlobalAbuseGuard {
        &self.abuse
    }

    pub fn flood(&self) -> &FloodGuard {
        &self.flood
    }

    pub fn connections(&self) -> &ConnectionBroker {
        &self.connections
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    /// Read every persisted table into the in-memory mirrors.
    pub async fn hydrate(&self) -> Result<(), StoreError> {
        self.commands.hydrate(self.store.disabled_commands().await?);

        let approvals = self
            .store
            .approvals()
            .await?
            .into_iter()
            .map(|a| (a.chat_id, a.user_id as u64))
            .collect();
        self.flood.hydrate(self.store.flood_settings().await?, approvals);

        self.connections.hydrate(
            self.store.connections().await?,
            self.store.connection_access().await?,
        );

        let elevated = self.store.elevated_users().await?;
        self.trust.restore_elevated(&elevated, &self.statics);

        self.blacklist.hydrate(self.store.blacklisted_users().await?);

        info!(
            "Gateway hydrated: {} active connections, {} chats with antiflood",
            self.connections.active_count(),
            self.flood.enabled_chats()
        );
        Ok(())
    }

    /// Whether a user counts as an admin of a chat.
    pub async fn is_admin(&self, chat: &ChatRef, user_id: u64) -> bool {
        self.admins.is_admin(chat, user_id).await
    }

    /// Tier of a user in a chat: static tiers first, then group admin status.
    pub async fn tier_of(&self, chat: &ChatRef, user_id: u64) -> TrustTier {
        match self.trust.tier_of(chat, user_id) {
            TrustTier::Member if self.admins.is_admin(chat, user_id).await => TrustTier::GroupAdmin,
            tier => tier,
        }
    }

    /// Attach a module and register its disableable commands.
    pub fn load_module(&self, name: &str) -> Result<TouchedKeys, GatewayError> {
        let touched = self.modules.attach(name)?;
        for (command, admin_exempt) in &touched.disableable {
            self.commands.register(command, *admin_exempt);
        }
        info!("Loaded module {}", touched.module);
        Ok(touched)
    }

    /// Detach a module and unregister its disableable commands.
    pub fn unload_module(&self, name: &str) -> Result<TouchedKeys, GatewayError> {
        let touched = self.modules.detach(name)?;
        for (command, _) in &touched.disableable {
            self.commands.unregister(command);
        }
        info!("Unloaded module {}", touched.module);
        Ok(touched)
    }

    /// Every shared dispatch table, for comparison.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            disableable: self.commands.disableable().into_iter().collect(),
            admin_exempt: self.commands.admin_exempt().into_iter().collect(),
            ..self.modules.snapshot()
        }
    }

    /// Promote a user into a custom tier and persist the change.
    ///
    /// If the store rejects the write the in-memory change is rolled back.
    pub async fn promote(&self, user_id: u64, tier: TrustTier) -> Result<TierChange, GatewayError> {
        let before = self.trust.snapshot();
        let change = self.trust.promote(user_id, tier)?;
        if change.changed()
            && let Err(e) = self.store.save_elevated_users(&self.trust.elevated()).await
        {
            self.trust.replace(before);
            return Err(e.into());
        }
        Ok(change)
    }

    /// Tier a user holds through configuration. Demoting such a user only
    /// lasts until the next restart.
    pub fn configured_tier(&self, user_id: u64) -> Option<TrustTier> {
        self.statics.tier_of(user_id)
    }

    /// Remove a user from a custom tier and persist the change.
    pub async fn demote(&self, user_id: u64, tier: TrustTier) -> Result<bool, GatewayError> {
        let before = self.trust.snapshot();
        let removed = self.trust.demote(user_id, tier)?;
        if removed && let Err(e) = self.store.save_elevated_users(&self.trust.elevated()).await {
            self.trust.replace(before);
            return Err(e.into());
        }
        Ok(removed)
    }

    /// Entry point for a command message from the platform.
    ///
    /// A command sent in a group is still a message: it advances the group's
    /// flood streak, routed or not, before it is dispatched.
    pub async fn receive_command(self: Arc<Self>, ctx: CommandContext) -> DispatchOutcome {
        if ctx.origin.is_group()
            && let Some(message_id) = ctx.message_id
        {
            let event = MessageEvent {
                chat: ctx.origin.clone(),
                user: ctx.user.clone(),
                message_id,
            };
            let verdict = self.observe_message(&event).await;
            if !matches!(verdict, FloodVerdict::Skipped | FloodVerdict::Counted | FloodVerdict::Exempt) {
                debug!("Flood verdict for /{} in chat {}: {:?}", ctx.command, ctx.origin.id, verdict);
            }
        }
        self.dispatch(ctx).await
    }

    /// Run one command through the gateway.
    pub async fn dispatch(self: Arc<Self>, mut ctx: CommandContext) -> DispatchOutcome {
        let Some(entry) = self.modules.route(&ctx.command) else {
            return DispatchOutcome::Unknown;
        };

        let prelude: [&dyn Guard; 2] = [&BlacklistGuard, &AbuseGuard];
        for guard in prelude.into_iter().chain(entry.guards().map(|g| g.as_ref())) {
            if let Err(rejection) = guard.check(&self, &mut ctx).await {
                debug!(
                    "/{} from {} stopped by {} guard: {:?}",
                    ctx.command,
                    ctx.user.id,
                    guard.name(),
                    rejection
                );
                self.apply_rejection(&ctx, rejection).await;
                return DispatchOutcome::Rejected(rejection);
            }
        }

        let command = ctx.command.clone();
        match (entry.handler())(Arc::clone(&self), ctx).await {
            Ok(()) => DispatchOutcome::Handled,
            Err(e) => {
                error!("Handler for /{} failed: {:#}", command, e);
                DispatchOutcome::Failed
            }
        }
    }

    /// Turn a rejection into its user-visible effect.
    pub async fn apply_rejection(&self, ctx: &CommandContext, rejection: Rejection) {
        match rejection {
            Rejection::Silent(_) => {}
            Rejection::Refused(refusal) => {
                if self.settings.del_cmds
                    && !ctx.has_args()
                    && let Some(message_id) = ctx.message_id
                {
                    if let Err(e) = self.api.delete_message(ctx.origin.id, message_id).await {
                        debug!("Could not delete refused command in {}: {}", ctx.origin.id, e);
                    }
                    return;
                }
                let text = refusal.text(self.settings.support_chat.as_deref());
                if let Err(e) = self.reply(ctx, &text).await {
                    debug!("Could not send refusal to {}: {}", ctx.origin.id, e);
                }
            }
            Rejection::Notice(notice) => {
                if let Err(e) = self.reply(ctx, notice.text()).await {
                    warn!("Could not send notice to {}: {}", ctx.origin.id, e);
                }
            }
        }
    }

    /// Reply to a command where it was sent.
    pub async fn reply(&self, ctx: &CommandContext, text: &str) -> Result<(), ApiError> {
        self.api.send_text(ctx.origin.id, text, ctx.message_id).await
    }

    /// Flood accounting for a plain group message.
    pub async fn observe_message(&self, event: &MessageEvent) -> FloodVerdict {
        self.flood.enforce(self, event).await
    }

    /// Move a chat's state to its new id (group upgraded to supergroup).
    pub async fn migrate_chat(&self, old_chat_id: i64, new_chat_id: i64) -> HookReport {
        info!("Migrating chat {} to {}", old_chat_id, new_chat_id);
        self.admins.invalidate(old_chat_id);

        let mut report = Vec::new();
        for module in self.modules.with_hook(HookKind::Migrate) {
            let result = module
                .migrate(self, old_chat_id, new_chat_id)
                .await
                .map_err(|e| format!("{:#}", e));
            if let Err(e) = &result {
                warn!("Migration of {} failed in {}: {}", old_chat_id, module.name(), e);
            }
            report.push((module.name().to_string(), result));
        }
        report
    }

    /// Stats lines of every module exposing them.
    pub async fn stats(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for module in self.modules.with_hook(HookKind::Stats) {
            if let Some(line) = module.stats(self).await {
                lines.push(line);
            }
        }
        lines
    }

    /// Per-module settings summary of a chat.
    pub async fn chat_settings(&self, chat_id: i64, user_id: u64) -> Vec<(String, String)> {
        let mut sections = Vec::new();
        for module in self.modules.with_hook(HookKind::ChatSettings) {
            if let Some(text) = module.chat_settings(self, chat_id, user_id).await {
                sections.push((module.name().to_string(), text));
            }
        }
        sections
    }

    /// Per-module settings summary of a user.
    pub async fn user_settings(&self, user_id: u64) -> Vec<(String, String)> {
        let mut sections = Vec::new();
        for module in self.modules.with_hook(HookKind::UserSettings) {
            if let Some(text) = module.user_settings(self, user_id).await {
                sections.push((module.name().to_string(), text));
            }
        }
        sections
    }

    /// Extra lines about a user contributed by modules.
    pub async fn user_info(&self, user_id: u64) -> Vec<String> {
        let mut lines = Vec::new();
        for module in self.modules.with_hook(HookKind::UserInfo) {
            if let Some(line) = module.user_info(self, user_id).await {
                lines.push(line);
            }
        }
        lines
    }

    /// Export a chat's settings, one sub-document per module.
    pub async fn export_chat(&self, chat_id: i64) -> Document {
        let mut document = Document::new();
        for module in self.modules.with_hook(HookKind::Export) {
            if let Some(data) = module.export(self, chat_id).await {
                document.insert(module.name(), data);
            }
        }
        document
    }

    /// Import a document produced by [`export_chat`](Self::export_chat).
    pub async fn import_chat(&self, chat_id: i64, data: &Document) -> HookReport {
        let mut report = Vec::new();
        for module in self.modules.with_hook(HookKind::Import) {
            let Ok(section) = data.get_document(module.name()) else {
                continue;
            };
            let result = module
                .import(self, chat_id, section)
                .await
                .map_err(|e| format!("{:#}", e));
            report.push((module.name().to_string(), result));
        }
        report
    }

    /// Drop idle abuse windows. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        self.abuse.prune(Instant::now())
    }
}
