//! Runtime module registry.
//!
//! A feature module declares its dispatch entries, help text and optional
//! hooks. Attaching a module writes them into the shared tables and returns
//! the exact keys it touched; detaching removes exactly those keys again.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::Document;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::error::GatewayError;
use super::middleware::DispatchEntry;
use super::Gateway;

/// Optional capabilities a module can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookKind {
    Help,
    Migrate,
    Stats,
    UserInfo,
    Import,
    Export,
    ChatSettings,
    UserSettings,
}

impl HookKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Help => "help",
            Self::Migrate => "migrate",
            Self::Stats => "stats",
            Self::UserInfo => "user info",
            Self::Import => "import",
            Self::Export => "export",
            Self::ChatSettings => "chat settings",
            Self::UserSettings => "user settings",
        }
    }
}

/// A feature the gateway can load and unload at runtime.
///
/// Hook methods are only called when [`hooks`](Self::hooks) lists them.
#[async_trait]
pub trait FeatureModule: Send + Sync {
    fn name(&self) -> &'static str;

    fn help(&self) -> Option<&'static str> {
        None
    }

    /// Essential modules cannot be unloaded.
    fn essential(&self) -> bool {
        false
    }

    fn entries(&self) -> Vec<DispatchEntry>;

    /// Hooks besides help (which is derived from [`help`](Self::help)).
    fn hooks(&self) -> &'static [HookKind] {
        &[]
    }

    async fn migrate(&self, _gw: &Gateway, _old_chat_id: i64, _new_chat_id: i64) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stats(&self, _gw: &Gateway) -> Option<String> {
        None
    }

    async fn user_info(&self, _gw: &Gateway, _user_id: u64) -> Option<String> {
        None
    }

    async fn export(&self, _gw: &Gateway, _chat_id: i64) -> Option<Document> {
        None
    }

    async fn import(&self, _gw: &Gateway, _chat_id: i64, _data: &Document) -> anyhow::Result<()> {
        Ok(())
    }

    async fn chat_settings(&self, _gw: &Gateway, _chat_id: i64, _user_id: u64) -> Option<String> {
        None
    }

    async fn user_settings(&self, _gw: &Gateway, _user_id: u64) -> Option<String> {
        None
    }
}

/// Keys written by one attach (and removed by the matching detach).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TouchedKeys {
    pub module: String,
    pub routes: Vec<String>,
    pub hooks: Vec<HookKind>,
    /// Commands registered as disableable, with their admin-exempt flag.
    pub disableable: Vec<(String, bool)>,
}

impl fmt::Display for TouchedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks: Vec<&str> = self.hooks.iter().map(|h| h.label()).collect();
        write!(
            f,
            "{}: {} commands, {} disableable, hooks [{}]",
            self.module,
            self.routes.len(),
            self.disableable.len(),
            hooks.join(", ")
        )
    }
}

#[derive(Clone)]
struct Route {
    module: String,
    entry: Arc<DispatchEntry>,
}

/// Comparable copy of every shared table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistrySnapshot {
    pub loaded: BTreeSet<String>,
    pub routes: BTreeMap<String, String>,
    pub hooks: BTreeMap<HookKind, BTreeSet<String>>,
    pub disableable: BTreeSet<String>,
    pub admin_exempt: BTreeSet<String>,
}

#[derive(Default)]
struct Tables {
    loaded: BTreeMap<String, Arc<dyn FeatureModule>>,
    routes: BTreeMap<String, Route>,
    hooks: BTreeMap<HookKind, BTreeSet<String>>,
}

pub struct ModuleRegistry {
    catalog: BTreeMap<String, Arc<dyn FeatureModule>>,
    tables: RwLock<Tables>,
}

/// Lower-cased, trimmed module name.
pub fn normalize_module(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ModuleRegistry {
    /// A registry that can load any module in `catalog`.
    pub fn new(catalog: Vec<Arc<dyn FeatureModule>>) -> Self {
        Self {
            catalog: catalog
                .into_iter()
                .map(|m| (normalize_module(m.name()), m))
                .collect(),
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Every module that can be loaded, sorted.
    pub fn available(&self) -> Vec<String> {
        self.catalog.keys().cloned().collect()
    }

    /// Loaded modules, sorted.
    pub fn loaded(&self) -> Vec<String> {
        self.tables.read().loaded.keys().cloned().collect()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.tables.read().loaded.contains_key(&normalize_module(name))
    }

    /// Whether a catalog module refuses to be unloaded.
    pub fn is_essential(&self, name: &str) -> bool {
        self.catalog
            .get(&normalize_module(name))
            .is_some_and(|m| m.essential())
    }

    pub fn module(&self, name: &str) -> Option<Arc<dyn FeatureModule>> {
        self.tables.read().loaded.get(&normalize_module(name)).cloned()
    }

    /// Loaded modules exposing `hook`, in name order.
    pub fn with_hook(&self, hook: HookKind) -> Vec<Arc<dyn FeatureModule>> {
        let tables = self.tables.read();
        tables
            .hooks
            .get(&hook)
            .map(|names| names.iter().filter_map(|n| tables.loaded.get(n).cloned()).collect())
            .unwrap_or_default()
    }

    /// Entry routed for a command name.
    pub fn route(&self, command: &str) -> Option<Arc<DispatchEntry>> {
        self.tables.read().routes.get(command).map(|r| Arc::clone(&r.entry))
    }

    /// Module owning a command.
    pub fn owner_of(&self, command: &str) -> Option<String> {
        self.tables.read().routes.get(command).map(|r| r.module.clone())
    }

    /// Commands routed to a module, sorted.
    pub fn commands_of(&self, name: &str) -> Vec<String> {
        let name = normalize_module(name);
        self.tables
            .read()
            .routes
            .iter()
            .filter(|(_, r)| r.module == name)
            .map(|(c, _)| c.clone())
            .collect()
    }

    /// Help text of a loaded module.
    pub fn help(&self, name: &str) -> Option<&'static str> {
        let tables = self.tables.read();
        let name = normalize_module(name);
        if !tables.hooks.get(&HookKind::Help).is_some_and(|s| s.contains(&name)) {
            return None;
        }
        tables.loaded.get(&name).and_then(|m| m.help())
    }

    /// Attach a module from the catalog.
    ///
    /// All checks run before anything is written: a rejected attach leaves
    /// the tables untouched.
    pub fn attach(&self, name: &str) -> Result<TouchedKeys, GatewayError> {
        let name = normalize_module(name);
        let module = self
            .catalog
            .get(&name)
            .cloned()
            .ok_or_else(|| GatewayError::ModuleNotFound(name.clone()))?;

        let entries = module.entries();
        let mut tables = self.tables.write();
        if tables.loaded.contains_key(&name) {
            return Err(GatewayError::ModuleAlreadyLoaded(name));
        }

        let mut seen = BTreeSet::new();
        for command in entries.iter().flat_map(|e| e.commands()) {
            if let Some(route) = tables.routes.get(command) {
                return Err(GatewayError::CommandConflict {
                    command: command.clone(),
                    owner: route.module.clone(),
                });
            }
            if !seen.insert(command.clone()) {
                return Err(GatewayError::CommandConflict {
                    command: command.clone(),
                    owner: name.clone(),
                });
            }
        }

        let mut touched = TouchedKeys {
            module: name.clone(),
            ..Default::default()
        };
        for entry in entries {
            let entry = Arc::new(entry);
            for command in entry.commands() {
                tables.routes.insert(
                    command.clone(),
                    Route {
                        module: name.clone(),
                        entry: Arc::clone(&entry),
                    },
                );
                touched.routes.push(command.clone());
                if entry.is_disableable() {
                    touched.disableable.push((command.clone(), entry.is_admin_exempt()));
                }
            }
        }

        let mut hooks: Vec<HookKind> = module.hooks().to_vec();
        if module.help().is_some() {
            hooks.push(HookKind::Help);
        }
        hooks.sort();
        hooks.dedup();
        for hook in &hooks {
            tables.hooks.entry(*hook).or_default().insert(name.clone());
        }
        touched.hooks = hooks;

        tables.loaded.insert(name.clone(), module);
        info!("Attached module {}", touched);
        Ok(touched)
    }

    /// Detach a loaded module, removing every key its attach wrote.
    pub fn detach(&self, name: &str) -> Result<TouchedKeys, GatewayError> {
        let name = normalize_module(name);
        let mut tables = self.tables.write();
        let module = tables
            .loaded
            .get(&name)
            .cloned()
            .ok_or_else(|| GatewayError::ModuleNotLoaded(name.clone()))?;
        if module.essential() {
            return Err(GatewayError::EssentialModule(name));
        }

        let mut touched = TouchedKeys {
            module: name.clone(),
            ..Default::default()
        };

        let owned: Vec<String> = tables
            .routes
            .iter()
            .filter(|(_, r)| r.module == name)
            .map(|(c, _)| c.clone())
            .collect();
        for command in owned {
            if let Some(route) = tables.routes.remove(&command) {
                if route.entry.is_disableable() {
                    touched.disableable.push((command.clone(), route.entry.is_admin_exempt()));
                }
                touched.routes.push(command);
            }
        }

        for (hook, names) in tables.hooks.iter_mut() {
            if names.remove(&name) {
                touched.hooks.push(*hook);
            }
        }
        tables.hooks.retain(|_, names| !names.is_empty());

        tables.loaded.remove(&name);
        debug!("Detached module {}", touched);
        Ok(touched)
    }

    /// Snapshot of the registry's own tables (disable sets left empty).
    pub fn snapshot(&self) -> RegistrySnapshot {
        let tables = self.tables.read();
        RegistrySnapshot {
            loaded: tables.loaded.keys().cloned().collect(),
            routes: tables
                .routes
                .iter()
                .map(|(c, r)| (c.clone(), r.module.clone()))
                .collect(),
            hooks: tables.hooks.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::context::CommandContext;
    use crate::gateway::middleware::handler;

    async fn noop(_gw: Arc<Gateway>, _ctx: CommandContext) -> anyhow::Result<()> {
        Ok(())
    }

    struct Notes;

    #[async_trait]
    impl FeatureModule for Notes {
        fn name(&self) -> &'static str {
            "Notes"
        }

        fn help(&self) -> Option<&'static str> {
            Some("save things")
        }

        fn hooks(&self) -> &'static [HookKind] {
            &[HookKind::Migrate, HookKind::Stats]
        }

        fn entries(&self) -> Vec<DispatchEntry> {
            vec![
                DispatchEntry::new(&["get"], handler(noop)).disableable(),
                DispatchEntry::new(&["save", "note"], handler(noop)).admin_only(),
            ]
        }
    }

    struct Clash;

    #[async_trait]
    impl FeatureModule for Clash {
        fn name(&self) -> &'static str {
            "clash"
        }

        fn entries(&self) -> Vec<DispatchEntry> {
            vec![DispatchEntry::new(&["ping"], handler(noop)), DispatchEntry::new(&["get"], handler(noop))]
        }
    }

    struct Core;

    #[async_trait]
    impl FeatureModule for Core {
        fn name(&self) -> &'static str {
            "core"
        }

        fn essential(&self) -> bool {
            true
        }

        fn entries(&self) -> Vec<DispatchEntry> {
            vec![DispatchEntry::new(&["load"], handler(noop))]
        }
    }

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new(vec![Arc::new(Notes), Arc::new(Clash), Arc::new(Core)])
    }

    #[test]
    fn attach_then_detach_restores_every_table() {
        let registry = registry();
        registry.attach("core").unwrap();
        let before = registry.snapshot();

        let attached = registry.attach(" NOTES ").unwrap();
        assert_eq!(attached.routes, vec!["get", "save", "note"]);
        assert_eq!(attached.hooks, vec![HookKind::Help, HookKind::Migrate, HookKind::Stats]);
        assert_eq!(attached.disableable, vec![("get".to_string(), false)]);
        assert_eq!(registry.help("notes"), Some("save things"));
        assert_eq!(registry.owner_of("note").as_deref(), Some("notes"));
        assert_ne!(registry.snapshot(), before);

        let detached = registry.detach("notes").unwrap();
        assert_eq!(registry.snapshot(), before);

        let mut a = attached.routes.clone();
        let mut d = detached.routes.clone();
        a.sort();
        d.sort();
        assert_eq!(a, d);
        assert_eq!(attached.hooks, detached.hooks);
        assert!(registry.route("get").is_none());
        assert!(registry.help("notes").is_none());
    }

    #[test]
    fn duplicate_load_is_rejected() {
        let registry = registry();
        registry.attach("notes").unwrap();
        assert!(matches!(registry.attach("Notes"), Err(GatewayError::ModuleAlreadyLoaded(n)) if n == "notes"));
    }

    #[test]
    fn command_collisions_leave_tables_untouched() {
        let registry = registry();
        registry.attach("notes").unwrap();
        let before = registry.snapshot();

        match registry.attach("clash") {
            Err(GatewayError::CommandConflict { command, owner }) => {
                assert_eq!(command, "get");
                assert_eq!(owner, "notes");
            }
            other => panic!("unexpected {:?}", other.map(|t| t.module)),
        }
        assert_eq!(registry.snapshot(), before);
        assert!(registry.route("ping").is_none());
    }

    #[test]
    fn unknown_and_essential_modules() {
        let registry = registry();
        assert!(matches!(registry.attach("nope"), Err(GatewayError::ModuleNotFound(_))));
        assert!(matches!(registry.detach("notes"), Err(GatewayError::ModuleNotLoaded(_))));

        assert!(registry.is_essential("Core"));
        assert!(!registry.is_essential("notes"));
        registry.attach("core").unwrap();
        assert!(matches!(registry.detach("core"), Err(GatewayError::EssentialModule(_))));
        assert!(registry.is_loaded("core"));
    }

    #[test]
    fn hook_lookup_follows_load_state() {
        let registry = registry();
        assert!(registry.with_hook(HookKind::Stats).is_empty());
        registry.attach("notes").unwrap();
        assert_eq!(registry.with_hook(HookKind::Stats).len(), 1);
        assert!(registry.with_hook(HookKind::Export).is_empty());
        assert_eq!(registry.available(), vec!["clash", "core", "notes"]);
    }
}
