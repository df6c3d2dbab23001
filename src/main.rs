use std::sync::Arc;
use std::time::Duration;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use warden::bot::{self, TelegramApi};
use warden::config::Config;
use warden::database::{Database, GatewayStore, MemoryStore, MongoStore};
use warden::gateway::{Gateway, GatewayError};
use warden::plugins;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// How often idle abuse windows are dropped.
const PRUNE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Default to info for our crate when RUST_LOG is not set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warden=info,teloxide=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Warden...");

    let config = Config::from_env()?;
    info!("Configuration loaded, bot mode: {:?}", config.bot_mode);

    // Throttle respects Telegram's global and per-chat send limits
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());
    let me = bot.get_me().await?;
    let bot_username = config
        .bot_username
        .clone()
        .unwrap_or_else(|| me.username().to_string());
    info!("Using bot username: @{}", bot_username);

    let store: Arc<dyn GatewayStore> = match &config.mongodb_uri {
        Some(uri) => {
            info!("Connecting to MongoDB...");
            let db = Database::connect(uri, &config.mongodb_database).await?;
            let store = MongoStore::new(&db);
            store.ensure_indexes().await?;
            info!("Database connected");
            Arc::new(store)
        }
        None => {
            warn!("MONGODB_URI not set, state will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let gateway = Arc::new(Gateway::new(
        config.gateway_settings(&bot_username),
        config.tiers.clone(),
        Arc::new(TelegramApi::new(bot.clone())),
        store,
        plugins::catalog(),
    ));
    gateway.hydrate().await?;

    for module in gateway.modules().available() {
        if config.no_load.contains(&module) && !gateway.modules().is_essential(&module) {
            info!("Not loading module {}", module);
            continue;
        }
        match gateway.load_module(&module) {
            Ok(_) | Err(GatewayError::ModuleAlreadyLoaded(_)) => {}
            Err(e) => warn!("Could not load module {}: {}", module, e),
        }
    }
    info!("Loaded modules: {}", gateway.modules().loaded().join(", "));

    let pruner = Arc::clone(&gateway);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            let dropped = pruner.prune();
            if dropped > 0 {
                debug!("Dropped {} idle abuse windows", dropped);
            }
        }
    });

    let dispatcher = bot::build_dispatcher(bot.clone(), gateway, bot_username);
    bot::run(&config, bot, dispatcher).await
}
