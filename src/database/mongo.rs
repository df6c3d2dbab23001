//! MongoDB database wrapper and store implementation.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, IndexOptions, ReplaceOptions, UpdateOptions};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::models::{
    Approval, BlacklistedUser, Connection, ConnectionAccess, ConnectionHistory, DisabledCommand, ElevatedUsers,
    FloodSettings, HistoryEntry,
};
use super::store::{GatewayStore, StoreResult};

/// Database wrapper for MongoDB operations.
#[derive(Debug, Clone)]
pub struct Database {
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB with the given URI and database name.
    ///
    /// # Errors
    /// Returns error if connection or the initial ping fails.
    pub async fn connect(uri: &str, db_name: &str) -> StoreResult<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        Ok(Self {
            db: client.database(db_name),
        })
    }

    /// Get a typed collection from the database.
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}

/// The single elevated-users document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ElevatedDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(flatten)]
    users: ElevatedUsers,
}

const ELEVATED_ID: &str = "tiers";

/// [`GatewayStore`] backed by MongoDB collections.
pub struct MongoStore {
    disabled: Collection<DisabledCommand>,
    flood: Collection<FloodSettings>,
    approvals: Collection<Approval>,
    connections: Collection<Connection>,
    history: Collection<ConnectionHistory>,
    access: Collection<ConnectionAccess>,
    elevated: Collection<ElevatedDocument>,
    blacklist: Collection<BlacklistedUser>,
}

impl MongoStore {
    pub fn new(db: &Database) -> Self {
        Self {
            disabled: db.collection("disabled_commands"),
            flood: db.collection("flood_settings"),
            approvals: db.collection("approvals"),
            connections: db.collection("connections"),
            history: db.collection("connection_history"),
            access: db.collection("connection_access"),
            elevated: db.collection("elevated_users"),
            blacklist: db.collection("blacklisted_users"),
        }
    }

    /// Create the unique indexes the store relies on.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.disabled
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "chat_id": 1, "command": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.flood
            .create_index(IndexModel::builder().keys(doc! { "chat_id": 1 }).options(unique()).build())
            .await?;
        self.approvals
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "chat_id": 1, "user_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.connections
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1 }).options(unique()).build())
            .await?;
        self.history
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1 }).options(unique()).build())
            .await?;
        self.access
            .create_index(IndexModel::builder().keys(doc! { "chat_id": 1 }).options(unique()).build())
            .await?;
        self.blacklist
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1 }).options(unique()).build())
            .await?;

        debug!("MongoDB indexes ensured");
        Ok(())
    }
}

fn upsert() -> ReplaceOptions {
    ReplaceOptions::builder().upsert(true).build()
}

#[async_trait]
impl GatewayStore for MongoStore {
    async fn disabled_commands(&self) -> StoreResult<Vec<DisabledCommand>> {
        Ok(self.disabled.find(doc! {}).await?.try_collect().await?)
    }

    async fn disable_command(&self, chat_id: i64, command: &str) -> StoreResult<bool> {
        let result = self
            .disabled
            .update_one(
                doc! { "chat_id": chat_id, "command": command },
                doc! { "$setOnInsert": { "chat_id": chat_id, "command": command } },
            )
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await?;
        Ok(result.upserted_id.is_some())
    }

    async fn enable_command(&self, chat_id: i64, command: &str) -> StoreResult<bool> {
        let result = self
            .disabled
            .delete_one(doc! { "chat_id": chat_id, "command": command })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn migrate_disabled(&self, old_chat_id: i64, new_chat_id: i64) -> StoreResult<()> {
        self.disabled
            .update_many(doc! { "chat_id": old_chat_id }, doc! { "$set": { "chat_id": new_chat_id } })
            .await?;
        Ok(())
    }

    async fn flood_settings(&self) -> StoreResult<Vec<FloodSettings>> {
        Ok(self.flood.find(doc! {}).await?.try_collect().await?)
    }

    async fn save_flood_settings(&self, settings: &FloodSettings) -> StoreResult<()> {
        self.flood
            .replace_one(doc! { "chat_id": settings.chat_id }, settings)
            .with_options(upsert())
            .await?;
        debug!("Saved flood settings for chat {}", settings.chat_id);
        Ok(())
    }

    async fn migrate_flood(&self, old_chat_id: i64, new_chat_id: i64) -> StoreResult<()> {
        self.flood
            .update_many(doc! { "chat_id": old_chat_id }, doc! { "$set": { "chat_id": new_chat_id } })
            .await?;
        self.approvals
            .update_many(doc! { "chat_id": old_chat_id }, doc! { "$set": { "chat_id": new_chat_id } })
            .await?;
        Ok(())
    }

    async fn approvals(&self) -> StoreResult<Vec<Approval>> {
        Ok(self.approvals.find(doc! {}).await?.try_collect().await?)
    }

    async fn approve(&self, chat_id: i64, user_id: u64) -> StoreResult<bool> {
        let user_id = user_id as i64;
        let result = self
            .approvals
            .update_one(
                doc! { "chat_id": chat_id, "user_id": user_id },
                doc! { "$setOnInsert": { "chat_id": chat_id, "user_id": user_id } },
            )
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await?;
        Ok(result.upserted_id.is_some())
    }

    async fn unapprove(&self, chat_id: i64, user_id: u64) -> StoreResult<bool> {
        let result = self
            .approvals
            .delete_one(doc! { "chat_id": chat_id, "user_id": user_id as i64 })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn connections(&self) -> StoreResult<Vec<Connection>> {
        Ok(self.connections.find(doc! {}).await?.try_collect().await?)
    }

    async fn save_connection(&self, connection: Connection) -> StoreResult<()> {
        self.connections
            .replace_one(doc! { "user_id": connection.user_id }, connection)
            .with_options(upsert())
            .await?;
        Ok(())
    }

    async fn delete_connection(&self, user_id: u64) -> StoreResult<bool> {
        let result = self
            .connections
            .delete_one(doc! { "user_id": user_id as i64 })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn connection_history(&self, user_id: u64) -> StoreResult<Vec<HistoryEntry>> {
        let history = self.history.find_one(doc! { "user_id": user_id as i64 }).await?;
        Ok(history.map(|h| h.entries).unwrap_or_default())
    }

    async fn save_connection_history(&self, user_id: u64, entries: &[HistoryEntry]) -> StoreResult<()> {
        let history = ConnectionHistory {
            user_id: user_id as i64,
            entries: entries.to_vec(),
        };
        self.history
            .replace_one(doc! { "user_id": history.user_id }, &history)
            .with_options(upsert())
            .await?;
        Ok(())
    }

    async fn connection_access(&self) -> StoreResult<Vec<ConnectionAccess>> {
        Ok(self.access.find(doc! {}).await?.try_collect().await?)
    }

    async fn set_connection_access(&self, access: ConnectionAccess) -> StoreResult<()> {
        self.access
            .replace_one(doc! { "chat_id": access.chat_id }, access)
            .with_options(upsert())
            .await?;
        Ok(())
    }

    async fn migrate_connections(&self, old_chat_id: i64, new_chat_id: i64) -> StoreResult<()> {
        self.connections
            .update_many(doc! { "chat_id": old_chat_id }, doc! { "$set": { "chat_id": new_chat_id } })
            .await?;
        self.access
            .update_many(doc! { "chat_id": old_chat_id }, doc! { "$set": { "chat_id": new_chat_id } })
            .await?;
        Ok(())
    }

    async fn elevated_users(&self) -> StoreResult<ElevatedUsers> {
        let found = self.elevated.find_one(doc! { "_id": ELEVATED_ID }).await?;
        Ok(found.map(|d| d.users).unwrap_or_default())
    }

    async fn save_elevated_users(&self, users: &ElevatedUsers) -> StoreResult<()> {
        let document = ElevatedDocument {
            id: ELEVATED_ID.to_string(),
            users: users.clone(),
        };
        self.elevated
            .replace_one(doc! { "_id": ELEVATED_ID }, &document)
            .with_options(upsert())
            .await?;
        Ok(())
    }

    async fn blacklisted_users(&self) -> StoreResult<Vec<BlacklistedUser>> {
        Ok(self.blacklist.find(doc! {}).await?.try_collect().await?)
    }

    async fn blacklist_user(&self, entry: &BlacklistedUser) -> StoreResult<()> {
        self.blacklist
            .replace_one(doc! { "user_id": entry.user_id }, entry)
            .with_options(upsert())
            .await?;
        Ok(())
    }

    async fn unblacklist_user(&self, user_id: u64) -> StoreResult<bool> {
        let result = self
            .blacklist
            .delete_one(doc! { "user_id": user_id as i64 })
            .await?;
        Ok(result.deleted_count > 0)
    }
}
