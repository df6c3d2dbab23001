//! Database module exports.

mod memory;
mod models;
mod mongo;
mod store;

pub use memory::MemoryStore;
pub use models::*;
pub use mongo::{Database, MongoStore};
pub use store::{GatewayStore, StoreError, StoreResult};
