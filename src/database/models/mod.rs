//! Document models.

pub mod antiflood;
pub mod connection;
pub mod disabled;
pub mod staff;

pub use antiflood::{Approval, FloodPenalty, FloodSettings};
pub use connection::{Connection, ConnectionAccess, ConnectionHistory, HistoryEntry, CONNECTION_HISTORY_LIMIT};
pub use disabled::DisabledCommand;
pub use staff::{BlacklistedUser, ElevatedUsers};
