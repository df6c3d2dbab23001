//! Rate guards: the global abuse detector and per-group flood control.

mod abuse;
mod flood;

pub use abuse::{AbuseKey, GlobalAbuseGuard, ABUSE_WINDOWS};
pub use flood::{describe_penalty, restriction_for, FloodGuard, FloodState, FloodVerdict, DEFAULT_COUNT};
