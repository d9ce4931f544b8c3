//! Typed rows of the backend schema

mod conversation;
mod profile;
mod usage;

pub use conversation::*;
pub use profile::*;
pub use usage::*;

/// Table and view names
pub mod tables {
    pub const CONVERSATIONS: &str = "one_on_one_conversations";
    pub const USER_PROFILES: &str = "user_profiles";
    pub const DAILY_USAGE_STATS: &str = "daily_usage_stats";
    pub const USER_USAGE_STATS_FN: &str = "get_user_usage_stats";
}
