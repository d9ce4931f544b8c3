//! Usage reporting rows

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// A row of the `daily_usage_stats` view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyUsageStats {
    pub usage_date: Option<NaiveDate>,
    pub active_users: Option<i64>,
    pub total_requests: Option<i64>,
    pub total_tokens: Option<i64>,
    pub total_cost: Option<f64>,
}

/// Result of `get_user_usage_stats(p_user_id)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUsageStats {
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_conversations: i64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_okrs: i64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_mood_analyses: i64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_tokens_used: i64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub current_month_cost: f64,
}

/// Aggregates over no rows come back as `null`
fn null_as_zero<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
