use serde_json::json;

use crate::error::Result;
use crate::models::tables::{DAILY_USAGE_STATS, USER_USAGE_STATS_FN};
use crate::models::{DailyUsageStats, UserUsageStats};
use crate::postgrest::SortOrder;
use crate::Backend;

/// Usage reporting: the per-user stats function and the daily view
pub struct UsageQueries<'a> {
    backend: &'a Backend,
}

impl<'a> UsageQueries<'a> {
    pub(crate) fn new(backend: &'a Backend) -> Self {
        Self { backend }
    }

    /// Totals for one user; all zero when the function returns no row
    pub async fn user_stats(&self, user_id: &str) -> Result<UserUsageStats> {
        let rows = self
            .backend
            .rpc(USER_USAGE_STATS_FN, json!({ "p_user_id": user_id }))
            .await?
            .call_rpc::<Vec<UserUsageStats>>()
            .await?;

        Ok(rows.into_iter().next().unwrap_or_default())
    }

    /// The most recent `days` rows of the daily usage view, newest first
    pub async fn daily(&self, days: u32) -> Result<Vec<DailyUsageStats>> {
        let rows = self
            .backend
            .from(DAILY_USAGE_STATS)
            .await?
            .select("*")
            .order("usage_date", SortOrder::Descending)
            .limit(days)
            .execute::<DailyUsageStats>()
            .await?;
        Ok(rows)
    }
}
