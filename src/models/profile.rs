//! User profile records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub const DEFAULT_SUBSCRIPTION_TIER: &str = "free";
pub const DEFAULT_SUBSCRIPTION_STATUS: &str = "active";
/// Credits granted once, when the profile is first created
pub const STARTING_CREDITS: i64 = 10;

/// A row of `user_profiles`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub team_size: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    pub subscription_tier: String,
    pub subscription_status: String,
    #[serde(default)]
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub credits_balance: i64,
    #[serde(default)]
    pub settings: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() || self.user_id.is_empty() {
            return Err(Error::invalid_record("profile row without id or user_id"));
        }
        if self.created_at > self.updated_at {
            return Err(Error::invalid_record(format!(
                "profile {} was updated before it was created",
                self.id
            )));
        }
        Ok(())
    }
}

/// Insert payload used by get-or-create
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUserProfile {
    pub user_id: String,
    pub email: String,
    pub subscription_tier: String,
    pub subscription_status: String,
    pub credits_balance: i64,
}

impl NewUserProfile {
    pub fn with_defaults(user_id: &str, email: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            subscription_tier: DEFAULT_SUBSCRIPTION_TIER.to_string(),
            subscription_status: DEFAULT_SUBSCRIPTION_STATUS.to_string(),
            credits_balance: STARTING_CREDITS,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::invalid_record("user_id is required"));
        }
        if self.email.trim().is_empty() {
            return Err(Error::invalid_record("email is required"));
        }
        Ok(())
    }
}

/// Partial update of a profile. `user_id` cannot change.
///
/// As with [`crate::models::ConversationUpdate`], `Some(None)` clears a
/// nullable column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_size: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_ends_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Map<String, Value>>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<()> {
        if *self == Self::default() {
            return Err(Error::invalid_record("update has no fields"));
        }
        if matches!(self.credits_balance, Some(credits) if credits < 0) {
            return Err(Error::invalid_record("credits_balance cannot be negative"));
        }
        Ok(())
    }
}
