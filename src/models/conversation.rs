//! One-on-one conversation records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Kind of 1:1 conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    Performance,
    Career,
    Onboarding,
    Project,
    Difficult,
    #[default]
    Regular,
}

impl ConversationType {
    pub const ALL: [ConversationType; 6] = [
        ConversationType::Performance,
        ConversationType::Career,
        ConversationType::Onboarding,
        ConversationType::Project,
        ConversationType::Difficult,
        ConversationType::Regular,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Performance => "performance",
            ConversationType::Career => "career",
            ConversationType::Onboarding => "onboarding",
            ConversationType::Project => "project",
            ConversationType::Difficult => "difficult",
            ConversationType::Regular => "regular",
        }
    }
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::invalid_record(format!("unknown conversation type: {}", s)))
    }
}

/// Lifecycle status. Transitions are not restricted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Draft,
    Scheduled,
    Completed,
    Cancelled,
}

impl ConversationStatus {
    pub const ALL: [ConversationStatus; 4] = [
        ConversationStatus::Draft,
        ConversationStatus::Scheduled,
        ConversationStatus::Completed,
        ConversationStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Draft => "draft",
            ConversationStatus::Scheduled => "scheduled",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::invalid_record(format!("unknown conversation status: {}", s)))
    }
}

/// A row of `one_on_one_conversations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub employee_name: String,
    #[serde(default)]
    pub employee_role: Option<String>,
    #[serde(default)]
    pub conversation_type: ConversationType,
    #[serde(default)]
    pub conversation_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: ConversationStatus,

    #[serde(default)]
    pub recent_performance: Option<String>,
    #[serde(default)]
    pub conversation_goals: Option<String>,
    #[serde(default)]
    pub concerns: Option<String>,
    #[serde(default)]
    pub additional_context: Option<String>,

    #[serde(default)]
    pub agenda_outline: Option<Value>,
    #[serde(default)]
    pub questions_suggestions: Option<Value>,
    #[serde(default)]
    pub talking_points: Option<Value>,
    #[serde(default)]
    pub potential_responses: Option<Value>,
    #[serde(default)]
    pub advice_recommendations: Option<Value>,
    #[serde(default)]
    pub follow_up_actions: Option<Value>,

    #[serde(default)]
    pub tokens_used: i64,
    #[serde(default)]
    pub ai_model: String,

    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub template_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Check a row received from the backend
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::invalid_record("conversation row without id"));
        }
        if self.user_id.is_empty() {
            return Err(Error::invalid_record(format!(
                "conversation {} has no owner",
                self.id
            )));
        }
        if self.tokens_used < 0 {
            return Err(Error::invalid_record(format!(
                "conversation {} has negative tokens_used {}",
                self.id, self.tokens_used
            )));
        }
        if self.created_at > self.updated_at {
            return Err(Error::invalid_record(format!(
                "conversation {} was updated before it was created",
                self.id
            )));
        }
        Ok(())
    }
}

/// Fields accepted when creating a conversation; unset fields take the
/// schema defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewConversation {
    pub user_id: String,
    pub title: String,
    pub employee_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_type: Option<ConversationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConversationStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_performance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_goals: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concerns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agenda_outline: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions_suggestions: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub talking_points: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_responses: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice_recommendations: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_actions: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_template: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
}

impl NewConversation {
    pub fn new(user_id: &str, title: &str, employee_name: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: title.to_string(),
            employee_name: employee_name.to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::invalid_record("user_id is required"));
        }
        if self.title.trim().is_empty() {
            return Err(Error::invalid_record("title is required"));
        }
        if self.employee_name.trim().is_empty() {
            return Err(Error::invalid_record("employee_name is required"));
        }
        check_tokens(self.tokens_used)
    }
}

/// Partial update of a conversation. `id` and `user_id` cannot change.
///
/// Nullable columns are `Option<Option<_>>`: `None` leaves the column
/// alone, `Some(None)` sets it to null.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_role: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_type: Option<ConversationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConversationStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_performance: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_goals: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concerns: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agenda_outline: Option<Option<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions_suggestions: Option<Option<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub talking_points: Option<Option<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_responses: Option<Option<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice_recommendations: Option<Option<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_actions: Option<Option<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_template: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl ConversationUpdate {
    pub fn status(status: ConversationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if *self == Self::default() {
            return Err(Error::invalid_record("update has no fields"));
        }
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err(Error::invalid_record("title cannot be blank"));
        }
        if matches!(&self.employee_name, Some(name) if name.trim().is_empty()) {
            return Err(Error::invalid_record("employee_name cannot be blank"));
        }
        check_tokens(self.tokens_used)
    }
}

fn check_tokens(tokens_used: Option<i64>) -> Result<()> {
    match tokens_used {
        Some(tokens) if tokens < 0 => Err(Error::invalid_record(format!(
            "tokens_used must be non-negative, got {}",
            tokens
        ))),
        _ => Ok(()),
    }
}

/// Narrowing for conversation listings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationFilter {
    pub status: Option<ConversationStatus>,
    pub conversation_type: Option<ConversationType>,
    /// Case-insensitive match on title or employee name
    pub search: Option<String>,
}

/// Counts shown above a conversation list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    pub total: usize,
    pub draft: usize,
    pub scheduled: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub tokens_used: i64,
}

impl ConversationSummary {
    pub fn from_records(records: &[Conversation]) -> Self {
        records.iter().fold(Self::default(), |mut summary, record| {
            summary.total += 1;
            summary.tokens_used += record.tokens_used;
            match record.status {
                ConversationStatus::Draft => summary.draft += 1,
                ConversationStatus::Scheduled => summary.scheduled += 1,
                ConversationStatus::Completed => summary.completed += 1,
                ConversationStatus::Cancelled => summary.cancelled += 1,
            }
            summary
        })
    }
}
