use chrono::Utc;
use log::debug;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::tables::CONVERSATIONS;
use crate::models::{
    Conversation, ConversationFilter, ConversationStatus, ConversationUpdate, NewConversation,
};
use crate::postgrest::SortOrder;
use crate::queries::decode_row;
use crate::Backend;

const ENTITY: &str = "conversation";

/// CRUD for `one_on_one_conversations`
pub struct ConversationQueries<'a> {
    backend: &'a Backend,
}

impl<'a> ConversationQueries<'a> {
    pub(crate) fn new(backend: &'a Backend) -> Self {
        Self { backend }
    }

    /// All conversations of one owner, newest first
    pub async fn list_by_owner(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.list(user_id, &ConversationFilter::default()).await
    }

    /// Conversations of one owner narrowed by `filter`, newest first
    pub async fn list(&self, user_id: &str, filter: &ConversationFilter) -> Result<Vec<Conversation>> {
        let mut query = self
            .backend
            .from(CONVERSATIONS)
            .await?
            .select("*")
            .eq("user_id", user_id);

        if let Some(status) = filter.status {
            query = query.eq("status", status.as_str());
        }
        if let Some(conversation_type) = filter.conversation_type {
            query = query.eq("conversation_type", conversation_type.as_str());
        }
        if let Some(pattern) = filter.search.as_deref().and_then(search_pattern) {
            query = query.or(&format!(
                "title.ilike.{p},employee_name.ilike.{p}",
                p = pattern
            ));
        }

        let rows = query
            .order("created_at", SortOrder::Descending)
            .execute::<Conversation>()
            .await?;
        validated(rows)
    }

    /// Conversations saved as templates, newest first
    pub async fn list_templates(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let rows = self
            .backend
            .from(CONVERSATIONS)
            .await?
            .select("*")
            .eq("user_id", user_id)
            .eq("is_template", "true")
            .order("created_at", SortOrder::Descending)
            .execute::<Conversation>()
            .await?;
        validated(rows)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Conversation> {
        let conversation = self
            .backend
            .from(CONVERSATIONS)
            .await?
            .select("*")
            .eq("id", id)
            .execute_single::<Conversation>()
            .await
            .map_err(|e| Error::from_lookup(e, ENTITY, id))?;

        conversation.validate()?;
        Ok(conversation)
    }

    /// Insert one conversation and return it as stored
    pub async fn create(&self, conversation: &NewConversation) -> Result<Conversation> {
        conversation.validate()?;

        let value = self
            .backend
            .from(CONVERSATIONS)
            .await?
            .single()
            .insert(conversation)
            .await?;

        let created: Conversation = decode_row(value)?;
        created.validate()?;
        debug!("created conversation {} for {}", created.id, created.user_id);
        Ok(created)
    }

    pub async fn update(&self, id: &str, changes: &ConversationUpdate) -> Result<Conversation> {
        changes.validate()?;

        let value = self
            .backend
            .from(CONVERSATIONS)
            .await?
            .eq("id", id)
            .single()
            .update(changes)
            .await
            .map_err(|e| Error::from_lookup(e, ENTITY, id))?;

        let updated: Conversation = decode_row(value)?;
        updated.validate()?;
        Ok(updated)
    }

    /// Mark a conversation completed now
    pub async fn complete(&self, id: &str) -> Result<Conversation> {
        let changes = ConversationUpdate {
            completed_at: Some(Some(Utc::now())),
            ..ConversationUpdate::status(ConversationStatus::Completed)
        };
        self.update(id, &changes).await
    }

    /// Delete one conversation; deleting a missing row is [`Error::NotFound`]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let removed = self
            .backend
            .from(CONVERSATIONS)
            .await?
            .eq("id", id)
            .delete()
            .await?;

        match removed {
            Value::Array(rows) if rows.is_empty() => Err(Error::NotFound {
                entity: ENTITY,
                key: id.to_string(),
            }),
            _ => {
                debug!("deleted conversation {}", id);
                Ok(())
            }
        }
    }
}

fn validated(rows: Vec<Conversation>) -> Result<Vec<Conversation>> {
    rows.iter().try_for_each(Conversation::validate)?;
    Ok(rows)
}

/// `*term*` with the characters that carry meaning in a PostgREST
/// logic tree removed; `None` for a blank term.
fn search_pattern(term: &str) -> Option<String> {
    let cleaned: String = term
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '"' | '\\'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(format!("*{}*", cleaned))
    }
}
