use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::Message;

/// One chat thread as it is persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Message>,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// New empty conversation; the id is its creation timestamp.
    pub fn new<S: Into<String>>(model: S) -> Self {
        let now = Utc::now();
        Self {
            id: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            messages: Vec::new(),
            model: model.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.updated_at = Utc::now();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Short label for listings: the first user line, or the id.
    pub fn title(&self) -> String {
        self.messages
            .iter()
            .find(|m| m.role == crate::llm::Role::User)
            .and_then(|m| m.content.lines().next())
            .map(|l| l.chars().take(48).collect())
            .unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence collaborator for conversation history. The whole collection is
/// kept in insertion order; `latest` is the most recently created record.
pub trait ConversationStore: Send {
    fn list(&self) -> Result<Vec<Conversation>, StoreError>;

    /// Inserts or replaces by id and refreshes `updated_at` on the caller's copy.
    fn save(&mut self, conversation: &mut Conversation) -> Result<(), StoreError>;

    fn delete(&mut self, id: &str) -> Result<(), StoreError>;

    fn clear(&mut self) -> Result<(), StoreError>;

    fn latest(&self) -> Result<Option<Conversation>, StoreError> {
        Ok(self.list()?.pop())
    }

    fn get(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.list()?.into_iter().find(|c| c.id == id))
    }
}

/// Upsert used by store implementations.
pub fn upsert(all: &mut Vec<Conversation>, conversation: &mut Conversation) {
    conversation.touch();
    match all.iter_mut().find(|c| c.id == conversation.id) {
        Some(existing) => *existing = conversation.clone(),
        None => all.push(conversation.clone()),
    }
}
