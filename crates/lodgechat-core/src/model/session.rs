use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChatError, Result};

/// Opening message seeded into every fresh conversation.
pub const SEED_BOT_MESSAGE: &str =
    "Hi! I'm the Lodgechat assistant. Ask me anything about your tenancy, \
     repairs, rent, or the portal itself.";

/// Title shown before the user has said anything title-worthy.
pub const PLACEHOLDER_TITLE: &str = "New Conversation";

pub const MAX_MESSAGE_LENGTH: usize = 4_000;
pub const PREVIEW_LENGTH: usize = 80;

/// Validate the text of an outgoing user message against the configured cap.
pub fn validate_message_text(text: &str, max_len: usize) -> Result<()> {
    if text.trim().is_empty() {
        return Err(ChatError::InvalidInput("message cannot be empty".into()));
    }
    if text.len() > max_len {
        return Err(ChatError::InvalidInput(format!(
            "message exceeds maximum length of {max_len} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    #[default]
    None,
    Positive,
    Negative,
}

/// Where a loaded session currently lives. Decides which store handles
/// subsequent rename/delete/feedback calls for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOrigin {
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique within the owning session; millisecond-clock based.
    pub id: i64,
    pub role: Role,
    pub text: String,
    /// Creation time. Display only — array order is the conversation order.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub feedback: Feedback,
}

impl Message {
    pub fn new(id: i64, role: Role, text: impl Into<String>) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            timestamp: Utc::now(),
            feedback: Feedback::None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Immutable once allocated. Merge/idempotency key across both stores.
    pub session_id: Uuid,
    pub title: String,
    pub preview: String,
    pub messages: Vec<Message>,
    /// Last-modified time. Sort key for session lists, newest first.
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_origin")]
    pub origin: SessionOrigin,
}

fn default_origin() -> SessionOrigin {
    SessionOrigin::Local
}

impl ChatSession {
    /// Fresh conversation: new v4 id, one seed bot message.
    pub fn new() -> Self {
        let mut session = Self {
            session_id: Uuid::new_v4(),
            title: PLACEHOLDER_TITLE.to_string(),
            preview: String::new(),
            messages: Vec::new(),
            timestamp: Utc::now(),
            origin: SessionOrigin::Local,
        };
        let id = session.next_message_id();
        session.messages.push(Message::new(id, Role::Bot, SEED_BOT_MESSAGE));
        session
    }

    /// Next message id: the millisecond clock, bumped past the last id so two
    /// messages landing in the same millisecond stay distinct.
    pub fn next_message_id(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        match self.messages.last() {
            Some(last) if last.id >= now => last.id + 1,
            _ => now,
        }
    }

    /// Append a message and touch the last-modified timestamp.
    pub fn push(&mut self, role: Role, text: impl Into<String>) -> i64 {
        let id = self.next_message_id();
        self.messages.push(Message::new(id, role, text));
        self.timestamp = Utc::now();
        id
    }

    pub fn user_texts(&self) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.text.as_str())
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }

    /// First user message, shortened for session lists.
    pub fn derive_preview(&self) -> String {
        match self.user_texts().next() {
            Some(text) if text.chars().count() > PREVIEW_LENGTH => {
                let cut: String = text.chars().take(PREVIEW_LENGTH).collect();
                format!("{}…", cut.trim_end())
            }
            Some(text) => text.to_string(),
            None => String::new(),
        }
    }

    pub fn message_mut(&mut self, message_id: i64) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
