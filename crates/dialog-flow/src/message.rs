//! Messages exchanged over a channel

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a fresh id
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who wrote a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Author {
    /// Sent by the flow engine
    Flow,
    /// Sent by a participant, identified by the channel's own identity string
    Participant(String),
}

impl Author {
    pub fn participant(id: impl Into<String>) -> Self {
        Self::Participant(id.into())
    }

    pub fn is_flow(&self) -> bool {
        matches!(self, Author::Flow)
    }
}

/// A message sent or received on a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: Author,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn new(author: Author, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            author,
            content: content.into(),
            sent_at: Utc::now(),
        }
    }

    /// A message authored by the flow engine
    pub fn from_flow(content: impl Into<String>) -> Self {
        Self::new(Author::Flow, content)
    }

    /// A reply authored by a participant
    pub fn from_participant(participant: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(Author::participant(participant), content)
    }

    /// Whether this message was written by the given participant
    pub fn is_from(&self, participant: &str) -> bool {
        matches!(&self.author, Author::Participant(id) if id == participant)
    }
}

/// Rendered content handed to a channel for delivery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbound {
    pub content: String,
}

impl Outbound {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl From<&str> for Outbound {
    fn from(content: &str) -> Self {
        Self::new(content)
    }
}

impl From<String> for Outbound {
    fn from(content: String) -> Self {
        Self { content }
    }
}
