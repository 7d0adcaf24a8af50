//! ============================================================================
//! Conversation Types - Messages and ingestion inputs
//! ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single persisted chat message. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier
    pub id: Uuid,
    /// Tenant key, lowercased
    pub user_id: String,
    /// Conversation this message belongs to
    pub conversation_id: String,
    /// Who sent it
    pub kind: MessageKind,
    /// Message text, trimmed
    pub text: String,
    /// Unix timestamp (seconds)
    pub timestamp: i64,
    /// Embedding vector; empty when the capability was unavailable,
    /// in which case the message is excluded from vector search
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Human,
    Ai,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Human => write!(f, "human"),
            MessageKind::Ai => write!(f, "ai"),
        }
    }
}

impl std::str::FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(MessageKind::Human),
            "ai" => Ok(MessageKind::Ai),
            _ => Err(format!("Unknown message kind: {}", s)),
        }
    }
}

/// Inbound message before validation
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub user_id: String,
    pub conversation_id: String,
    pub kind: MessageKind,
    pub text: String,
    /// Optional RFC 3339 timestamp; ingestion time when absent
    pub timestamp: Option<String>,
}

/// Acknowledgement returned by the ingestion pipeline
#[derive(Debug, Clone, Serialize)]
pub struct MessageAck {
    /// Id of the persisted message
    pub message_id: Uuid,
    /// Whether a memory consolidation task was scheduled for this message
    pub memory_scheduled: bool,
}
