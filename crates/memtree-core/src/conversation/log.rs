//! ============================================================================
//! ConversationLog - Typed queries over the message collection
//! ============================================================================
//! Wraps a `MessageStore` backend with the conversation-level operations:
//! chronological history and context windows around a single message.
//! ============================================================================

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::Error;
use crate::store::MessageStore;

use super::types::{Message, MessageKind};

/// Context window sizes around a target message, by author kind.
/// An assistant reply leans on what preceded it; a human message is
/// read symmetrically.
const AI_WINDOW: (usize, usize) = (4, 2);
const HUMAN_WINDOW: (usize, usize) = (3, 3);

/// Message store adapter shared by ingestion, retrieval and the facade
#[derive(Clone)]
pub struct ConversationLog {
    backend: Arc<dyn MessageStore>,
}

impl ConversationLog {
    pub fn new(backend: Arc<dyn MessageStore>) -> Self {
        Self { backend }
    }

    pub async fn append(&self, message: &Message) -> Result<(), Error> {
        self.backend.insert(message).await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Message>, Error> {
        Ok(self.backend.fetch(id).await?)
    }

    /// All messages of one conversation, oldest first
    pub async fn history(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<Message>, Error> {
        Ok(self.backend.history(user_id, conversation_id).await?)
    }

    /// The target message with its conversational surroundings, oldest
    /// first. Windows clip at conversation boundaries; an unknown id
    /// yields an empty slice.
    pub async fn context(&self, message_id: Uuid) -> Result<Vec<Message>, Error> {
        let Some(target) = self.backend.fetch(message_id).await? else {
            debug!("Context requested for unknown message {}", message_id);
            return Ok(Vec::new());
        };

        let history = self
            .backend
            .history(&target.user_id, &target.conversation_id)
            .await?;
        let Some(position) = history.iter().position(|m| m.id == message_id) else {
            return Ok(Vec::new());
        };

        let (before, after) = match target.kind {
            MessageKind::Ai => AI_WINDOW,
            MessageKind::Human => HUMAN_WINDOW,
        };

        let start = position.saturating_sub(before);
        let end = (position + after + 1).min(history.len());
        Ok(history[start..end].to_vec())
    }

    pub async fn fulltext_search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Message, f32)>, Error> {
        Ok(self.backend.fulltext_search(user_id, query, limit).await?)
    }

    pub async fn vector_search(
        &self,
        user_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(Message, f32)>, Error> {
        Ok(self.backend.vector_search(user_id, query, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::InMemoryStore;

    async fn seeded_log() -> (ConversationLog, Vec<Message>) {
        let log = ConversationLog::new(Arc::new(InMemoryStore::new()));
        let mut messages = Vec::new();
        for i in 0..10i64 {
            let kind = if i % 2 == 0 {
                MessageKind::Human
            } else {
                MessageKind::Ai
            };
            let msg = Message {
                id: Uuid::new_v4(),
                user_id: "alice".into(),
                conversation_id: "c1".into(),
                kind,
                text: format!("message {}", i),
                timestamp: i,
                embedding: vec![],
            };
            log.append(&msg).await.unwrap();
            messages.push(msg);
        }
        (log, messages)
    }

    #[tokio::test]
    async fn ai_window_reaches_further_back() {
        let (log, messages) = seeded_log().await;

        // messages[5] is an assistant reply: 4 before, 2 after
        let window = log.context(messages[5].id).await.unwrap();
        assert_eq!(window.len(), 7);
        assert_eq!(window.first().unwrap().text, "message 1");
        assert_eq!(window.last().unwrap().text, "message 7");
    }

    #[tokio::test]
    async fn human_window_is_symmetric() {
        let (log, messages) = seeded_log().await;

        // messages[4] is human: 3 before, 3 after
        let window = log.context(messages[4].id).await.unwrap();
        assert_eq!(window.len(), 7);
        assert_eq!(window.first().unwrap().text, "message 1");
        assert_eq!(window.last().unwrap().text, "message 7");
    }

    #[tokio::test]
    async fn window_clips_at_conversation_edges() {
        let (log, messages) = seeded_log().await;

        let window = log.context(messages[0].id).await.unwrap();
        assert_eq!(window.first().unwrap().id, messages[0].id);
        assert_eq!(window.len(), 4); // target + 3 after, nothing before

        let window = log.context(messages[9].id).await.unwrap();
        assert_eq!(window.last().unwrap().id, messages[9].id);
        assert_eq!(window.len(), 5); // 4 before + target, nothing after
    }

    #[tokio::test]
    async fn unknown_message_yields_empty_context() {
        let (log, _) = seeded_log().await;
        assert!(log.context(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_is_chronological() {
        let (log, _) = seeded_log().await;
        let history = log.history("alice", "c1").await.unwrap();
        assert_eq!(history.len(), 10);
        for pair in history.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }
}
