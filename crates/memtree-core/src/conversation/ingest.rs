//! ============================================================================
//! Ingestor - Message validation, persistence and consolidation trigger
//! ============================================================================
//! The write path: validate and normalize the inbound message, attach an
//! embedding when the capability is up, persist, and hand substantial
//! human messages to the consolidation engine on a background task.
//! Ingestion never waits on consolidation.
//! ============================================================================

use std::sync::Arc;

use chrono::DateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::capability::{ModelOutput, ModelProvider};
use crate::config::MemoryConfig;
use crate::error::Error;
use crate::memory::Consolidator;

use super::log::ConversationLog;
use super::types::{Message, MessageAck, MessageKind, NewMessage};

/// Message ingestion pipeline
#[derive(Clone)]
pub struct Ingestor {
    log: ConversationLog,
    consolidator: Consolidator,
    model: Arc<dyn ModelProvider>,
    cfg: MemoryConfig,
}

impl Ingestor {
    pub fn new(
        log: ConversationLog,
        consolidator: Consolidator,
        model: Arc<dyn ModelProvider>,
        cfg: MemoryConfig,
    ) -> Self {
        Self {
            log,
            consolidator,
            model,
            cfg,
        }
    }

    /// Validate, persist and acknowledge one message. Human messages
    /// longer than the trigger length schedule a consolidation task;
    /// its failures are logged, never surfaced to the sender.
    pub async fn add_message(&self, input: NewMessage) -> Result<MessageAck, Error> {
        let user_id = input.user_id.trim().to_lowercase();
        if user_id.is_empty() {
            return Err(Error::EmptyField { field: "user_id" });
        }
        let conversation_id = input.conversation_id.trim().to_string();
        if conversation_id.is_empty() {
            return Err(Error::EmptyField {
                field: "conversation_id",
            });
        }
        let text = input.text.trim().to_string();
        if text.is_empty() {
            return Err(Error::EmptyField { field: "text" });
        }

        let timestamp = match &input.timestamp {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map_err(|source| Error::InvalidTimestamp {
                    value: raw.clone(),
                    source,
                })?
                .timestamp(),
            None => chrono::Utc::now().timestamp(),
        };

        let embedding = match self.model.generate_embedding(&text).await {
            ModelOutput::Ready(vector) => {
                if vector.len() != self.cfg.embedding_dim {
                    return Err(Error::EmbeddingDimension {
                        expected: self.cfg.embedding_dim,
                        actual: vector.len(),
                    });
                }
                vector
            }
            ModelOutput::Unavailable => {
                debug!("Embedding capability unavailable, storing message without vector");
                Vec::new()
            }
        };

        let message = Message {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            conversation_id: conversation_id.clone(),
            kind: input.kind,
            text: text.clone(),
            timestamp,
            embedding,
        };
        self.log.append(&message).await?;
        debug!("Stored message {} for user {}", message.id, user_id);

        let memory_scheduled =
            input.kind == MessageKind::Human && text.chars().count() > self.cfg.trigger_chars;
        if memory_scheduled {
            let consolidator = self.consolidator.clone();
            let content = format!("From conversation {}: {}", conversation_id, text);
            tokio::spawn(async move {
                if let Err(e) = consolidator.remember(&user_id, &content).await {
                    warn!("Background memory consolidation failed: {}", e);
                }
            });
        }

        Ok(MessageAck {
            message_id: message.id,
            memory_scheduled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::OfflineModel;
    use crate::memory::MemoryIndex;
    use crate::store::mem::InMemoryStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedModel {
        embedding: Vec<f32>,
    }

    #[async_trait]
    impl ModelProvider for FixedModel {
        async fn generate_embedding(&self, _text: &str) -> ModelOutput<Vec<f32>> {
            ModelOutput::Ready(self.embedding.clone())
        }

        async fn generate_text(&self, _prompt: &str) -> ModelOutput<String> {
            ModelOutput::Unavailable
        }
    }

    fn pipeline(model: Arc<dyn ModelProvider>, cfg: MemoryConfig) -> (Ingestor, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let log = ConversationLog::new(store.clone());
        let index = MemoryIndex::new(store.clone());
        let consolidator = Consolidator::new(index, model.clone(), cfg.clone());
        (Ingestor::new(log, consolidator, model, cfg), store)
    }

    fn input(kind: MessageKind, text: &str) -> NewMessage {
        NewMessage {
            user_id: "Alice".into(),
            conversation_id: "c1".into(),
            kind,
            text: text.into(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let cfg = MemoryConfig::default();
        let (ingestor, _) = pipeline(Arc::new(OfflineModel), cfg);
        match ingestor.add_message(input(MessageKind::Human, "   ")).await {
            Err(Error::EmptyField { field: "text" }) => {}
            other => panic!("expected EmptyField, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn wrong_embedding_dimension_is_rejected() {
        let cfg = MemoryConfig {
            embedding_dim: 2,
            ..MemoryConfig::default()
        };
        let model = Arc::new(FixedModel {
            embedding: vec![0.1, 0.2, 0.3],
        });
        let (ingestor, _) = pipeline(model, cfg);
        match ingestor.add_message(input(MessageKind::Human, "hi")).await {
            Err(Error::EmbeddingDimension {
                expected: 2,
                actual: 3,
            }) => {}
            other => panic!("expected EmbeddingDimension, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_timestamp_is_rejected() {
        let cfg = MemoryConfig::default();
        let (ingestor, _) = pipeline(Arc::new(OfflineModel), cfg);
        let mut msg = input(MessageKind::Human, "hello");
        msg.timestamp = Some("not-a-date".into());
        match ingestor.add_message(msg).await {
            Err(Error::InvalidTimestamp { value, .. }) => assert_eq!(value, "not-a-date"),
            other => panic!("expected InvalidTimestamp, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn user_id_is_lowercased_and_timestamp_parsed() {
        let cfg = MemoryConfig::default();
        let (ingestor, store) = pipeline(Arc::new(OfflineModel), cfg);
        let mut msg = input(MessageKind::Ai, "  hello there  ");
        msg.timestamp = Some("2026-03-01T12:00:00Z".into());

        let ack = ingestor.add_message(msg).await.unwrap();
        assert!(!ack.memory_scheduled);

        let log = ConversationLog::new(store);
        let stored = log.get(ack.message_id).await.unwrap().unwrap();
        assert_eq!(stored.user_id, "alice");
        assert_eq!(stored.text, "hello there");
        assert_eq!(stored.timestamp, 1_772_366_400);
    }

    #[tokio::test]
    async fn only_substantial_human_messages_schedule_consolidation() {
        let cfg = MemoryConfig::default();
        let (ingestor, _) = pipeline(Arc::new(OfflineModel), cfg);
        let long = "I moved to Lisbon last spring and work remotely now";

        let ack = ingestor
            .add_message(input(MessageKind::Human, long))
            .await
            .unwrap();
        assert!(ack.memory_scheduled);

        let ack = ingestor
            .add_message(input(MessageKind::Ai, long))
            .await
            .unwrap();
        assert!(!ack.memory_scheduled);

        let ack = ingestor
            .add_message(input(MessageKind::Human, "short note"))
            .await
            .unwrap();
        assert!(!ack.memory_scheduled);
    }

    #[tokio::test]
    async fn scheduled_consolidation_creates_a_memory() {
        let cfg = MemoryConfig {
            embedding_dim: 2,
            ..MemoryConfig::default()
        };
        let model = Arc::new(FixedModel {
            embedding: vec![1.0, 0.0],
        });
        let (ingestor, store) = pipeline(model, cfg);

        ingestor
            .add_message(input(
                MessageKind::Human,
                "My daughter starts school in september this year",
            ))
            .await
            .unwrap();

        let index = MemoryIndex::new(store);
        for _ in 0..50 {
            if index.count("alice").await.unwrap() == 1 {
                let node = index.list("alice").await.unwrap().remove(0);
                assert!(node.content.starts_with("From conversation c1:"));
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background consolidation never landed");
    }
}
