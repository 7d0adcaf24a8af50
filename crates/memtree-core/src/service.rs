//! ============================================================================
//! Memtree - Service facade bundling stores, engines and capabilities
//! ============================================================================
//! One handle over the whole system. `open` wires the persistent backends
//! (redb + qdrant + tantivy); `in_memory` wires the process-local store
//! for tests and offline runs. All engine semantics live below this
//! layer; the facade only composes and exposes them.
//! ============================================================================

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::capability::{ModelOutput, ModelProvider};
use crate::config::{MemoryConfig, SearchConfig};
use crate::conversation::{
    ConversationLog, Ingestor, Message, MessageAck, NewMessage, Retriever, SearchResponse,
};
use crate::error::Error;
use crate::memory::{Consolidator, MemoryIndex, MemoryNode, RememberOutcome, ScoredMemory};
use crate::store::db::DocumentDb;
use crate::store::fulltext::FullTextIndex;
use crate::store::mem::InMemoryStore;
use crate::store::vector::VectorIndex;
use crate::store::{MemoryNodeStore, MessageStore, PersistentMemoryStore, PersistentMessageStore};

/// Everything `retrieve` gathered for one query: ranked messages, the
/// user's most relevant long-term memories, the conversational context
/// around the best hit, and a short synthesis of that context.
#[derive(Debug, Clone, Serialize)]
pub struct RetrieveResponse {
    pub search: SearchResponse,
    pub memories: Vec<ScoredMemory>,
    pub context: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// ANN index reachable (always true for the in-memory composition)
    pub vector_index: bool,
    /// Embedding capability currently answering
    pub embedding_capability: bool,
}

/// Conversational-memory service facade
#[derive(Clone)]
pub struct Memtree {
    log: ConversationLog,
    memories: MemoryIndex,
    consolidator: Consolidator,
    ingestor: Ingestor,
    retriever: Retriever,
    model: Arc<dyn ModelProvider>,
    vectors: Option<Arc<VectorIndex>>,
    memory_cfg: MemoryConfig,
}

impl Memtree {
    /// Wire the persistent composition: redb documents, qdrant vectors,
    /// tantivy full-text
    pub async fn open(
        data_dir: &Path,
        qdrant_url: &str,
        model: Arc<dyn ModelProvider>,
        memory_cfg: MemoryConfig,
        search_cfg: SearchConfig,
    ) -> Result<Self, Error> {
        let db = Arc::new(DocumentDb::open(data_dir.join("memtree.redb"))?);
        let vectors = Arc::new(VectorIndex::connect(qdrant_url, memory_cfg.embedding_dim).await?);
        let fulltext = Arc::new(FullTextIndex::open(&data_dir.join("fulltext"))?);

        let messages: Arc<dyn MessageStore> = Arc::new(PersistentMessageStore::new(
            db.clone(),
            vectors.clone(),
            fulltext,
        ));
        let nodes: Arc<dyn MemoryNodeStore> =
            Arc::new(PersistentMemoryStore::new(db, vectors.clone()));

        info!("Opened memtree service at {}", data_dir.display());
        Ok(Self::from_parts(
            messages,
            nodes,
            model,
            memory_cfg,
            search_cfg,
            Some(vectors),
        ))
    }

    /// Process-local composition, no external services
    pub fn in_memory(
        model: Arc<dyn ModelProvider>,
        memory_cfg: MemoryConfig,
        search_cfg: SearchConfig,
    ) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::from_parts(store.clone(), store, model, memory_cfg, search_cfg, None)
    }

    fn from_parts(
        messages: Arc<dyn MessageStore>,
        nodes: Arc<dyn MemoryNodeStore>,
        model: Arc<dyn ModelProvider>,
        memory_cfg: MemoryConfig,
        search_cfg: SearchConfig,
        vectors: Option<Arc<VectorIndex>>,
    ) -> Self {
        let log = ConversationLog::new(messages);
        let memories = MemoryIndex::new(nodes);
        let consolidator = Consolidator::new(memories.clone(), model.clone(), memory_cfg.clone());
        let ingestor = Ingestor::new(
            log.clone(),
            consolidator.clone(),
            model.clone(),
            memory_cfg.clone(),
        );
        let retriever = Retriever::new(log.clone(), model.clone(), search_cfg);

        Self {
            log,
            memories,
            consolidator,
            ingestor,
            retriever,
            model,
            vectors,
            memory_cfg,
        }
    }

    /// Validate and persist one message; may schedule consolidation
    pub async fn add_message(&self, input: NewMessage) -> Result<MessageAck, Error> {
        self.ingestor.add_message(input).await
    }

    /// Hybrid (or degraded full-text-only) message search
    pub async fn search(&self, user_id: &str, query: &str) -> Result<SearchResponse, Error> {
        self.retriever.search(user_id, query).await
    }

    /// Feed content directly into memory consolidation
    pub async fn remember(&self, user_id: &str, content: &str) -> Result<RememberOutcome, Error> {
        self.consolidator.remember(user_id, content).await
    }

    /// All memory nodes of a user, most valuable first
    pub async fn memories(&self, user_id: &str) -> Result<Vec<MemoryNode>, Error> {
        self.memories.list_all(&user_id.to_lowercase()).await
    }

    pub async fn history(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<Message>, Error> {
        self.log
            .history(&user_id.to_lowercase(), conversation_id)
            .await
    }

    pub async fn context(&self, message_id: Uuid) -> Result<Vec<Message>, Error> {
        self.log.context(message_id).await
    }

    pub async fn memory_count(&self, user_id: &str) -> Result<u64, Error> {
        self.memories.count(&user_id.to_lowercase()).await
    }

    /// One-call retrieval: message search, similar long-term memories,
    /// context around the best hit, and a synthesized summary of that
    /// context (best-hit prefix when generation is unavailable)
    pub async fn retrieve(&self, user_id: &str, query: &str) -> Result<RetrieveResponse, Error> {
        let user_id = user_id.to_lowercase();
        let search = self.retriever.search(&user_id, query).await?;

        let memories = match self.model.generate_embedding(query).await {
            ModelOutput::Ready(embedding) => {
                self.memories
                    .find_similar(
                        &user_id,
                        &embedding,
                        self.memory_cfg.top_n,
                        self.memory_cfg.minimum_similarity,
                    )
                    .await?
            }
            ModelOutput::Unavailable => Vec::new(),
        };

        let context = match search.results.first() {
            Some(best) => self.log.context(best.message.id).await?,
            None => Vec::new(),
        };

        let summary = if context.is_empty() {
            None
        } else {
            Some(self.summarize_context(&context).await)
        };

        Ok(RetrieveResponse {
            search,
            memories,
            context,
            summary,
        })
    }

    async fn summarize_context(&self, context: &[Message]) -> String {
        let transcript: String = context
            .iter()
            .map(|m| format!("{}: {}\n", m.kind, m.text))
            .collect();
        let prompt = format!(
            "Summarize this conversation excerpt in one or two sentences, \
             keeping concrete facts:\n\n{}",
            transcript
        );

        match self.model.generate_text(&prompt).await {
            ModelOutput::Ready(text) => text,
            ModelOutput::Unavailable => {
                let prefix: String = transcript.chars().take(100).collect();
                if transcript.chars().count() > 100 {
                    format!("{}...", prefix)
                } else {
                    prefix
                }
            }
        }
    }

    pub async fn health_check(&self) -> HealthReport {
        let vector_index = match &self.vectors {
            Some(vectors) => vectors.healthy().await,
            None => true,
        };
        let embedding_capability = self
            .model
            .generate_embedding("health check")
            .await
            .is_available();

        HealthReport {
            vector_index,
            embedding_capability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::OfflineModel;
    use crate::conversation::MessageKind;
    use async_trait::async_trait;

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

    fn service(model: Arc<dyn ModelProvider>) -> Memtree {
        let cfg = MemoryConfig {
            embedding_dim: 2,
            ..MemoryConfig::default()
        };
        Memtree::in_memory(model, cfg, SearchConfig::default())
    }

    fn input(text: &str) -> NewMessage {
        NewMessage {
            user_id: "Alice".into(),
            conversation_id: "c1".into(),
            kind: MessageKind::Ai,
            text: text.into(),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn retrieve_bundles_search_memories_and_context() {
        let model = Arc::new(FixedModel {
            embedding: vec![1.0, 0.0],
        });
        let service = service(model);

        service.add_message(input("first note about lisbon")).await.unwrap();
        service.add_message(input("second note about lisbon")).await.unwrap();
        service
            .remember("alice", "Planning to move to Lisbon")
            .await
            .unwrap();

        let response = service.retrieve("Alice", "lisbon").await.unwrap();

        assert!(!response.search.results.is_empty());
        assert_eq!(response.memories.len(), 1);
        // Context surrounds the best hit and includes it
        let best_id = response.search.results[0].message.id;
        assert!(response.context.iter().any(|m| m.id == best_id));
        // Generation is unavailable: summary falls back to a transcript prefix
        assert!(response.summary.as_deref().unwrap().starts_with("ai:"));
    }

    #[tokio::test]
    async fn retrieve_without_hits_carries_no_context() {
        let service = service(Arc::new(OfflineModel));
        let response = service.retrieve("alice", "anything").await.unwrap();
        assert!(response.search.results.is_empty());
        assert!(response.context.is_empty());
        assert!(response.summary.is_none());
        assert!(response.memories.is_empty());
    }

    #[tokio::test]
    async fn health_reports_capability_state() {
        let degraded = service(Arc::new(OfflineModel)).health_check().await;
        assert!(degraded.vector_index);
        assert!(!degraded.embedding_capability);

        let healthy = service(Arc::new(FixedModel {
            embedding: vec![1.0, 0.0],
        }))
        .health_check()
        .await;
        assert!(healthy.embedding_capability);
    }
}
