//! ============================================================================
//! Storage Layer - Trait seams and backend composition
//! ============================================================================
//! The engines only talk to `MessageStore` / `MemoryNodeStore`. Production
//! wiring composes three backends: redb holds the canonical records,
//! qdrant answers approximate nearest-neighbor queries, tantivy answers
//! ranked full-text queries. `InMemoryStore` implements both traits for
//! tests and offline operation.
//! ============================================================================

pub mod db;
pub mod fulltext;
pub mod mem;
pub mod vector;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::conversation::types::Message;
use crate::error::StoreError;
use crate::memory::types::MemoryNode;

use db::DocumentDb;
use fulltext::FullTextIndex;
use vector::{VectorIndex, MESSAGES_COLLECTION, NODES_COLLECTION};

/// Message collection operations consumed by ingestion and retrieval
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: &Message) -> Result<(), StoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<Message>, StoreError>;

    /// All messages of one conversation, chronological
    async fn history(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<Message>, StoreError>;

    /// Ranked full-text search, absolute store-scale scores
    async fn fulltext_search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Message, f32)>, StoreError>;

    /// Ranked cosine-similarity search; messages without embeddings are
    /// never returned
    async fn vector_search(
        &self,
        user_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(Message, f32)>, StoreError>;
}

/// Memory-node collection operations consumed by the consolidation engine
#[async_trait]
pub trait MemoryNodeStore: Send + Sync {
    /// Insert or fully overwrite a node by id
    async fn upsert(&self, node: &MemoryNode) -> Result<(), StoreError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<MemoryNode>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn count(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Every node of the user, embeddings included; unordered
    async fn list(&self, user_id: &str) -> Result<Vec<MemoryNode>, StoreError>;

    /// Ranked cosine-similarity search over the user's nodes
    async fn vector_search(
        &self,
        user_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(MemoryNode, f32)>, StoreError>;
}

/// Production message store: redb canonical + tantivy full-text + qdrant ANN
pub struct PersistentMessageStore {
    db: Arc<DocumentDb>,
    vectors: Arc<VectorIndex>,
    fulltext: Arc<FullTextIndex>,
}

impl PersistentMessageStore {
    pub fn new(db: Arc<DocumentDb>, vectors: Arc<VectorIndex>, fulltext: Arc<FullTextIndex>) -> Self {
        Self {
            db,
            vectors,
            fulltext,
        }
    }
}

#[async_trait]
impl MessageStore for PersistentMessageStore {
    async fn insert(&self, message: &Message) -> Result<(), StoreError> {
        self.db.put_message(message)?;
        self.fulltext
            .add(message.id, &message.user_id, &message.text)?;
        if !message.embedding.is_empty() {
            self.vectors
                .upsert(
                    MESSAGES_COLLECTION,
                    message.id,
                    &message.user_id,
                    &message.embedding,
                )
                .await?;
        }
        debug!("Persisted message {} for user {}", message.id, message.user_id);
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        self.db.get_message(id)
    }

    async fn history(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        let mut messages = self.db.list_messages(user_id, Some(conversation_id))?;
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn fulltext_search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Message, f32)>, StoreError> {
        let hits = self.fulltext.search(user_id, query, limit)?;
        let mut results = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            if let Some(message) = self.db.get_message(id)? {
                results.push((message, score));
            }
        }
        Ok(results)
    }

    async fn vector_search(
        &self,
        user_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(Message, f32)>, StoreError> {
        let hits = self
            .vectors
            .search(MESSAGES_COLLECTION, user_id, query, limit)
            .await?;
        let mut results = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            if let Some(message) = self.db.get_message(id)? {
                results.push((message, score));
            }
        }
        Ok(results)
    }
}

/// Production memory-node store: redb canonical + qdrant ANN
pub struct PersistentMemoryStore {
    db: Arc<DocumentDb>,
    vectors: Arc<VectorIndex>,
}

impl PersistentMemoryStore {
    pub fn new(db: Arc<DocumentDb>, vectors: Arc<VectorIndex>) -> Self {
        Self { db, vectors }
    }
}

#[async_trait]
impl MemoryNodeStore for PersistentMemoryStore {
    async fn upsert(&self, node: &MemoryNode) -> Result<(), StoreError> {
        self.db.put_node(node)?;
        if !node.embedding.is_empty() {
            self.vectors
                .upsert(NODES_COLLECTION, node.id, &node.user_id, &node.embedding)
                .await?;
        }
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<MemoryNode>, StoreError> {
        self.db.get_node(id)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.db.delete_node(id)?;
        self.vectors.delete(NODES_COLLECTION, id).await?;
        Ok(())
    }

    async fn count(&self, user_id: &str) -> Result<u64, StoreError> {
        self.db.count_nodes(user_id)
    }

    async fn list(&self, user_id: &str) -> Result<Vec<MemoryNode>, StoreError> {
        self.db.list_nodes(user_id)
    }

    async fn vector_search(
        &self,
        user_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(MemoryNode, f32)>, StoreError> {
        let hits = self
            .vectors
            .search(NODES_COLLECTION, user_id, query, limit)
            .await?;
        let mut results = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            // Hydrate from redb so embeddings come back with the node
            if let Some(node) = self.db.get_node(id)? {
                results.push((node, score));
            }
        }
        Ok(results)
    }
}
