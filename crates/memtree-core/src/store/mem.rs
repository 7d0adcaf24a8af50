//! ============================================================================
//! InMemoryStore - Process-local backend for tests and offline runs
//! ============================================================================
//! Implements both store traits with brute-force cosine search and a
//! term-occurrence full-text score. Behavior mirrors the production
//! composition closely enough for engine tests: embedding-less documents
//! are excluded from vector search, results come back ranked.
//! ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::conversation::types::Message;
use crate::error::StoreError;
use crate::memory::types::MemoryNode;
use crate::similarity::cosine_similarity;

use super::{MessageStore, MemoryNodeStore};

#[derive(Default)]
struct Inner {
    messages: Vec<Message>,
    nodes: HashMap<Uuid, MemoryNode>,
}

/// In-memory implementation of both store traits
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Occurrences of query terms in the text, as a ranked-search stand-in.
/// Absolute scale differs from BM25; tests tune the fulltext floor.
fn term_score(text: &str, query: &str) -> f32 {
    let text_tokens: Vec<String> = text
        .to_lowercase()
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .collect();

    let mut score = 0usize;
    for term in query.to_lowercase().split_whitespace() {
        let term = term.trim_matches(|c: char| !c.is_alphanumeric());
        if term.is_empty() {
            continue;
        }
        score += text_tokens.iter().filter(|t| t.as_str() == term).count();
    }
    score as f32
}

fn ranked_truncate<T>(mut scored: Vec<(T, f32)>, limit: usize) -> Vec<(T, f32)> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn insert(&self, message: &Message) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.messages.push(message.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn history(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.user_id == user_id && m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn fulltext_search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Message, f32)>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let scored: Vec<(Message, f32)> = inner
            .messages
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                let score = term_score(&m.text, query);
                (score > 0.0).then(|| (m.clone(), score))
            })
            .collect();
        Ok(ranked_truncate(scored, limit))
    }

    async fn vector_search(
        &self,
        user_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(Message, f32)>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let scored: Vec<(Message, f32)> = inner
            .messages
            .iter()
            .filter(|m| m.user_id == user_id && !m.embedding.is_empty())
            .filter_map(|m| {
                let sim = cosine_similarity(query, &m.embedding).ok()?;
                Some((m.clone(), sim))
            })
            .collect();
        Ok(ranked_truncate(scored, limit))
    }
}

#[async_trait]
impl MemoryNodeStore for InMemoryStore {
    async fn upsert(&self, node: &MemoryNode) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.nodes.insert(node.id, node.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<MemoryNode>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.nodes.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.nodes.remove(&id);
        Ok(())
    }

    async fn count(&self, user_id: &str) -> Result<u64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.nodes.values().filter(|n| n.user_id == user_id).count() as u64)
    }

    async fn list(&self, user_id: &str) -> Result<Vec<MemoryNode>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .nodes
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn vector_search(
        &self,
        user_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(MemoryNode, f32)>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let scored: Vec<(MemoryNode, f32)> = inner
            .nodes
            .values()
            .filter(|n| n.user_id == user_id && !n.embedding.is_empty())
            .filter_map(|n| {
                let sim = cosine_similarity(query, &n.embedding).ok()?;
                Some((n.clone(), sim))
            })
            .collect();
        Ok(ranked_truncate(scored, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::types::MessageKind;

    fn message(user: &str, text: &str, embedding: Vec<f32>) -> Message {
        Message {
            id: Uuid::new_v4(),
            user_id: user.into(),
            conversation_id: "c1".into(),
            kind: MessageKind::Human,
            text: text.into(),
            timestamp: 0,
            embedding,
        }
    }

    #[tokio::test]
    async fn vector_search_excludes_embeddingless_messages() {
        let store = InMemoryStore::new();
        store
            .insert(&message("alice", "with vector", vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .insert(&message("alice", "without vector", vec![]))
            .await
            .unwrap();

        let hits = MessageStore::vector_search(&store, "alice", &[1.0, 0.0], 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.text, "with vector");
    }

    #[tokio::test]
    async fn fulltext_counts_term_occurrences() {
        let store = InMemoryStore::new();
        store
            .insert(&message("alice", "coffee coffee coffee", vec![]))
            .await
            .unwrap();
        store
            .insert(&message("alice", "one coffee please", vec![]))
            .await
            .unwrap();
        store
            .insert(&message("bob", "coffee", vec![]))
            .await
            .unwrap();

        let hits = store.fulltext_search("alice", "coffee", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].1, 3.0);
        assert_eq!(hits[1].1, 1.0);
    }
}
