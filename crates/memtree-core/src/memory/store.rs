//! ============================================================================
//! MemoryIndex - Typed queries over the memory-node collection
//! ============================================================================
//! Wraps a `MemoryNodeStore` backend and implements the retrieval contract:
//! over-fetch, similarity floor, then re-rank by effective importance times
//! similarity so results balance relevance with demonstrated value.
//! ============================================================================

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::Error;
use crate::store::MemoryNodeStore;

use super::types::{MemoryNode, RelevanceBreakdown, ScoredMemory};

/// Memory store adapter shared by the consolidation engine and the facade
#[derive(Clone)]
pub struct MemoryIndex {
    backend: Arc<dyn MemoryNodeStore>,
}

impl MemoryIndex {
    pub fn new(backend: Arc<dyn MemoryNodeStore>) -> Self {
        Self { backend }
    }

    /// Most relevant nodes for a query embedding.
    ///
    /// Requests `top_n * 2` raw ANN candidates to leave room for
    /// post-filtering, drops everything below `minimum_similarity`,
    /// re-sorts by `effective_importance * similarity` descending, and
    /// truncates to `top_n`. An empty query embedding yields no candidates.
    pub async fn find_similar(
        &self,
        user_id: &str,
        embedding: &[f32],
        top_n: usize,
        minimum_similarity: f32,
    ) -> Result<Vec<ScoredMemory>, Error> {
        if embedding.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self
            .backend
            .vector_search(user_id, embedding, top_n * 2)
            .await?;
        let total = candidates.len();

        let mut results: Vec<ScoredMemory> = candidates
            .into_iter()
            .filter(|(_, similarity)| *similarity >= minimum_similarity)
            .map(|(node, similarity)| {
                let breakdown = RelevanceBreakdown::new(similarity, &node);
                ScoredMemory {
                    effective_importance: node.effective_importance(),
                    similarity,
                    breakdown,
                    node,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            let left = a.effective_importance * a.similarity;
            let right = b.effective_importance * b.similarity;
            right.partial_cmp(&left).unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_n);

        info!(
            "Memory search: {} candidates, {} above threshold ({})",
            total,
            results.len(),
            minimum_similarity
        );

        Ok(results)
    }

    /// All nodes of a user, sorted by effective importance descending
    pub async fn list_all(&self, user_id: &str) -> Result<Vec<MemoryNode>, Error> {
        let mut nodes = self.backend.list(user_id).await?;
        nodes.sort_by(|a, b| {
            b.effective_importance()
                .partial_cmp(&a.effective_importance())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.timestamp.cmp(&a.timestamp))
        });
        Ok(nodes)
    }

    pub async fn upsert(&self, node: &MemoryNode) -> Result<(), Error> {
        self.backend.upsert(node).await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), Error> {
        self.backend.delete(id).await?;
        Ok(())
    }

    pub async fn count(&self, user_id: &str) -> Result<u64, Error> {
        Ok(self.backend.count(user_id).await?)
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<MemoryNode>, Error> {
        Ok(self.backend.list(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::InMemoryStore;

    async fn seeded_index() -> MemoryIndex {
        let store = Arc::new(InMemoryStore::new());
        let index = MemoryIndex::new(store);

        // Heavily used node pointing slightly away from the query
        let mut veteran = MemoryNode::new("alice".into(), "old fact".into(), "old".into(), 0.6)
            .with_embedding(vec![0.95, 0.312_25]);
        veteran.access_count = 20;
        index.upsert(&veteran).await.unwrap();

        // Fresh node aligned exactly with the query
        let fresh = MemoryNode::new("alice".into(), "new fact".into(), "new".into(), 0.6)
            .with_embedding(vec![1.0, 0.0]);
        index.upsert(&fresh).await.unwrap();

        // Unrelated node, below any reasonable similarity floor
        let stranger = MemoryNode::new("alice".into(), "noise".into(), "noise".into(), 0.9)
            .with_embedding(vec![0.0, 1.0]);
        index.upsert(&stranger).await.unwrap();

        index
    }

    #[tokio::test]
    async fn ranks_by_effective_importance_times_similarity() {
        let index = seeded_index().await;

        let results = index
            .find_similar("alice", &[1.0, 0.0], 3, 0.75)
            .await
            .unwrap();

        // The orthogonal node is filtered out by the similarity floor
        assert_eq!(results.len(), 2);
        // The veteran node wins despite lower similarity: its access count
        // amplifies effective importance beyond the fresh node's edge
        assert_eq!(results[0].node.content, "old fact");
        assert!(results[0].effective_importance > results[1].effective_importance);
        assert!(results[0].similarity < results[1].similarity);
    }

    #[tokio::test]
    async fn empty_embedding_returns_no_candidates() {
        let index = seeded_index().await;
        let results = index.find_similar("alice", &[], 3, 0.75).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn truncates_to_top_n() {
        let index = seeded_index().await;
        let results = index
            .find_similar("alice", &[1.0, 0.0], 1, 0.0)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn list_all_sorts_by_effective_importance() {
        let index = seeded_index().await;
        let nodes = index.list_all("alice").await.unwrap();
        assert_eq!(nodes.len(), 3);
        for pair in nodes.windows(2) {
            assert!(pair[0].effective_importance() >= pair[1].effective_importance());
        }
    }
}
