//! ============================================================================
//! Memory Types - Consolidated long-term memory nodes
//! ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::importance::effective_importance;

/// A consolidated long-term fact about a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryNode {
    /// Unique identifier
    pub id: Uuid,
    /// Tenant key, lowercased
    pub user_id: String,
    /// Full content, possibly merged from multiple sources
    pub content: String,
    /// Short synthesized description
    pub summary: String,
    /// Raw importance in [0.1, 1.0]
    pub importance: f32,
    /// Times this memory was reinforced
    pub access_count: u32,
    /// Unix timestamp of creation
    pub timestamp: i64,
    /// Unix timestamp of the last reinforcement
    pub last_accessed: i64,
    /// Embedding vector; may be empty when created while the embedding
    /// capability was down
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl MemoryNode {
    /// Create a new node with access_count 0 and both timestamps set to now
    pub fn new(user_id: String, content: String, summary: String, importance: f32) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4(),
            user_id,
            content,
            summary,
            importance,
            access_count: 0,
            timestamp: now,
            last_accessed: now,
            embedding: Vec::new(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    /// Usage-adjusted importance; computed, never stored
    pub fn effective_importance(&self) -> f32 {
        effective_importance(self.importance, self.access_count)
    }
}

/// A node returned from similarity search, with its relevance breakdown
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    pub node: MemoryNode,
    /// Cosine similarity to the query
    pub similarity: f32,
    pub effective_importance: f32,
    pub breakdown: RelevanceBreakdown,
}

/// Human-readable relevance breakdown attached for observability
#[derive(Debug, Clone, Serialize)]
pub struct RelevanceBreakdown {
    pub similarity_score: f32,
    pub importance_score: f32,
    pub effective_importance: f32,
    pub access_count: u32,
    pub explanation: String,
}

impl RelevanceBreakdown {
    pub fn new(similarity: f32, node: &MemoryNode) -> Self {
        let effective = node.effective_importance();
        Self {
            similarity_score: round4(similarity),
            importance_score: round4(node.importance),
            effective_importance: round4(effective),
            access_count: node.access_count,
            explanation: format!(
                "Vector similarity: {:.1}%, Importance: {:.1}%, Access count: {}",
                similarity * 100.0,
                node.importance * 100.0,
                node.access_count
            ),
        }
    }
}

/// Which branch a remember call took
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RememberOutcome {
    /// An existing near-duplicate node was reinforced in place
    Reinforced { node_id: Uuid },
    /// A new node was created (and possibly merged with a neighbor)
    Created {
        node_id: Uuid,
        importance: f32,
        summary: String,
    },
}

impl RememberOutcome {
    /// Id of the node this call acted on
    pub fn node_id(&self) -> Uuid {
        match self {
            RememberOutcome::Reinforced { node_id } => *node_id,
            RememberOutcome::Created { node_id, .. } => *node_id,
        }
    }
}

pub(crate) fn round4(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_starts_unaccessed() {
        let node = MemoryNode::new(
            "alice".into(),
            "Likes black coffee".into(),
            "coffee preference".into(),
            0.7,
        );
        assert_eq!(node.access_count, 0);
        assert_eq!(node.timestamp, node.last_accessed);
        assert!(node.embedding.is_empty());
        // ln(0 + 1) = 0, so effective == raw at creation
        assert!((node.effective_importance() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn breakdown_mentions_percentages() {
        let node = MemoryNode::new("a".into(), "c".into(), "s".into(), 0.5);
        let breakdown = RelevanceBreakdown::new(0.9, &node);
        assert!(breakdown.explanation.contains("90.0%"));
        assert!(breakdown.explanation.contains("50.0%"));
    }
}
