//! ============================================================================
//! Memory Consolidation Engine - reinforce / create / merge / decay / prune
//! ============================================================================
//! The central state machine. Given new content for a user it either
//! reinforces an existing near-duplicate node or creates a new one, then
//! merges a moderately-overlapping neighbor, touches every node of the
//! user (reinforce or decay), and prunes overflow.
//!
//! The global pass is a full scan over the user's nodes on every call,
//! bounded by tenant cardinality (MAX_DEPTH). No per-tenant write
//! serialization is applied; see DESIGN.md for the accepted races.
//! ============================================================================

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::capability::{ModelOutput, ModelProvider};
use crate::config::MemoryConfig;
use crate::error::Error;
use crate::similarity::cosine_similarity;

use super::importance::{decay, reinforce, IMPORTANCE_CEILING, IMPORTANCE_FLOOR};
use super::store::MemoryIndex;
use super::types::{MemoryNode, RememberOutcome};

/// Memory consolidation engine
#[derive(Clone)]
pub struct Consolidator {
    memories: MemoryIndex,
    model: Arc<dyn ModelProvider>,
    cfg: MemoryConfig,
}

impl Consolidator {
    pub fn new(memories: MemoryIndex, model: Arc<dyn ModelProvider>, cfg: MemoryConfig) -> Self {
        Self {
            memories,
            model,
            cfg,
        }
    }

    pub fn index(&self) -> &MemoryIndex {
        &self.memories
    }

    /// Store new content for a user, integrating it with existing memories
    pub async fn remember(&self, user_id: &str, content: &str) -> Result<RememberOutcome, Error> {
        let user_id = user_id.to_lowercase();
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::EmptyField { field: "content" });
        }

        let embedding = match self.model.generate_embedding(content).await {
            ModelOutput::Ready(vector) => vector,
            ModelOutput::Unavailable => {
                info!("Embedding capability unavailable, consolidating without similarity");
                Vec::new()
            }
        };

        // Reinforce branch: the single most similar near-duplicate, if any
        let candidates = self
            .memories
            .find_similar(&user_id, &embedding, self.cfg.top_n, self.cfg.minimum_similarity)
            .await?;

        for candidate in &candidates {
            if candidate.similarity > self.cfg.duplicate_threshold {
                let mut node = candidate.node.clone();
                node.importance = reinforce(node.importance, self.cfg.reinforcement_factor);
                node.access_count += 1;
                node.last_accessed = chrono::Utc::now().timestamp();
                self.memories.upsert(&node).await?;

                info!(
                    "Reinforced memory {} for user {} (similarity {:.3})",
                    node.id, user_id, candidate.similarity
                );
                return Ok(RememberOutcome::Reinforced { node_id: node.id });
            }
        }

        // Create branch
        let importance = self.assess_importance(content).await;
        let summary = self.summarize(content).await;

        let mut node = MemoryNode::new(
            user_id.clone(),
            content.to_string(),
            summary,
            importance,
        )
        .with_embedding(embedding.clone());
        self.memories.upsert(&node).await?;
        debug!("Created memory {} for user {}", node.id, user_id);

        // Merge pass: fold in the first moderately-overlapping neighbor
        let candidates = self
            .memories
            .find_similar(&user_id, &embedding, self.cfg.top_n, self.cfg.minimum_similarity)
            .await?;

        for candidate in &candidates {
            let other = &candidate.node;
            if other.id != node.id
                && candidate.similarity > self.cfg.merge_floor
                && candidate.similarity < self.cfg.merge_ceiling
            {
                node = self.merge_nodes(node, other.clone()).await?;
                break;
            }
        }

        // Global pass: every node of the user is reinforced or decayed
        // against the new content
        self.update_importance(&user_id, &embedding).await?;

        // Prune overflow, least important first
        self.prune(&user_id).await?;

        info!(
            "Memory created for user {}: {}",
            user_id,
            node.summary.chars().take(50).collect::<String>()
        );

        Ok(RememberOutcome::Created {
            node_id: node.id,
            importance,
            summary: node.summary,
        })
    }

    /// Combine `node` (kept, under its own id) with `other` (deleted)
    async fn merge_nodes(
        &self,
        mut node: MemoryNode,
        other: MemoryNode,
    ) -> Result<MemoryNode, Error> {
        let prompt = format!(
            "These two texts contain related information. Combine them into a \
             single cohesive text that preserves all important details from \
             both without redundancy:\n\nTEXT 1: {}\n\nTEXT 2: {}",
            node.content, other.content
        );
        let combined = match self.model.generate_text(&prompt).await {
            ModelOutput::Ready(text) => text,
            ModelOutput::Unavailable => {
                info!("Generation unavailable, concatenating merged content");
                format!("{}\n\n{}", node.content, other.content)
            }
        };

        node.importance = (node.importance.max(other.importance) * 1.1)
            .clamp(IMPORTANCE_FLOOR, IMPORTANCE_CEILING);
        node.access_count += other.access_count;
        if node.embedding.len() == other.embedding.len() {
            node.embedding = node
                .embedding
                .iter()
                .zip(other.embedding.iter())
                .map(|(a, b)| (a + b) / 2.0)
                .collect();
        }
        node.summary = self.summarize(&combined).await;
        node.content = combined;

        self.memories.upsert(&node).await?;
        self.memories.delete(other.id).await?;

        info!("Merged memory {} into {}", other.id, node.id);
        Ok(node)
    }

    /// Reinforce nodes similar to the new embedding, decay the rest.
    /// An empty embedding decays everything: unknown content resembles
    /// nothing already remembered.
    async fn update_importance(&self, user_id: &str, embedding: &[f32]) -> Result<(), Error> {
        let now = chrono::Utc::now().timestamp();
        for mut node in self.memories.list(user_id).await? {
            let similarity = cosine_similarity(embedding, &node.embedding).unwrap_or(0.0);
            if similarity > self.cfg.similarity_threshold {
                node.importance = reinforce(node.importance, self.cfg.reinforcement_factor);
                node.access_count += 1;
                node.last_accessed = now;
            } else {
                node.importance = decay(node.importance, self.cfg.decay_factor);
            }
            self.memories.upsert(&node).await?;
        }
        Ok(())
    }

    /// Delete ascending-importance nodes until the user is back at MAX_DEPTH
    async fn prune(&self, user_id: &str) -> Result<(), Error> {
        let count = self.memories.count(user_id).await?;
        if count <= self.cfg.max_depth {
            return Ok(());
        }

        let mut nodes = self.memories.list(user_id).await?;
        nodes.sort_by(|a, b| {
            a.importance
                .partial_cmp(&b.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let excess = (count - self.cfg.max_depth) as usize;
        for node in nodes.into_iter().take(excess) {
            self.memories.delete(node.id).await?;
            debug!("Pruned memory {} (importance {:.3})", node.id, node.importance);
        }

        info!("Pruned {} memories for user {}", excess, user_id);
        Ok(())
    }

    /// Rate importance of new content on a 1-10 scale via the generation
    /// capability; 0.5 when unavailable or unparseable
    async fn assess_importance(&self, content: &str) -> f32 {
        let prompt = format!(
            "On a scale of 1-10, rate the importance of remembering this \
             information long-term. Consider factors like: uniqueness of \
             information, actionability, personal significance, and whether \
             it contains key facts or decisions. Respond with just a \
             number.\n\nText to evaluate: {}",
            content
        );

        match self.model.generate_text(&prompt).await {
            ModelOutput::Ready(text) => parse_importance(&text).unwrap_or_else(|| {
                warn!("Unparseable importance rating {:?}, using default", text);
                0.5
            }),
            ModelOutput::Unavailable => {
                info!("Generation unavailable, using default importance score");
                0.5
            }
        }
    }

    /// One-sentence summary via the generation capability; truncated
    /// prefix of the content when unavailable
    async fn summarize(&self, content: &str) -> String {
        let prompt = format!(
            "Create a one-sentence summary of the key information in this \
             text. Be specific and concise:\n\n{}",
            content
        );

        match self.model.generate_text(&prompt).await {
            ModelOutput::Ready(text) => text,
            ModelOutput::Unavailable => {
                info!("Generation unavailable, using fallback summary");
                fallback_summary(content)
            }
        }
    }
}

/// First numeric token of a rating reply, normalized from 1-10 to [0.1, 1.0]
fn parse_importance(text: &str) -> Option<f32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let token: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let rating: f32 = token.parse().ok()?;
    Some((rating / 10.0).clamp(IMPORTANCE_FLOOR, IMPORTANCE_CEILING))
}

/// First 100 characters of the content, with an ellipsis when truncated
fn fallback_summary(content: &str) -> String {
    let prefix: String = content.chars().take(100).collect();
    if content.chars().count() > 100 {
        format!("{}...", prefix)
    } else {
        prefix
    }
}
