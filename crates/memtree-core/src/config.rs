//! ============================================================================
//! Configuration - Thresholds and factors for consolidation and retrieval
//! ============================================================================
//! Values load from MEMTREE_* environment variables with sane defaults.
//! All similarity scores are cosine in [0.0, 1.0]; full-text scores are on
//! the index's absolute BM25-like scale.
//! ============================================================================

use crate::capability::EMBEDDING_DIM;

/// Tuning knobs for the memory consolidation engine
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Expected embedding vector length
    pub embedding_dim: usize,
    /// Maximum memory nodes per user before pruning
    pub max_depth: u64,
    /// Global reinforce/decay split point for the per-write full pass
    pub similarity_threshold: f32,
    /// Multiplier applied on reinforcement (> 1.0)
    pub reinforcement_factor: f32,
    /// Multiplier applied on decay (< 1.0)
    pub decay_factor: f32,
    /// Similarity floor for candidate retrieval
    pub minimum_similarity: f32,
    /// Above this, new content reinforces instead of creating a node
    pub duplicate_threshold: f32,
    /// Merge band: candidates strictly inside (merge_floor, merge_ceiling)
    pub merge_floor: f32,
    pub merge_ceiling: f32,
    /// Candidates returned by find_similar after filtering
    pub top_n: usize,
    /// Minimum trimmed length of a human message that triggers consolidation
    pub trigger_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            embedding_dim: EMBEDDING_DIM,
            max_depth: 10,
            similarity_threshold: 0.80,
            reinforcement_factor: 1.1,
            decay_factor: 0.95,
            minimum_similarity: 0.75,
            duplicate_threshold: 0.85,
            merge_floor: 0.70,
            merge_ceiling: 0.85,
            top_n: 3,
            trigger_chars: 30,
        }
    }
}

impl MemoryConfig {
    /// Load from environment, falling back to defaults per field
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        read_var("MEMTREE_EMBEDDING_DIM", &mut cfg.embedding_dim);
        read_var("MEMTREE_MAX_DEPTH", &mut cfg.max_depth);
        read_var("MEMTREE_SIMILARITY_THRESHOLD", &mut cfg.similarity_threshold);
        read_var("MEMTREE_REINFORCEMENT_FACTOR", &mut cfg.reinforcement_factor);
        read_var("MEMTREE_DECAY_FACTOR", &mut cfg.decay_factor);
        read_var("MEMTREE_MINIMUM_SIMILARITY", &mut cfg.minimum_similarity);
        read_var("MEMTREE_DUPLICATE_THRESHOLD", &mut cfg.duplicate_threshold);
        cfg
    }
}

/// Tuning knobs for hybrid retrieval
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Weight of the vector modality in the hybrid score (fulltext gets 1 - w)
    pub vector_weight: f32,
    /// Hybrid results below this normalized score are discarded
    pub minimum_hybrid_score: f32,
    /// Absolute full-text score floor for the fulltext-only fallback
    pub minimum_fulltext_score: f32,
    /// Result cap
    pub top_n: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            vector_weight: 0.8,
            minimum_hybrid_score: 0.70,
            minimum_fulltext_score: 5.0,
            top_n: 10,
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        read_var("MEMTREE_VECTOR_WEIGHT", &mut cfg.vector_weight);
        read_var("MEMTREE_MINIMUM_HYBRID_SCORE", &mut cfg.minimum_hybrid_score);
        read_var(
            "MEMTREE_MINIMUM_FULLTEXT_SCORE",
            &mut cfg.minimum_fulltext_score,
        );
        read_var("MEMTREE_SEARCH_TOP_N", &mut cfg.top_n);
        cfg
    }
}

fn read_var<T: std::str::FromStr>(name: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(name) {
        if let Ok(parsed) = raw.parse() {
            *slot = parsed;
        } else {
            tracing::warn!("Ignoring unparseable {}={:?}", name, raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let cfg = MemoryConfig::default();
        assert!(cfg.reinforcement_factor > 1.0);
        assert!(cfg.decay_factor < 1.0);
        assert!(cfg.merge_floor < cfg.merge_ceiling);
        assert_eq!(cfg.merge_ceiling, cfg.duplicate_threshold);

        let search = SearchConfig::default();
        assert!(search.vector_weight > 0.0 && search.vector_weight <= 1.0);
    }
}
