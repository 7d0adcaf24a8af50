//! ============================================================================
//! Retriever - Hybrid vector + full-text search over messages
//! ============================================================================
//! Vector and full-text hits are scored on incompatible scales, so each
//! candidate set is max-normalized within itself before blending. When
//! the embedding capability is down the engine degrades to ranked
//! full-text with an absolute score floor, flagged in the metadata.
//! ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::capability::{ModelOutput, ModelProvider};
use crate::config::SearchConfig;
use crate::error::Error;

use super::log::ConversationLog;
use super::types::Message;

/// Metadata tag for blended vector + full-text results
pub const HYBRID_SEARCH: &str = "hybrid";
/// Metadata tag for the degraded full-text-only mode
pub const FULLTEXT_ONLY_SEARCH: &str = "atlas_fulltext_only";

/// Per-document relevance breakdown. In hybrid mode `vector` and
/// `fulltext` are the max-normalized modality scores; in full-text-only
/// mode `fulltext` carries the raw store-scale score.
#[derive(Debug, Clone, Serialize)]
pub struct RelevanceScores {
    pub hybrid: f32,
    pub vector: f32,
    pub fulltext: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredMessage {
    pub message: Message,
    pub scores: RelevanceScores,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMetadata {
    pub search_type: &'static str,
    pub query: String,
    /// Candidates seen before relevance filtering
    pub total_results: usize,
    /// Results that survived the score floor
    pub relevant_results: usize,
    pub minimum_score: f32,
    /// Blend weight applied to the vector modality; absent in fallback mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_weight: Option<f32>,
}

/// Ranked results plus how they were produced. Empty `results` with a
/// positive `total_results` is the "nothing relevant" sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<ScoredMessage>,
    pub metadata: SearchMetadata,
}

/// Hybrid retrieval engine over the conversation log
#[derive(Clone)]
pub struct Retriever {
    log: ConversationLog,
    model: Arc<dyn ModelProvider>,
    cfg: SearchConfig,
}

impl Retriever {
    pub fn new(log: ConversationLog, model: Arc<dyn ModelProvider>, cfg: SearchConfig) -> Self {
        Self { log, model, cfg }
    }

    pub async fn search(&self, user_id: &str, query: &str) -> Result<SearchResponse, Error> {
        let user_id = user_id.to_lowercase();

        let embedding = match self.model.generate_embedding(query).await {
            ModelOutput::Ready(vector) if !vector.is_empty() => vector,
            _ => {
                info!("Embedding unavailable, degrading to full-text-only search");
                return self.fulltext_only(&user_id, query).await;
            }
        };

        let vector_hits = self
            .log
            .vector_search(&user_id, &embedding, self.cfg.top_n)
            .await?;
        let fulltext_hits = self
            .log
            .fulltext_search(&user_id, query, self.cfg.top_n)
            .await?;
        debug!(
            "Hybrid candidates for user {}: {} vector, {} fulltext",
            user_id,
            vector_hits.len(),
            fulltext_hits.len()
        );

        // Union by message id, keeping the best normalized score each
        // modality produced for the document
        let mut merged: HashMap<Uuid, (Message, f32, f32)> = HashMap::new();
        for (message, score) in max_normalize(vector_hits) {
            let entry = merged.entry(message.id).or_insert((message, 0.0, 0.0));
            entry.1 = entry.1.max(score);
        }
        for (message, score) in max_normalize(fulltext_hits) {
            let entry = merged.entry(message.id).or_insert((message, 0.0, 0.0));
            entry.2 = entry.2.max(score);
        }
        let total_results = merged.len();

        let weight = self.cfg.vector_weight;
        let mut ranked: Vec<ScoredMessage> = merged
            .into_values()
            .map(|(message, vector, fulltext)| ScoredMessage {
                message,
                scores: RelevanceScores {
                    hybrid: weight * vector + (1.0 - weight) * fulltext,
                    vector,
                    fulltext,
                },
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.scores
                .hybrid
                .partial_cmp(&a.scores.hybrid)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(self.cfg.top_n);
        ranked.retain(|r| r.scores.hybrid >= self.cfg.minimum_hybrid_score);

        info!(
            "Hybrid search for user {}: {} candidates, {} relevant",
            user_id,
            total_results,
            ranked.len()
        );

        Ok(SearchResponse {
            metadata: SearchMetadata {
                search_type: HYBRID_SEARCH,
                query: query.to_string(),
                total_results,
                relevant_results: ranked.len(),
                minimum_score: self.cfg.minimum_hybrid_score,
                vector_weight: Some(weight),
            },
            results: ranked,
        })
    }

    /// Ranked full-text with an absolute score floor; embeddings are
    /// stripped from the output since no vector signal was involved
    async fn fulltext_only(&self, user_id: &str, query: &str) -> Result<SearchResponse, Error> {
        let hits = self
            .log
            .fulltext_search(user_id, query, self.cfg.top_n)
            .await?;
        let total_results = hits.len();

        let results: Vec<ScoredMessage> = hits
            .into_iter()
            .filter(|(_, score)| *score >= self.cfg.minimum_fulltext_score)
            .map(|(mut message, score)| {
                message.embedding = Vec::new();
                ScoredMessage {
                    message,
                    scores: RelevanceScores {
                        hybrid: score,
                        vector: 0.0,
                        fulltext: score,
                    },
                }
            })
            .collect();

        info!(
            "Fulltext-only search for user {}: {} candidates, {} relevant",
            user_id,
            total_results,
            results.len()
        );

        Ok(SearchResponse {
            metadata: SearchMetadata {
                search_type: FULLTEXT_ONLY_SEARCH,
                query: query.to_string(),
                total_results,
                relevant_results: results.len(),
                minimum_score: self.cfg.minimum_fulltext_score,
                vector_weight: None,
            },
            results,
        })
    }
}

/// Divide every score in the set by the set's maximum, yielding a 0-1
/// relevance signal per modality. An empty or all-zero set passes through.
fn max_normalize(hits: Vec<(Message, f32)>) -> Vec<(Message, f32)> {
    let max = hits
        .iter()
        .map(|(_, s)| *s)
        .fold(0.0f32, f32::max);
    if max <= 0.0 {
        return hits;
    }
    hits.into_iter().map(|(m, s)| (m, s / max)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::OfflineModel;
    use crate::conversation::types::MessageKind;
    use crate::store::mem::InMemoryStore;
    use crate::store::MessageStore;
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

    async fn seed(store: &InMemoryStore, text: &str, embedding: Vec<f32>) -> Uuid {
        let msg = Message {
            id: Uuid::new_v4(),
            user_id: "alice".into(),
            conversation_id: "c1".into(),
            kind: MessageKind::Human,
            text: text.into(),
            timestamp: 0,
            embedding,
        };
        store.insert(&msg).await.unwrap();
        msg.id
    }

    fn retriever(store: Arc<InMemoryStore>, model: Arc<dyn ModelProvider>) -> Retriever {
        Retriever::new(ConversationLog::new(store), model, SearchConfig::default())
    }

    #[tokio::test]
    async fn hybrid_blends_both_modalities() {
        let store = Arc::new(InMemoryStore::new());
        // Matches both the query text and the query vector
        let both = seed(&store, "planning the lisbon trip", vec![1.0, 0.0]).await;
        // Close in vector space only
        let vector_only = seed(&store, "weekend groceries", vec![0.9, 0.435_89]).await;

        let model = Arc::new(FixedModel {
            embedding: vec![1.0, 0.0],
        });
        let response = retriever(store, model)
            .search("Alice", "lisbon")
            .await
            .unwrap();

        assert_eq!(response.metadata.search_type, HYBRID_SEARCH);
        assert_eq!(response.metadata.total_results, 2);
        assert_eq!(response.metadata.relevant_results, 2);

        // 0.8 * 1.0 + 0.2 * 1.0 = 1.0 beats 0.8 * 0.9 + 0 = 0.72
        assert_eq!(response.results[0].message.id, both);
        assert!((response.results[0].scores.hybrid - 1.0).abs() < 1e-4);
        assert_eq!(response.results[1].message.id, vector_only);
        assert!((response.results[1].scores.hybrid - 0.72).abs() < 1e-3);
    }

    #[tokio::test]
    async fn weak_combined_scores_yield_the_sentinel() {
        let store = Arc::new(InMemoryStore::new());
        // Full-text match only: hybrid caps at (1 - 0.8) = 0.2, below the floor
        seed(&store, "morning coffee ritual", vec![]).await;

        let model = Arc::new(FixedModel {
            embedding: vec![1.0, 0.0],
        });
        let response = retriever(store, model)
            .search("alice", "coffee")
            .await
            .unwrap();

        assert!(response.results.is_empty());
        assert_eq!(response.metadata.relevant_results, 0);
        assert_eq!(response.metadata.total_results, 1);
    }

    #[tokio::test]
    async fn unavailable_embedding_falls_back_to_fulltext_only() {
        let store = Arc::new(InMemoryStore::new());
        // Five term hits clear the absolute floor of 5.0
        seed(
            &store,
            "coffee coffee coffee coffee coffee",
            vec![1.0, 0.0],
        )
        .await;
        // One hit does not
        seed(&store, "one coffee please", vec![]).await;

        let response = retriever(store, Arc::new(OfflineModel))
            .search("alice", "coffee")
            .await
            .unwrap();

        assert_eq!(response.metadata.search_type, FULLTEXT_ONLY_SEARCH);
        assert_eq!(response.metadata.total_results, 2);
        assert_eq!(response.metadata.relevant_results, 1);
        assert_eq!(response.results.len(), 1);
        // No vector signal was involved, so no embedding leaves the engine
        assert!(response.results[0].message.embedding.is_empty());
        assert!(response.metadata.vector_weight.is_none());
    }
}
