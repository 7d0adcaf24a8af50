//! ============================================================================
//! VectorIndex - Qdrant approximate nearest-neighbor search
//! ============================================================================
//! One collection per document type, cosine distance, points keyed by the
//! document UUID with a user_id payload for tenant filtering. Canonical
//! records live in redb; qdrant only answers "which ids are closest".
//! ============================================================================

use std::collections::HashMap;

use qdrant_client::qdrant::{
    point_id::PointIdOptions, Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    Filter, PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::StoreError;

/// Collection holding message embeddings
pub const MESSAGES_COLLECTION: &str = "memtree_messages";
/// Collection holding memory-node embeddings
pub const NODES_COLLECTION: &str = "memtree_memory_nodes";

/// ANN index backed by a Qdrant instance
pub struct VectorIndex {
    client: Qdrant,
}

impl VectorIndex {
    /// Connect to Qdrant and ensure both collections exist
    pub async fn connect(url: &str, embedding_dim: usize) -> Result<Self, StoreError> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| StoreError::new("connect qdrant", e))?;

        let index = Self { client };
        index
            .ensure_collection(MESSAGES_COLLECTION, embedding_dim)
            .await?;
        index
            .ensure_collection(NODES_COLLECTION, embedding_dim)
            .await?;

        Ok(index)
    }

    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<(), StoreError> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| StoreError::new("check collection", e))?;

        if !exists {
            info!("Creating collection: {}", name);

            self.client
                .create_collection(
                    CreateCollectionBuilder::new(name)
                        .vectors_config(VectorParamsBuilder::new(dim as u64, Distance::Cosine)),
                )
                .await
                .map_err(|e| StoreError::new("create collection", e))?;
        } else {
            debug!("Collection {} already exists", name);
        }

        Ok(())
    }

    /// Insert or overwrite one point
    pub async fn upsert(
        &self,
        collection: &str,
        id: Uuid,
        user_id: &str,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        let payload: HashMap<String, Value> =
            [("user_id".to_string(), Value::from(user_id.to_string()))]
                .into_iter()
                .collect();

        let point = PointStruct::new(id.to_string(), embedding.to_vec(), payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![point]))
            .await
            .map_err(|e| StoreError::new("upsert point", e))?;

        debug!("Upserted point {} into {}", id, collection);
        Ok(())
    }

    /// Top `limit` points for one user by cosine similarity
    pub async fn search(
        &self,
        collection: &str,
        user_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(Uuid, f32)>, StoreError> {
        let filter = Filter::must([Condition::matches("user_id", user_id.to_string())]);

        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, query.to_vec(), limit as u64)
                    .filter(filter)
                    .with_payload(false),
            )
            .await
            .map_err(|e| StoreError::new("vector search", e))?;

        let hits: Vec<(Uuid, f32)> = search_result
            .result
            .into_iter()
            .filter_map(|point| {
                let id = extract_uuid_from_point_id(point.id?)?;
                Some((id, point.score))
            })
            .collect();

        debug!(
            "Vector search in {} returned {} hits for user {}",
            collection,
            hits.len(),
            user_id
        );
        Ok(hits)
    }

    /// Delete one point by id
    pub async fn delete(&self, collection: &str, id: Uuid) -> Result<(), StoreError> {
        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(vec![id.to_string()]))
            .await
            .map_err(|e| StoreError::new("delete point", e))?;

        debug!("Deleted point {} from {}", id, collection);
        Ok(())
    }

    /// Check connectivity
    pub async fn healthy(&self) -> bool {
        match self.client.health_check().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Qdrant health check failed: {}", e);
                false
            }
        }
    }
}

// Helper to extract UUID from PointId
fn extract_uuid_from_point_id(point_id: qdrant_client::qdrant::PointId) -> Option<Uuid> {
    match point_id.point_id_options? {
        PointIdOptions::Uuid(uuid_str) => Uuid::parse_str(&uuid_str).ok(),
        PointIdOptions::Num(_) => None, // We use UUID strings, not numeric ids
    }
}
