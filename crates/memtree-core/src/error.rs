//! ============================================================================
//! Error Taxonomy - Typed failures for the memory service
//! ============================================================================
//! Validation failures are caller errors and never retried. Store failures
//! carry the failing operation name. Capability unavailability is NOT an
//! error anywhere in this crate; see `capability::ModelOutput`.
//! ============================================================================

use thiserror::Error;

/// Top-level error type for memtree-core operations
#[derive(Debug, Error)]
pub enum Error {
    /// A required field was empty or whitespace-only
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    /// A provided timestamp string failed RFC 3339 parsing
    #[error("invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// An embedding was present but had the wrong length
    #[error("embedding length mismatch: expected {expected}, got {actual}")]
    EmbeddingDimension { expected: usize, actual: usize },

    /// Two vectors passed to cosine similarity differ in length
    #[error("vectors differ in length: {left} vs {right}")]
    VectorLength { left: usize, right: usize },

    /// A persistence-layer failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// True for client-side failures that should never be retried
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyField { .. }
                | Error::InvalidTimestamp { .. }
                | Error::EmbeddingDimension { .. }
                | Error::VectorLength { .. }
        )
    }
}

/// Failure from one of the storage backends (redb, qdrant, tantivy)
#[derive(Debug, Error)]
#[error("store operation '{op}' failed: {source}")]
pub struct StoreError {
    pub op: &'static str,
    #[source]
    pub source: anyhow::Error,
}

impl StoreError {
    pub fn new(op: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self {
            op,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_classification() {
        assert!(Error::EmptyField { field: "text" }.is_validation());
        assert!(Error::EmbeddingDimension {
            expected: 1536,
            actual: 128
        }
        .is_validation());
        let store = Error::Store(StoreError::new("insert", anyhow::anyhow!("down")));
        assert!(!store.is_validation());
    }

    #[test]
    fn messages_name_the_offender() {
        let err = Error::EmptyField { field: "user_id" };
        assert_eq!(err.to_string(), "user_id must not be empty");

        let err = Error::EmbeddingDimension {
            expected: 1536,
            actual: 128,
        };
        assert!(err.to_string().contains("1536"));
        assert!(err.to_string().contains("128"));
    }
}
