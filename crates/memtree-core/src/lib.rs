//! ============================================================================
//! MEMTREE-CORE: Conversational Memory Engine
//! ============================================================================
//! This crate handles all backend logic for the memtree service:
//! - Message ingestion with background memory consolidation
//! - Long-term memory nodes with reinforcement, merge, decay and pruning
//! - Hybrid vector + full-text retrieval with graceful degradation
//! - Storage composition over redb, qdrant and tantivy
//! ============================================================================

pub mod capability;
pub mod config;
pub mod conversation;
pub mod error;
pub mod memory;
pub mod service;
pub mod similarity;
pub mod store;

// Re-export main types for convenience
pub use capability::{HttpModelProvider, ModelOutput, ModelProvider, OfflineModel};
pub use config::{MemoryConfig, SearchConfig};
pub use conversation::{Message, MessageAck, MessageKind, NewMessage, SearchResponse};
pub use error::{Error, StoreError};
pub use memory::{MemoryNode, RememberOutcome};
pub use service::{HealthReport, Memtree, RetrieveResponse};
