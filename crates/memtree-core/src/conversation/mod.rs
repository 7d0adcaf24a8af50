//! ============================================================================
//! Conversation - Messages, ingestion and retrieval
//! ============================================================================

pub mod ingest;
pub mod log;
pub mod search;
pub mod types;

pub use ingest::Ingestor;
pub use log::ConversationLog;
pub use search::{Retriever, ScoredMessage, SearchMetadata, SearchResponse};
pub use types::{Message, MessageAck, MessageKind, NewMessage};
