//! ============================================================================
//! Memory - Long-term memory nodes and their consolidation
//! ============================================================================

pub mod consolidate;
pub mod importance;
pub mod store;
pub mod types;

pub use consolidate::Consolidator;
pub use store::MemoryIndex;
pub use types::{MemoryNode, RelevanceBreakdown, RememberOutcome, ScoredMemory};
