//! ============================================================================
//! Capability Boundary - Embedding and text generation as swappable traits
//! ============================================================================
//! The model side of the system is an opaque collaborator: given text,
//! return a fixed-length vector; given a prompt, return generated text.
//! Both degrade to `ModelOutput::Unavailable` on any failure so every
//! caller must branch on availability explicitly - there is no error path
//! out of this module.
//! ============================================================================

mod openai;

pub use openai::{HttpModelProvider, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};

use async_trait::async_trait;

/// Expected embedding dimension (text-embedding-3-small)
pub const EMBEDDING_DIM: usize = 1536;

/// Outcome of a model invocation: the value, or a degraded-mode marker
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput<T> {
    Ready(T),
    Unavailable,
}

impl<T> ModelOutput<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, ModelOutput::Ready(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            ModelOutput::Ready(value) => Some(value),
            ModelOutput::Unavailable => None,
        }
    }
}

/// Embedding + text generation capability consumed by the engines
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Embed a piece of text. Unavailable on any failure; never panics
    /// or errors. A `Ready` vector is always `EMBEDDING_DIM`-sized for
    /// the production provider, but callers validate length themselves.
    async fn generate_embedding(&self, text: &str) -> ModelOutput<Vec<f32>>;

    /// Generate free text for a prompt. Unavailable on any failure.
    async fn generate_text(&self, prompt: &str) -> ModelOutput<String>;
}

/// Provider that is permanently unavailable.
///
/// Used when no API credentials are configured: the service keeps working
/// through its documented degraded paths (full-text-only search, default
/// importance, truncated summaries).
pub struct OfflineModel;

#[async_trait]
impl ModelProvider for OfflineModel {
    async fn generate_embedding(&self, _text: &str) -> ModelOutput<Vec<f32>> {
        ModelOutput::Unavailable
    }

    async fn generate_text(&self, _prompt: &str) -> ModelOutput<String> {
        ModelOutput::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_model_is_never_available() {
        let model = OfflineModel;
        assert_eq!(
            model.generate_embedding("anything").await,
            ModelOutput::Unavailable
        );
        assert_eq!(
            model.generate_text("anything").await,
            ModelOutput::Unavailable
        );
    }

    #[test]
    fn output_into_option() {
        assert_eq!(ModelOutput::Ready(3).into_option(), Some(3));
        assert_eq!(ModelOutput::<i32>::Unavailable.into_option(), None);
    }
}
