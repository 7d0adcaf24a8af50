//! ============================================================================
//! HTTP Model Provider - OpenAI-compatible embeddings and chat completions
//! ============================================================================
//! Every failure (transport, HTTP status, parse, timeout) is logged and
//! collapsed to ModelOutput::Unavailable per the capability contract.
//! ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ModelOutput, ModelProvider};

/// Default embedding model (OpenAI compatible)
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default chat model for importance rating and summaries
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Bounded timeout for every model call; timeout == unavailable
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Model provider backed by an OpenAI-compatible HTTP API
pub struct HttpModelProvider {
    client: Client,
    api_key: String,
    base_url: String,
    embedding_model: String,
    chat_model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl HttpModelProvider {
    /// Create a provider against the OpenAI API
    pub fn new_openai(api_key: String) -> Self {
        Self::new_custom(
            api_key,
            "https://api.openai.com/v1".to_string(),
            DEFAULT_EMBEDDING_MODEL.to_string(),
            DEFAULT_CHAT_MODEL.to_string(),
        )
    }

    /// Create with custom base URL and model names
    pub fn new_custom(
        api_key: String,
        base_url: String,
        embedding_model: String,
        chat_model: String,
    ) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url,
            embedding_model,
            chat_model,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Option<R> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!("Model request to {} failed: {}", path, e);
                return None;
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                warn!("Failed to read model response body: {}", e);
                return None;
            }
        };

        if !status.is_success() {
            warn!("Model API error ({}) from {}: {}", status, path, text);
            return None;
        }

        match serde_json::from_str(&text) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Failed to parse model response from {}: {}", path, e);
                None
            }
        }
    }
}

#[async_trait]
impl ModelProvider for HttpModelProvider {
    async fn generate_embedding(&self, text: &str) -> ModelOutput<Vec<f32>> {
        if text.trim().is_empty() {
            return ModelOutput::Unavailable;
        }

        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: vec![text.to_string()],
        };

        let Some(response) = self
            .post_json::<_, EmbeddingResponse>("/embeddings", &request)
            .await
        else {
            return ModelOutput::Unavailable;
        };

        let mut data = response.data;
        data.sort_by_key(|d| d.index);

        match data.into_iter().next() {
            Some(first) if !first.embedding.is_empty() => {
                debug!("Embedded {} chars", text.len());
                ModelOutput::Ready(first.embedding)
            }
            _ => {
                warn!("Embedding API returned no vector");
                ModelOutput::Unavailable
            }
        }
    }

    async fn generate_text(&self, prompt: &str) -> ModelOutput<String> {
        let request = ChatRequest {
            model: self.chat_model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let Some(response) = self
            .post_json::<_, ChatResponse>("/chat/completions", &request)
            .await
        else {
            return ModelOutput::Unavailable;
        };

        match response.choices.into_iter().next() {
            Some(choice) if !choice.message.content.trim().is_empty() => {
                ModelOutput::Ready(choice.message.content)
            }
            _ => {
                warn!("Chat API returned no content");
                ModelOutput::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_creation() {
        let provider = HttpModelProvider::new_openai("test-key".to_string());
        assert_eq!(provider.base_url(), "https://api.openai.com/v1");
    }

    #[tokio::test]
    async fn empty_text_is_unavailable_without_network() {
        let provider = HttpModelProvider::new_openai("test-key".to_string());
        assert_eq!(
            provider.generate_embedding("   ").await,
            ModelOutput::Unavailable
        );
    }
}
