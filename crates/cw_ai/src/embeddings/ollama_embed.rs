use std::time::Duration;

use cw_core::error::AppError;
use cw_core::normalize::truncate_chars;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Embedder;
use crate::ollama::OllamaClient;

/// Longest input sent to the daemon. Chunks are far shorter; queries are not bounded upstream.
const MAX_INPUT_CHARS: usize = 12_000;
const EMBED_TIMEOUT: Duration = Duration::from_secs(10);

/// Embeds text through a local Ollama daemon's `/api/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embeddings", self.client.base_url())
    }
}

#[derive(Serialize)]
struct EmbedBody<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedReply {
    #[serde(default)]
    embedding: Vec<f32>,
}

fn embed_error(message: &str, details: impl Into<String>) -> AppError {
    AppError::new("EMBEDDINGS_FAILED", message).with_details(details)
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let body = EmbedBody {
            model,
            prompt: truncate_chars(input, MAX_INPUT_CHARS),
        };
        let payload = serde_json::to_value(&body)
            .map_err(|e| embed_error("Could not encode embedding request", e.to_string()))?;

        let reply = match ureq::post(&self.endpoint()).timeout(EMBED_TIMEOUT).send_json(payload) {
            Ok(r) => r,
            Err(ureq::Error::Status(code, _)) => {
                return Err(embed_error(
                    "Embedding service rejected the request",
                    format!("status={code}; model={model}"),
                ));
            }
            Err(e) => {
                return Err(
                    embed_error("Embedding service did not answer", e.to_string()).with_retryable(true),
                );
            }
        };

        let parsed: EmbedReply = reply
            .into_json()
            .map_err(|e| embed_error("Could not decode embedding reply", e.to_string()))?;
        if parsed.embedding.is_empty() {
            return Err(embed_error("Embedding reply had no vector", format!("model={model}")));
        }
        debug!(model, dims = parsed.embedding.len(), "embedded text");
        Ok(parsed.embedding)
    }
}
