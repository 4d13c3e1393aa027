use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Error, Result};

/// Synchronous-contract embedding provider: texts in, vectors out, all the
/// same width.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Vector width this provider produces; collections are tagged with it
    fn dim(&self) -> usize;

    fn model_id(&self) -> &str;
}

/// HTTP client for an Ollama-compatible embedding endpoint
/// (`POST <base>/api/embed` with `{model, input}`).
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dim: usize,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, model: &str, dim: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dim,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status: status.as_u16(),
                body: oak_types::excerpt(&body, 200).to_string(),
            });
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|err| Error::MalformedResponse(err.to_string()))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(Error::BadEmbedding(format!(
                "asked for {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        for vector in &parsed.embeddings {
            if vector.len() != self.dim {
                return Err(Error::BadEmbedding(format!(
                    "expected dimension {}, got {}",
                    self.dim,
                    vector.len()
                )));
            }
        }

        Ok(parsed.embeddings)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
