//! Client for an OpenAI-compatible embeddings endpoint.

use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use ragworks_indexing::{EmbeddingError, EmbeddingService};

use crate::runtime::BlockingRuntime;

#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    http: reqwest::Client,
    runtime: BlockingRuntime,
    url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl HttpEmbeddingClient {
    pub fn new(
        runtime: BlockingRuntime,
        url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            runtime,
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

fn first_embedding(response: EmbeddingResponse) -> Result<Vec<f32>, EmbeddingError> {
    match response.data.into_iter().next() {
        Some(data) if !data.embedding.is_empty() => Ok(data.embedding),
        _ => Err(EmbeddingError::Malformed("no embedding in response".to_string())),
    }
}

impl EmbeddingService for HttpEmbeddingClient {
    #[instrument(skip(self, text), fields(model = %self.model, chars = text.len()), err)]
    fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self.runtime.block_on(async {
            let response = self
                .http
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&json!({ "input": text, "model": self.model }))
                .send()
                .await
                .map_err(|e| EmbeddingError::Request(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(EmbeddingError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            response
                .json::<EmbeddingResponse>()
                .await
                .map_err(|e| EmbeddingError::Malformed(e.to_string()))
        })?;

        first_embedding(response)
    }
}
