//! REST client for the hosted cognitive-search service.
//!
//! The index only stores the `is_vectorized` flag as a filterable field, so "without
//! vectors" is evaluated as `is_vectorized eq false` on the service side.

use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, instrument};

use ragworks_core::{BotId, DocumentChunk, DocumentId, SearchMethod, SearchTarget};
use ragworks_indexing::{CognitiveSearchService, SearchError};

use crate::runtime::BlockingRuntime;

/// Page size when listing every chunk of a document.
const PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    http: reqwest::Client,
    runtime: BlockingRuntime,
    api_key: String,
    api_version: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "@odata.count")]
    count: Option<usize>,
    #[serde(default)]
    value: Vec<DocumentChunk>,
}

impl HttpSearchClient {
    pub fn new(runtime: BlockingRuntime, api_key: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            runtime,
            api_key: api_key.into(),
            api_version: api_version.into(),
        }
    }

    fn url(&self, target: &SearchTarget, operation: &str) -> String {
        format!(
            "{}/indexes/{}/docs/{}?api-version={}",
            target.endpoint.trim_end_matches('/'),
            target.index_name,
            operation,
            self.api_version
        )
    }

    fn post(&self, url: String, body: JsonValue) -> Result<reqwest::Response, SearchError> {
        self.runtime.block_on(async {
            let response = self
                .http
                .post(url)
                .header("api-key", &self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| SearchError::Request(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SearchError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(response)
        })
    }

    fn search(&self, target: &SearchTarget, body: JsonValue) -> Result<SearchResponse, SearchError> {
        let response = self.post(self.url(target, "search"), body)?;
        self.runtime
            .block_on(response.json::<SearchResponse>())
            .map_err(|e| SearchError::Decode(e.to_string()))
    }
}

fn document_filter(bot_id: BotId, document_id: DocumentId) -> String {
    format!("bot_id eq '{bot_id}' and document_id eq '{document_id}'")
}

fn unvectorized_filter(bot_id: BotId, document_id: DocumentId) -> String {
    format!("{} and is_vectorized eq false", document_filter(bot_id, document_id))
}

impl CognitiveSearchService for HttpSearchClient {
    #[instrument(skip(self, target), fields(index = %target.index_name), err)]
    fn get_document_count_without_vectors(
        &self,
        target: &SearchTarget,
        bot_id: BotId,
        document_id: DocumentId,
        _search_method: SearchMethod,
    ) -> Result<usize, SearchError> {
        let response = self.search(
            target,
            json!({
                "search": "*",
                "filter": unvectorized_filter(bot_id, document_id),
                "count": true,
                "top": 0,
            }),
        )?;
        response
            .count
            .ok_or_else(|| SearchError::Decode("missing @odata.count".to_string()))
    }

    #[instrument(skip(self, target), fields(index = %target.index_name), err)]
    fn get_documents_without_vectors(
        &self,
        target: &SearchTarget,
        bot_id: BotId,
        document_id: DocumentId,
        _search_method: SearchMethod,
        limit: usize,
    ) -> Result<Vec<DocumentChunk>, SearchError> {
        let response = self.search(
            target,
            json!({
                "search": "*",
                "filter": unvectorized_filter(bot_id, document_id),
                "orderby": "id asc",
                "top": limit,
            }),
        )?;
        Ok(response.value)
    }

    #[instrument(skip(self, target, chunks), fields(index = %target.index_name, chunks = chunks.len()), err)]
    fn create_or_update_document_chunks(
        &self,
        target: &SearchTarget,
        chunks: &[DocumentChunk],
    ) -> Result<(), SearchError> {
        let mut actions = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let mut action =
                serde_json::to_value(chunk).map_err(|e| SearchError::Decode(e.to_string()))?;
            if let Some(fields) = action.as_object_mut() {
                fields.insert("@search.action".to_string(), json!("mergeOrUpload"));
            }
            actions.push(action);
        }

        self.post(self.url(target, "index"), json!({ "value": actions }))?;
        debug!("chunks uploaded");
        Ok(())
    }

    #[instrument(skip(self, target), fields(index = %target.index_name), err)]
    fn find_index_documents_by_bot_id_and_document_id(
        &self,
        target: &SearchTarget,
        bot_id: BotId,
        document_id: DocumentId,
    ) -> Result<Vec<DocumentChunk>, SearchError> {
        let mut chunks = Vec::new();
        loop {
            let page = self.search(
                target,
                json!({
                    "search": "*",
                    "filter": document_filter(bot_id, document_id),
                    "orderby": "id asc",
                    "top": PAGE_SIZE,
                    "skip": chunks.len(),
                }),
            )?;
            let fetched = page.value.len();
            chunks.extend(page.value);
            if fetched < PAGE_SIZE {
                return Ok(chunks);
            }
        }
    }
}
