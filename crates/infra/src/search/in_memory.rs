//! In-memory search index for tests/dev.
//!
//! Chunks are grouped per index name and kept ordered by chunk id, matching the ordering
//! the pipeline relies on. Reads and uploads can be made to fail for fault-injection tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ragworks_core::{BotId, DocumentChunk, DocumentId, SearchMethod, SearchTarget};
use ragworks_indexing::{CognitiveSearchService, SearchError};

type Index = BTreeMap<String, DocumentChunk>;

#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    indexes: RwLock<HashMap<String, Index>>,
    fail_reads: AtomicBool,
    fail_uploads: AtomicBool,
    upload_calls: AtomicUsize,
    uploaded_chunks: AtomicUsize,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed chunks without counting an upload.
    pub fn insert(&self, target: &SearchTarget, chunks: impl IntoIterator<Item = DocumentChunk>) {
        if let Ok(mut indexes) = self.indexes.write() {
            let index = indexes.entry(target.index_name.clone()).or_default();
            for chunk in chunks {
                index.insert(chunk.id.clone(), chunk);
            }
        }
    }

    /// Every chunk of a document, ordered by id.
    pub fn chunks(&self, target: &SearchTarget, document_id: DocumentId) -> Vec<DocumentChunk> {
        self.indexes
            .read()
            .ok()
            .and_then(|indexes| {
                indexes.get(&target.index_name).map(|index| {
                    index
                        .values()
                        .filter(|c| c.document_id == document_id)
                        .cloned()
                        .collect()
                })
            })
            .unwrap_or_default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// Chunks written through `create_or_update_document_chunks`.
    pub fn uploaded_chunks(&self) -> usize {
        self.uploaded_chunks.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<(), SearchError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SearchError::Status {
                status: 503,
                body: "search service unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn select(
        &self,
        target: &SearchTarget,
        predicate: impl Fn(&DocumentChunk) -> bool,
    ) -> Result<Vec<DocumentChunk>, SearchError> {
        self.check_read()?;
        let indexes = self.indexes.read().map_err(|_| SearchError::LockPoisoned)?;
        Ok(indexes
            .get(&target.index_name)
            .map(|index| index.values().filter(|c| predicate(c)).cloned().collect())
            .unwrap_or_default())
    }
}

fn lacks_vectors(chunk: &DocumentChunk, method: SearchMethod) -> bool {
    !chunk.is_vectorized || !chunk.has_required_vectors(method)
}

impl CognitiveSearchService for InMemorySearchIndex {
    fn get_document_count_without_vectors(
        &self,
        target: &SearchTarget,
        bot_id: BotId,
        document_id: DocumentId,
        search_method: SearchMethod,
    ) -> Result<usize, SearchError> {
        let chunks = self.select(target, |c| {
            c.bot_id == bot_id && c.document_id == document_id && lacks_vectors(c, search_method)
        })?;
        Ok(chunks.len())
    }

    fn get_documents_without_vectors(
        &self,
        target: &SearchTarget,
        bot_id: BotId,
        document_id: DocumentId,
        search_method: SearchMethod,
        limit: usize,
    ) -> Result<Vec<DocumentChunk>, SearchError> {
        let mut chunks = self.select(target, |c| {
            c.bot_id == bot_id && c.document_id == document_id && lacks_vectors(c, search_method)
        })?;
        chunks.truncate(limit);
        Ok(chunks)
    }

    fn create_or_update_document_chunks(
        &self,
        target: &SearchTarget,
        chunks: &[DocumentChunk],
    ) -> Result<(), SearchError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(SearchError::Request("upload rejected".to_string()));
        }

        let mut indexes = self.indexes.write().map_err(|_| SearchError::LockPoisoned)?;
        let index = indexes.entry(target.index_name.clone()).or_default();
        for chunk in chunks {
            index.insert(chunk.id.clone(), chunk.clone());
        }
        self.uploaded_chunks.fetch_add(chunks.len(), Ordering::SeqCst);
        Ok(())
    }

    fn find_index_documents_by_bot_id_and_document_id(
        &self,
        target: &SearchTarget,
        bot_id: BotId,
        document_id: DocumentId,
    ) -> Result<Vec<DocumentChunk>, SearchError> {
        self.select(target, |c| c.bot_id == bot_id && c.document_id == document_id)
    }
}
