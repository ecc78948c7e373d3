//! Collaborator interfaces consumed by the indexing use cases.
//!
//! All calls are blocking and sequential; every implementation must be `Send + Sync` so
//! one set of adapters can be shared by every handler registered on a dispatcher.

use chrono::{DateTime, Utc};

use ragworks_core::{
    Bot, BotId, Document, DocumentChunk, DocumentFolder, DocumentFolderId, DocumentId,
    SearchMethod, SearchTarget, Tenant, TenantId,
};

use crate::error::{EmbeddingError, RepositoryError, SearchError};

pub trait TenantRepository: Send + Sync {
    fn find_by_id(&self, id: TenantId) -> Result<Option<Tenant>, RepositoryError>;

    fn update(&self, tenant: &Tenant) -> Result<(), RepositoryError>;
}

pub trait BotRepository: Send + Sync {
    fn find_by_id_and_tenant_id(
        &self,
        id: BotId,
        tenant_id: TenantId,
    ) -> Result<Option<Bot>, RepositoryError>;

    fn update(&self, bot: &Bot) -> Result<(), RepositoryError>;
}

pub trait DocumentRepository: Send + Sync {
    fn find_by_id_and_bot_id(
        &self,
        id: DocumentId,
        bot_id: BotId,
    ) -> Result<Option<Document>, RepositoryError>;

    fn find_by_bot_id(&self, bot_id: BotId) -> Result<Vec<Document>, RepositoryError>;

    fn find_by_tenant_id(&self, tenant_id: TenantId) -> Result<Vec<Document>, RepositoryError>;

    /// Pending/processing documents not touched since `updated_before`, oldest first.
    fn find_stalled(
        &self,
        updated_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Document>, RepositoryError>;

    fn update(&self, document: &Document) -> Result<(), RepositoryError>;
}

pub trait DocumentFolderRepository: Send + Sync {
    fn find_by_id_and_bot_id(
        &self,
        id: DocumentFolderId,
        bot_id: BotId,
    ) -> Result<Option<DocumentFolder>, RepositoryError>;
}

/// The tenant's search index (external collaborator).
///
/// "Without vectors" means the chunk is not flagged `is_vectorized` or lacks a vector the
/// bot's search method requires.
pub trait CognitiveSearchService: Send + Sync {
    fn get_document_count_without_vectors(
        &self,
        target: &SearchTarget,
        bot_id: BotId,
        document_id: DocumentId,
        search_method: SearchMethod,
    ) -> Result<usize, SearchError>;

    /// Up to `limit` chunks without vectors, ordered by chunk id.
    fn get_documents_without_vectors(
        &self,
        target: &SearchTarget,
        bot_id: BotId,
        document_id: DocumentId,
        search_method: SearchMethod,
        limit: usize,
    ) -> Result<Vec<DocumentChunk>, SearchError>;

    /// Upsert chunks by id.
    fn create_or_update_document_chunks(
        &self,
        target: &SearchTarget,
        chunks: &[DocumentChunk],
    ) -> Result<(), SearchError>;

    /// Every chunk of a document, ordered by chunk id.
    fn find_index_documents_by_bot_id_and_document_id(
        &self,
        target: &SearchTarget,
        bot_id: BotId,
        document_id: DocumentId,
    ) -> Result<Vec<DocumentChunk>, SearchError>;
}

/// Embedding provider (external collaborator).
pub trait EmbeddingService: Send + Sync {
    fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}
