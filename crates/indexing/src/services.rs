//! Shared collaborators handed to every use case.

use std::sync::Arc;

use ragworks_core::{Bot, BotId, Document, DocumentId, Tenant, TenantId};

use crate::error::IndexingError;
use crate::ports::{
    BotRepository, CognitiveSearchService, DocumentFolderRepository, DocumentRepository,
    EmbeddingService, TenantRepository,
};
use crate::publisher::JobPublisher;

/// Adapter bundle; cheap to clone.
#[derive(Clone)]
pub struct IndexingServices {
    pub tenants: Arc<dyn TenantRepository>,
    pub bots: Arc<dyn BotRepository>,
    pub documents: Arc<dyn DocumentRepository>,
    pub folders: Arc<dyn DocumentFolderRepository>,
    pub search: Arc<dyn CognitiveSearchService>,
    pub embeddings: Arc<dyn EmbeddingService>,
    pub publisher: JobPublisher,
}

impl IndexingServices {
    pub fn load_tenant(&self, id: TenantId) -> Result<Tenant, IndexingError> {
        self.tenants
            .find_by_id(id)?
            .ok_or_else(|| IndexingError::not_found("tenant", id))
    }

    pub fn load_bot(&self, id: BotId, tenant_id: TenantId) -> Result<Bot, IndexingError> {
        self.bots
            .find_by_id_and_tenant_id(id, tenant_id)?
            .ok_or_else(|| IndexingError::not_found("bot", id))
    }

    pub fn load_document(&self, id: DocumentId, bot_id: BotId) -> Result<Document, IndexingError> {
        self.documents
            .find_by_id_and_bot_id(id, bot_id)?
            .ok_or_else(|| IndexingError::not_found("document", id))
    }
}

impl core::fmt::Debug for IndexingServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IndexingServices").finish_non_exhaustive()
    }
}
