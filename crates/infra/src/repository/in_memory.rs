//! In-memory repositories for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use ragworks_core::{
    Bot, BotId, Document, DocumentFolder, DocumentFolderId, DocumentId, Entity, Tenant, TenantId,
};
use ragworks_indexing::{
    BotRepository, DocumentFolderRepository, DocumentRepository, RepositoryError,
    TenantRepository,
};

/// Entity table keyed by id.
///
/// One generic store backs every repository trait; `update` is an upsert.
#[derive(Debug)]
pub struct InMemoryStore<E: Entity> {
    rows: RwLock<HashMap<E::Id, E>>,
}

pub type InMemoryTenantRepository = InMemoryStore<Tenant>;
pub type InMemoryBotRepository = InMemoryStore<Bot>;
pub type InMemoryDocumentRepository = InMemoryStore<Document>;
pub type InMemoryDocumentFolderRepository = InMemoryStore<DocumentFolder>;

impl<E: Entity + Clone> InMemoryStore<E> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, entity: E) {
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(entity.id(), entity);
        }
    }

    pub fn get(&self, id: E::Id) -> Option<E> {
        self.rows.read().ok()?.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, predicate: impl Fn(&E) -> bool) -> Result<Vec<E>, RepositoryError> {
        let rows = self.rows.read().map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(rows.values().filter(|e| predicate(e)).cloned().collect())
    }

    fn find_one(&self, predicate: impl Fn(&E) -> bool) -> Result<Option<E>, RepositoryError> {
        let rows = self.rows.read().map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(rows.values().find(|e| predicate(e)).cloned())
    }

    fn upsert(&self, entity: &E) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().map_err(|_| RepositoryError::LockPoisoned)?;
        rows.insert(entity.id(), entity.clone());
        Ok(())
    }
}

impl<E: Entity + Clone> Default for InMemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantRepository for InMemoryStore<Tenant> {
    fn find_by_id(&self, id: TenantId) -> Result<Option<Tenant>, RepositoryError> {
        self.find_one(|t| t.id == id)
    }

    fn update(&self, tenant: &Tenant) -> Result<(), RepositoryError> {
        self.upsert(tenant)
    }
}

impl BotRepository for InMemoryStore<Bot> {
    fn find_by_id_and_tenant_id(
        &self,
        id: BotId,
        tenant_id: TenantId,
    ) -> Result<Option<Bot>, RepositoryError> {
        self.find_one(|b| b.id == id && b.tenant_id == tenant_id)
    }

    fn update(&self, bot: &Bot) -> Result<(), RepositoryError> {
        self.upsert(bot)
    }
}

impl DocumentRepository for InMemoryStore<Document> {
    fn find_by_id_and_bot_id(
        &self,
        id: DocumentId,
        bot_id: BotId,
    ) -> Result<Option<Document>, RepositoryError> {
        self.find_one(|d| d.id == id && d.bot_id == bot_id)
    }

    fn find_by_bot_id(&self, bot_id: BotId) -> Result<Vec<Document>, RepositoryError> {
        let mut documents = self.find(|d| d.bot_id == bot_id)?;
        documents.sort_by_key(|d| d.id);
        Ok(documents)
    }

    fn find_by_tenant_id(&self, tenant_id: TenantId) -> Result<Vec<Document>, RepositoryError> {
        let mut documents = self.find(|d| d.tenant_id == tenant_id)?;
        documents.sort_by_key(|d| d.id);
        Ok(documents)
    }

    fn find_stalled(
        &self,
        updated_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Document>, RepositoryError> {
        let mut documents = self.find(|d| d.status.is_in_flight() && d.updated_at < updated_before)?;
        documents.sort_by_key(|d| d.updated_at);
        documents.truncate(limit);
        Ok(documents)
    }

    fn update(&self, document: &Document) -> Result<(), RepositoryError> {
        self.upsert(document)
    }
}

impl DocumentFolderRepository for InMemoryStore<DocumentFolder> {
    fn find_by_id_and_bot_id(
        &self,
        id: DocumentFolderId,
        bot_id: BotId,
    ) -> Result<Option<DocumentFolder>, RepositoryError> {
        self.find_one(|f| f.id == id && f.bot_id == bot_id)
    }
}
