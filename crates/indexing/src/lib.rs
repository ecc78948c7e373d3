//! Document indexing jobs.
//!
//! Use cases driven by the job dispatcher: the resumable embedding pipeline, the name and
//! path synchronizers, storage accounting, stalled-document recovery and search-method
//! migration. Collaborators are reached through the traits in [`ports`].

pub mod create_embeddings;
pub mod error;
pub mod handlers;
pub mod location;
pub mod messages;
pub mod migrate_search_method;
pub mod ports;
pub mod publisher;
pub mod recover_stalled;
pub mod services;
pub mod storage_usage;
pub mod sync_document_name;
pub mod sync_document_path;

pub use create_embeddings::{CreateEmbeddings, EMBEDDING_BATCH_SIZE, EmbeddingProgress};
pub use error::{EmbeddingError, IndexingError, PublishError, RepositoryError, SearchError};
pub use handlers::{IndexingSettings, register_handlers};
pub use location::{Relocation, RelocationReport, requires_revectorization, resolve_folder_path};
pub use messages::{
    CalculateStorageUsageMessage, CreateEmbeddingsMessage, JobMessage,
    MigrateBotSearchMethodMessage, SyncDocumentNameMessage, SyncDocumentPathMessage,
};
pub use migrate_search_method::{MigrateBotSearchMethod, MigrationReport};
pub use ports::{
    BotRepository, CognitiveSearchService, DocumentFolderRepository, DocumentRepository,
    EmbeddingService, TenantRepository,
};
pub use publisher::JobPublisher;
pub use recover_stalled::{DEFAULT_STALLED_THRESHOLD, MAX_RECOVERED_PER_RUN, RecoverStalledDocuments};
pub use services::IndexingServices;
pub use storage_usage::CalculateStorageUsage;
pub use sync_document_name::SyncDocumentName;
pub use sync_document_path::{MAX_PROCESSED_CHUNKS, PathSyncReport, SyncDocumentPath};
