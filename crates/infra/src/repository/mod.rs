//! Tenant, bot, document and folder repositories.

pub mod in_memory;
pub mod postgres;

pub use in_memory::{
    InMemoryBotRepository, InMemoryDocumentFolderRepository, InMemoryDocumentRepository,
    InMemoryStore, InMemoryTenantRepository,
};
pub use postgres::{
    PgContext, PostgresBotRepository, PostgresDocumentFolderRepository,
    PostgresDocumentRepository, PostgresTenantRepository,
};
