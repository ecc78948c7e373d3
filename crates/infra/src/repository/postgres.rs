//! Postgres-backed repositories.
//!
//! Expected schema (owned by the platform's API service, not migrated here):
//!
//! | Table | Columns |
//! |-------|---------|
//! | `tenants` | `id uuid`, `name text`, `search_service_endpoint text`, `index_name text`, `document_storage_bytes bigint` |
//! | `bots` | `id uuid`, `tenant_id uuid`, `name text`, `search_method text` |
//! | `documents` | `id uuid`, `tenant_id uuid`, `bot_id uuid`, `name text`, `file_extension text`, `status text`, `document_folder_id uuid null`, `external_id text null`, `file_size bigint`, `updated_at timestamptz` |
//! | `document_folders` | `id uuid`, `bot_id uuid`, `name text`, `parent_id uuid null` |
//!
//! ## Error Mapping
//!
//! | SQLx Error | RepositoryError |
//! |------------|-----------------|
//! | `PoolTimedOut`, `PoolClosed`, `Io`, `Tls` | `Connection` |
//! | column decode failures | `Decode` |
//! | anything else | `Query` |

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use ragworks_core::{
    Bot, BotId, Document, DocumentFolder, DocumentFolderId, DocumentId, DocumentStatus,
    SearchMethod, Tenant, TenantId,
};
use ragworks_indexing::{
    BotRepository, DocumentFolderRepository, DocumentRepository, RepositoryError,
    TenantRepository,
};

use crate::runtime::BlockingRuntime;

const MAX_CONNECTIONS: u32 = 5;

/// Pool plus the runtime that drives it; shared by every repository.
#[derive(Debug, Clone)]
pub struct PgContext {
    pool: PgPool,
    runtime: BlockingRuntime,
}

impl PgContext {
    pub fn connect(database_url: &str, runtime: BlockingRuntime) -> Result<Self, RepositoryError> {
        let pool = runtime
            .block_on(
                PgPoolOptions::new()
                    .max_connections(MAX_CONNECTIONS)
                    .connect(database_url),
            )
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self { pool, runtime })
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            RepositoryError::Connection(format!("{operation}: {err}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            RepositoryError::Decode(format!("{operation}: {err}"))
        }
        other => RepositoryError::Query(format!("{operation}: {other}")),
    }
}

fn to_i64(value: u64, column: &str) -> Result<i64, RepositoryError> {
    i64::try_from(value).map_err(|_| RepositoryError::Decode(format!("{column} out of range: {value}")))
}

fn to_u64(value: i64, column: &str) -> Result<u64, RepositoryError> {
    u64::try_from(value).map_err(|_| RepositoryError::Decode(format!("negative {column}: {value}")))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name).map_err(|e| map_sqlx_error("decode", e))
}

#[derive(Debug, Clone)]
pub struct PostgresTenantRepository {
    ctx: PgContext,
}

impl PostgresTenantRepository {
    pub fn new(ctx: PgContext) -> Self {
        Self { ctx }
    }
}

fn tenant_from_row(row: &PgRow) -> Result<Tenant, RepositoryError> {
    Ok(Tenant {
        id: TenantId::from_uuid(column(row, "id")?),
        name: column(row, "name")?,
        search_service_endpoint: column(row, "search_service_endpoint")?,
        index_name: column(row, "index_name")?,
        document_storage_bytes: to_u64(column(row, "document_storage_bytes")?, "document_storage_bytes")?,
    })
}

impl TenantRepository for PostgresTenantRepository {
    #[instrument(skip(self), fields(tenant_id = %id), err)]
    fn find_by_id(&self, id: TenantId) -> Result<Option<Tenant>, RepositoryError> {
        let row = self
            .ctx
            .runtime
            .block_on(
                sqlx::query(
                    r#"
                    SELECT id, name, search_service_endpoint, index_name, document_storage_bytes
                    FROM tenants
                    WHERE id = $1
                    "#,
                )
                .bind(id.as_uuid())
                .fetch_optional(&self.ctx.pool),
            )
            .map_err(|e| map_sqlx_error("find_tenant", e))?;

        row.as_ref().map(tenant_from_row).transpose()
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id), err)]
    fn update(&self, tenant: &Tenant) -> Result<(), RepositoryError> {
        let bytes = to_i64(tenant.document_storage_bytes, "document_storage_bytes")?;
        self.ctx
            .runtime
            .block_on(
                sqlx::query(
                    r#"
                    UPDATE tenants
                    SET name = $2, search_service_endpoint = $3, index_name = $4,
                        document_storage_bytes = $5
                    WHERE id = $1
                    "#,
                )
                .bind(tenant.id.as_uuid())
                .bind(&tenant.name)
                .bind(&tenant.search_service_endpoint)
                .bind(&tenant.index_name)
                .bind(bytes)
                .execute(&self.ctx.pool),
            )
            .map_err(|e| map_sqlx_error("update_tenant", e))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresBotRepository {
    ctx: PgContext,
}

impl PostgresBotRepository {
    pub fn new(ctx: PgContext) -> Self {
        Self { ctx }
    }
}

fn bot_from_row(row: &PgRow) -> Result<Bot, RepositoryError> {
    let method: String = column(row, "search_method")?;
    Ok(Bot {
        id: BotId::from_uuid(column(row, "id")?),
        tenant_id: TenantId::from_uuid(column(row, "tenant_id")?),
        name: column(row, "name")?,
        search_method: method
            .parse::<SearchMethod>()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
    })
}

impl BotRepository for PostgresBotRepository {
    #[instrument(skip(self), fields(bot_id = %id, tenant_id = %tenant_id), err)]
    fn find_by_id_and_tenant_id(
        &self,
        id: BotId,
        tenant_id: TenantId,
    ) -> Result<Option<Bot>, RepositoryError> {
        let row = self
            .ctx
            .runtime
            .block_on(
                sqlx::query(
                    r#"
                    SELECT id, tenant_id, name, search_method
                    FROM bots
                    WHERE id = $1 AND tenant_id = $2
                    "#,
                )
                .bind(id.as_uuid())
                .bind(tenant_id.as_uuid())
                .fetch_optional(&self.ctx.pool),
            )
            .map_err(|e| map_sqlx_error("find_bot", e))?;

        row.as_ref().map(bot_from_row).transpose()
    }

    #[instrument(skip(self, bot), fields(bot_id = %bot.id), err)]
    fn update(&self, bot: &Bot) -> Result<(), RepositoryError> {
        self.ctx
            .runtime
            .block_on(
                sqlx::query(
                    r#"
                    UPDATE bots
                    SET name = $3, search_method = $4
                    WHERE id = $1 AND tenant_id = $2
                    "#,
                )
                .bind(bot.id.as_uuid())
                .bind(bot.tenant_id.as_uuid())
                .bind(&bot.name)
                .bind(bot.search_method.as_str())
                .execute(&self.ctx.pool),
            )
            .map_err(|e| map_sqlx_error("update_bot", e))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresDocumentRepository {
    ctx: PgContext,
}

impl PostgresDocumentRepository {
    pub fn new(ctx: PgContext) -> Self {
        Self { ctx }
    }

    fn fetch_all(
        &self,
        operation: &str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<Document>, RepositoryError> {
        let rows = self
            .ctx
            .runtime
            .block_on(query.fetch_all(&self.ctx.pool))
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(document_from_row).collect()
    }
}

const DOCUMENT_COLUMNS: &str = "id, tenant_id, bot_id, name, file_extension, status, \
     document_folder_id, external_id, file_size, updated_at";

fn document_from_row(row: &PgRow) -> Result<Document, RepositoryError> {
    let status: String = column(row, "status")?;
    let folder: Option<Uuid> = column(row, "document_folder_id")?;
    Ok(Document {
        id: DocumentId::from_uuid(column(row, "id")?),
        tenant_id: TenantId::from_uuid(column(row, "tenant_id")?),
        bot_id: BotId::from_uuid(column(row, "bot_id")?),
        name: column(row, "name")?,
        file_extension: column(row, "file_extension")?,
        status: status
            .parse::<DocumentStatus>()
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        document_folder_id: folder.map(DocumentFolderId::from_uuid),
        external_id: column(row, "external_id")?,
        file_size: to_u64(column(row, "file_size")?, "file_size")?,
        updated_at: column(row, "updated_at")?,
    })
}

impl DocumentRepository for PostgresDocumentRepository {
    #[instrument(skip(self), fields(document_id = %id, bot_id = %bot_id), err)]
    fn find_by_id_and_bot_id(
        &self,
        id: DocumentId,
        bot_id: BotId,
    ) -> Result<Option<Document>, RepositoryError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND bot_id = $2");
        let query = sqlx::query(&sql).bind(*id.as_uuid()).bind(*bot_id.as_uuid());
        Ok(self.fetch_all("find_document", query)?.into_iter().next())
    }

    #[instrument(skip(self), fields(bot_id = %bot_id), err)]
    fn find_by_bot_id(&self, bot_id: BotId) -> Result<Vec<Document>, RepositoryError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE bot_id = $1 ORDER BY id");
        self.fetch_all("find_documents_by_bot", sqlx::query(&sql).bind(*bot_id.as_uuid()))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    fn find_by_tenant_id(&self, tenant_id: TenantId) -> Result<Vec<Document>, RepositoryError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE tenant_id = $1 ORDER BY id");
        self.fetch_all(
            "find_documents_by_tenant",
            sqlx::query(&sql).bind(*tenant_id.as_uuid()),
        )
    }

    #[instrument(skip(self), err)]
    fn find_stalled(
        &self,
        updated_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Document>, RepositoryError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE status IN ('pending', 'processing') AND updated_at < $1 \
             ORDER BY updated_at ASC LIMIT $2"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.fetch_all(
            "find_stalled_documents",
            sqlx::query(&sql).bind(updated_before).bind(limit),
        )
    }

    #[instrument(skip(self, document), fields(document_id = %document.id, status = %document.status), err)]
    fn update(&self, document: &Document) -> Result<(), RepositoryError> {
        let file_size = to_i64(document.file_size, "file_size")?;
        self.ctx
            .runtime
            .block_on(
                sqlx::query(
                    r#"
                    UPDATE documents
                    SET name = $3, file_extension = $4, status = $5, document_folder_id = $6,
                        external_id = $7, file_size = $8, updated_at = $9
                    WHERE id = $1 AND bot_id = $2
                    "#,
                )
                .bind(document.id.as_uuid())
                .bind(document.bot_id.as_uuid())
                .bind(&document.name)
                .bind(&document.file_extension)
                .bind(document.status.as_str())
                .bind(document.document_folder_id.map(Uuid::from))
                .bind(&document.external_id)
                .bind(file_size)
                .bind(document.updated_at)
                .execute(&self.ctx.pool),
            )
            .map_err(|e| map_sqlx_error("update_document", e))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresDocumentFolderRepository {
    ctx: PgContext,
}

impl PostgresDocumentFolderRepository {
    pub fn new(ctx: PgContext) -> Self {
        Self { ctx }
    }
}

impl DocumentFolderRepository for PostgresDocumentFolderRepository {
    #[instrument(skip(self), fields(document_folder_id = %id, bot_id = %bot_id), err)]
    fn find_by_id_and_bot_id(
        &self,
        id: DocumentFolderId,
        bot_id: BotId,
    ) -> Result<Option<DocumentFolder>, RepositoryError> {
        let row = self
            .ctx
            .runtime
            .block_on(
                sqlx::query(
                    r#"
                    SELECT id, bot_id, name, parent_id
                    FROM document_folders
                    WHERE id = $1 AND bot_id = $2
                    "#,
                )
                .bind(id.as_uuid())
                .bind(bot_id.as_uuid())
                .fetch_optional(&self.ctx.pool),
            )
            .map_err(|e| map_sqlx_error("find_document_folder", e))?;

        row.as_ref()
            .map(|row| {
                let parent: Option<Uuid> = column(row, "parent_id")?;
                Ok(DocumentFolder {
                    id: DocumentFolderId::from_uuid(column(row, "id")?),
                    bot_id: BotId::from_uuid(column(row, "bot_id")?),
                    name: column(row, "name")?,
                    parent_id: parent.map(DocumentFolderId::from_uuid),
                })
            })
            .transpose()
    }
}
