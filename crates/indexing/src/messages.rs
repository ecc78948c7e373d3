//! Queue message payloads.
//!
//! Each payload carries only the identifiers needed to re-resolve entities. There is no
//! schema version: optional keys default when missing.

use serde::{Deserialize, Serialize};

use ragworks_core::{BotId, DocumentFolderId, DocumentId, SearchMethod, TenantId};
use ragworks_jobs::JobName;

/// A payload that is consumed by exactly one queue job.
pub trait JobMessage: Serialize {
    const JOB: JobName;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEmbeddingsMessage {
    pub tenant_id: TenantId,
    pub bot_id: BotId,
    pub document_id: DocumentId,
    /// Consecutive re-enqueued passes that vectorized nothing.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub failed_passes: u32,
}

impl CreateEmbeddingsMessage {
    pub fn new(tenant_id: TenantId, bot_id: BotId, document_id: DocumentId) -> Self {
        Self {
            tenant_id,
            bot_id,
            document_id,
            failed_passes: 0,
        }
    }
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl JobMessage for CreateEmbeddingsMessage {
    const JOB: JobName = JobName::CreateEmbeddings;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDocumentNameMessage {
    pub tenant_id: TenantId,
    pub bot_id: BotId,
    pub document_id: DocumentId,
}

impl JobMessage for SyncDocumentNameMessage {
    const JOB: JobName = JobName::SyncDocumentName;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDocumentPathMessage {
    pub tenant_id: TenantId,
    pub bot_id: BotId,
    /// Folder whose rename/move triggered the cascade; `None` for the bot root.
    #[serde(default)]
    pub document_folder_id: Option<DocumentFolderId>,
    #[serde(default)]
    pub document_ids: Vec<DocumentId>,
}

impl JobMessage for SyncDocumentPathMessage {
    const JOB: JobName = JobName::SyncDocumentPath;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculateStorageUsageMessage {
    pub tenant_id: TenantId,
}

impl JobMessage for CalculateStorageUsageMessage {
    const JOB: JobName = JobName::CalculateStorageUsage;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateBotSearchMethodMessage {
    pub tenant_id: TenantId,
    pub bot_id: BotId,
    pub search_method: SearchMethod,
}

impl JobMessage for MigrateBotSearchMethodMessage {
    const JOB: JobName = JobName::MigrateBotSearchMethod;
}
