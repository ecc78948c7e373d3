//! Documents and their processing status.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::DomainError;
use crate::id::{BotId, DocumentFolderId, DocumentId, TenantId};

/// Processing status of a document.
///
/// This is the only success/failure signal the rest of the platform observes. Every
/// variant serializes to its own string.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Deleting,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 5] = [
        DocumentStatus::Pending,
        DocumentStatus::Processing,
        DocumentStatus::Completed,
        DocumentStatus::Failed,
        DocumentStatus::Deleting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
            DocumentStatus::Deleting => "deleting",
        }
    }

    /// Statuses in which a document is still waiting on the indexing pipeline.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, DocumentStatus::Pending | DocumentStatus::Processing)
    }
}

impl core::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::unknown_variant("document status", s))
    }
}

/// A document owned by a bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub tenant_id: TenantId,
    pub bot_id: BotId,
    /// Name without extension.
    pub name: String,
    pub file_extension: String,
    pub status: DocumentStatus,
    /// `None` when the document sits at the bot's root.
    pub document_folder_id: Option<DocumentFolderId>,
    /// Identifier in the external data connector (Box, SharePoint, ...) it was synced from.
    pub external_id: Option<String>,
    pub file_size: u64,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        tenant_id: TenantId,
        bot_id: BotId,
        name: impl Into<String>,
        file_extension: impl Into<String>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            tenant_id,
            bot_id,
            name: name.into(),
            file_extension: file_extension.into(),
            status: DocumentStatus::Pending,
            document_folder_id: None,
            external_id: None,
            file_size: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn in_folder(mut self, folder_id: DocumentFolderId) -> Self {
        self.document_folder_id = Some(folder_id);
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_file_size(mut self, bytes: u64) -> Self {
        self.file_size = bytes;
        self
    }

    /// `name.ext`, or just `name` when there is no extension.
    pub fn file_name(&self) -> String {
        if self.file_extension.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.file_extension)
        }
    }

    /// Blob location for a document under the given folder path (`/` or `/a/b/`).
    pub fn blob_path(&self, folder_path: &str) -> String {
        format!("{}{}{}", self.bot_id, folder_path, self.file_name())
    }

    pub fn is_from_external_connector(&self) -> bool {
        self.external_id.is_some()
    }

    pub fn set_status(&mut self, status: DocumentStatus) {
        self.status = status;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Entity for Document {
    type Id = DocumentId;

    fn id(&self) -> DocumentId {
        self.id
    }
}
