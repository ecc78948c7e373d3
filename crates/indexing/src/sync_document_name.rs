//! Re-point a renamed document's chunks at its new file name.

use tracing::{info, instrument};

use ragworks_core::DocumentStatus;

use crate::error::IndexingError;
use crate::location::{RelocationReport, relocate_document, resolve_folder_path};
use crate::messages::SyncDocumentNameMessage;
use crate::services::IndexingServices;

pub struct SyncDocumentName {
    services: IndexingServices,
}

impl SyncDocumentName {
    pub fn new(services: IndexingServices) -> Self {
        Self { services }
    }

    /// Returns `None` when the document is being deleted.
    #[instrument(
        skip(self, message),
        fields(
            tenant_id = %message.tenant_id,
            bot_id = %message.bot_id,
            document_id = %message.document_id,
        )
    )]
    pub fn execute(
        &self,
        message: &SyncDocumentNameMessage,
    ) -> Result<Option<RelocationReport>, IndexingError> {
        let services = &self.services;
        let tenant = services.load_tenant(message.tenant_id)?;
        let bot = services.load_bot(message.bot_id, message.tenant_id)?;
        let mut document = services.load_document(message.document_id, message.bot_id)?;

        if document.status == DocumentStatus::Deleting {
            info!("document is being deleted, skipping");
            return Ok(None);
        }

        let path = resolve_folder_path(services.folders.as_ref(), bot.id, document.document_folder_id)?;
        let report = relocate_document(services, &tenant, &bot, &mut document, &path)?;
        Ok(Some(report))
    }
}
