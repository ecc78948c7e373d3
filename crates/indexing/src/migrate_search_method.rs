//! One-shot switch of a bot to another search method.

use tracing::{info, instrument};

use ragworks_core::{ChunkHeader, DocumentStatus};

use crate::error::IndexingError;
use crate::location::resolve_folder_path;
use crate::messages::{CreateEmbeddingsMessage, MigrateBotSearchMethodMessage};
use crate::services::IndexingServices;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub documents: usize,
    pub chunks: usize,
    pub reembedding: usize,
}

pub struct MigrateBotSearchMethod {
    services: IndexingServices,
}

impl MigrateBotSearchMethod {
    pub fn new(services: IndexingServices) -> Self {
        Self { services }
    }

    #[instrument(
        skip(self, message),
        fields(
            tenant_id = %message.tenant_id,
            bot_id = %message.bot_id,
            to = %message.search_method,
        )
    )]
    pub fn execute(
        &self,
        message: &MigrateBotSearchMethodMessage,
    ) -> Result<MigrationReport, IndexingError> {
        let services = &self.services;
        let tenant = services.load_tenant(message.tenant_id)?;
        let mut bot = services.load_bot(message.bot_id, message.tenant_id)?;

        let from = bot.search_method;
        let to = message.search_method;
        let mut report = MigrationReport::default();
        if from == to {
            info!("bot already uses the requested method");
            return Ok(report);
        }

        bot.search_method = to;
        services.bots.update(&bot)?;

        let target = tenant.search_target();
        for mut document in services.documents.find_by_bot_id(bot.id)? {
            if document.status == DocumentStatus::Deleting {
                continue;
            }

            let path = resolve_folder_path(services.folders.as_ref(), bot.id, document.document_folder_id)?;
            let header = ChunkHeader::new(&path, &document.file_name());

            let mut chunks = services
                .search
                .find_index_documents_by_bot_id_and_document_id(&target, bot.id, document.id)?;
            for chunk in &mut chunks {
                chunk.reformat(from, to, &header);
                if to.requires_embeddings() {
                    chunk.invalidate_vectors();
                }
            }
            if !chunks.is_empty() {
                services.search.create_or_update_document_chunks(&target, &chunks)?;
            }

            report.documents += 1;
            report.chunks += chunks.len();

            if to.requires_embeddings() {
                document.set_status(DocumentStatus::Processing);
                services.documents.update(&document)?;
                services
                    .publisher
                    .publish(&CreateEmbeddingsMessage::new(tenant.id, bot.id, document.id))?;
                report.reembedding += 1;
            } else {
                document.set_status(DocumentStatus::Completed);
                services.documents.update(&document)?;
            }
        }

        info!(%from, documents = report.documents, chunks = report.chunks, "search method migrated");
        Ok(report)
    }
}
