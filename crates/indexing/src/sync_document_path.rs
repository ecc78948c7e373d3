//! Bulk relocation after a folder is renamed or moved.
//!
//! A folder change cascades to every document beneath it. Work per invocation is capped by
//! the number of chunks processed; the ids not reached are handed to a fresh message.

use std::collections::HashMap;

use tracing::{info, instrument, warn};

use ragworks_core::{DocumentFolderId, DocumentStatus, FolderPath};

use crate::error::IndexingError;
use crate::location::{Relocation, relocate_document, resolve_folder_path};
use crate::messages::SyncDocumentPathMessage;
use crate::services::IndexingServices;

/// Chunks one invocation may process before handing the rest on.
pub const MAX_PROCESSED_CHUNKS: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSyncReport {
    pub documents: usize,
    pub processed_chunks: usize,
    pub revectorizing: usize,
    pub skipped: usize,
    /// Ids handed to the follow-up message.
    pub deferred: usize,
}

pub struct SyncDocumentPath {
    services: IndexingServices,
    max_processed_chunks: usize,
}

impl SyncDocumentPath {
    pub fn new(services: IndexingServices) -> Self {
        Self {
            services,
            max_processed_chunks: MAX_PROCESSED_CHUNKS,
        }
    }

    pub fn with_max_processed_chunks(mut self, max: usize) -> Self {
        self.max_processed_chunks = max.max(1);
        self
    }

    #[instrument(
        skip(self, message),
        fields(
            tenant_id = %message.tenant_id,
            bot_id = %message.bot_id,
            documents = message.document_ids.len(),
        )
    )]
    pub fn execute(&self, message: &SyncDocumentPathMessage) -> Result<PathSyncReport, IndexingError> {
        let services = &self.services;
        let tenant = services.load_tenant(message.tenant_id)?;
        let bot = services.load_bot(message.bot_id, message.tenant_id)?;

        if let Some(folder_id) = message.document_folder_id {
            services
                .folders
                .find_by_id_and_bot_id(folder_id, bot.id)?
                .ok_or_else(|| IndexingError::not_found("document folder", folder_id))?;
        }

        let mut paths: HashMap<Option<DocumentFolderId>, FolderPath> = HashMap::new();
        let mut report = PathSyncReport::default();
        let mut ids = message.document_ids.iter();

        for &document_id in ids.by_ref() {
            let Some(mut document) = services.documents.find_by_id_and_bot_id(document_id, bot.id)?
            else {
                warn!(%document_id, "document no longer exists, skipping");
                report.skipped += 1;
                continue;
            };
            if document.status == DocumentStatus::Deleting {
                report.skipped += 1;
                continue;
            }

            let path = match paths.get(&document.document_folder_id) {
                Some(path) => path.clone(),
                None => {
                    let path =
                        resolve_folder_path(services.folders.as_ref(), bot.id, document.document_folder_id)?;
                    paths.insert(document.document_folder_id, path.clone());
                    path
                }
            };

            let relocated = relocate_document(services, &tenant, &bot, &mut document, &path)?;
            report.documents += 1;
            report.processed_chunks += relocated.chunks;
            if matches!(
                relocated.relocation,
                Relocation::Revectorizing | Relocation::Retitling
            ) {
                report.revectorizing += 1;
            }

            if report.processed_chunks >= self.max_processed_chunks {
                break;
            }
        }

        let rest: Vec<_> = ids.copied().collect();
        if !rest.is_empty() {
            report.deferred = rest.len();
            services.publisher.publish(&SyncDocumentPathMessage {
                tenant_id: message.tenant_id,
                bot_id: message.bot_id,
                document_folder_id: message.document_folder_id,
                document_ids: rest,
            })?;
        }

        info!(
            documents = report.documents,
            processed_chunks = report.processed_chunks,
            deferred = report.deferred,
            "path sync pass finished"
        );
        Ok(report)
    }
}
