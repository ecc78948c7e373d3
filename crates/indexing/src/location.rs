//! Document location: folder path resolution and chunk relocation.
//!
//! Shared by the name and path synchronizers and by search-method migration.

use std::collections::HashSet;

use tracing::{debug, info};

use ragworks_core::{
    Bot, BotId, ChunkHeader, Document, DocumentFolderId, DocumentStatus, DomainError, FolderPath,
    SearchMethod, Tenant,
};

use crate::error::IndexingError;
use crate::messages::CreateEmbeddingsMessage;
use crate::ports::DocumentFolderRepository;
use crate::services::IndexingServices;

/// Walk `folder_id` up to the bot root and build the folder path.
pub fn resolve_folder_path(
    folders: &dyn DocumentFolderRepository,
    bot_id: BotId,
    folder_id: Option<DocumentFolderId>,
) -> Result<FolderPath, IndexingError> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut next = folder_id;

    while let Some(id) = next {
        if !seen.insert(id) {
            return Err(DomainError::invariant(format!("folder cycle through {id}")).into());
        }
        let folder = folders
            .find_by_id_and_bot_id(id, bot_id)?
            .ok_or_else(|| IndexingError::not_found("document folder", id))?;
        next = folder.parent_id;
        chain.push(folder);
    }

    chain.reverse();
    Ok(FolderPath::from_ancestors(&chain)?)
}

/// Whether moving a document under `method` invalidates its vectors.
///
/// The content vector is computed over the location header, so only methods that embed
/// the path and carry vectors need to re-run the pipeline.
pub fn requires_revectorization(method: SearchMethod) -> bool {
    method.embeds_path_in_content() && method.requires_embeddings()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relocation {
    /// Every chunk already pointed at the target location.
    Unchanged,
    /// Chunks written back with their vectors kept.
    Rewritten,
    /// Chunks written back unvectorized and the pipeline re-enqueued.
    Revectorizing,
    /// File name changed under a method that keeps content vectors; title vectors were
    /// dropped and the pipeline re-enqueued to recompute them.
    Retitling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationReport {
    pub relocation: Relocation,
    pub chunks: usize,
    pub rewritten: usize,
}

/// Point every indexed chunk of `document` at `folder_path` and settle its status.
pub fn relocate_document(
    services: &IndexingServices,
    tenant: &Tenant,
    bot: &Bot,
    document: &mut Document,
    folder_path: &FolderPath,
) -> Result<RelocationReport, IndexingError> {
    let target = tenant.search_target();
    let method = bot.search_method;

    let mut chunks = services
        .search
        .find_index_documents_by_bot_id_and_document_id(&target, bot.id, document.id)?;
    let total = chunks.len();

    let file_name = document.file_name();
    let header = ChunkHeader::new(folder_path, &file_name);
    let blob_path = document.blob_path(folder_path.as_str());
    let revectorize = requires_revectorization(method);
    let mut retitled = false;

    chunks.retain_mut(|chunk| {
        let renamed = chunk.file_name != file_name;
        let changed = chunk.relocate(
            method,
            &header,
            &blob_path,
            &file_name,
            document.document_folder_id,
        );
        if changed && revectorize {
            chunk.invalidate_vectors();
        } else if renamed && method.requires_title_vector() {
            chunk.invalidate_title_vector();
            retitled = true;
        }
        changed
    });

    if chunks.is_empty() {
        debug!(document_id = %document.id, chunks = total, "document already at its location");
        return Ok(RelocationReport {
            relocation: Relocation::Unchanged,
            chunks: total,
            rewritten: 0,
        });
    }

    services
        .search
        .create_or_update_document_chunks(&target, &chunks)?;

    let relocation = if revectorize || retitled {
        document.set_status(DocumentStatus::Processing);
        services.documents.update(document)?;
        services
            .publisher
            .publish(&CreateEmbeddingsMessage::new(tenant.id, bot.id, document.id))?;
        if revectorize {
            Relocation::Revectorizing
        } else {
            Relocation::Retitling
        }
    } else {
        // A document still waiting on the pipeline keeps its status.
        if !document.status.is_in_flight() {
            document.set_status(DocumentStatus::Completed);
            services.documents.update(document)?;
        }
        Relocation::Rewritten
    };

    info!(
        document_id = %document.id,
        path = %folder_path,
        rewritten = chunks.len(),
        ?relocation,
        "relocated document chunks"
    );

    Ok(RelocationReport {
        relocation,
        chunks: total,
        rewritten: chunks.len(),
    })
}
