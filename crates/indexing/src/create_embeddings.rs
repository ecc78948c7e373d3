//! Resumable embedding pipeline.
//!
//! One invocation vectorizes at most [`EMBEDDING_BATCH_SIZE`] chunks of a document and
//! either completes the document or re-enqueues itself. Progress lives in the search
//! index (`is_vectorized`), so redelivery and concurrent runs converge. Passes that
//! vectorize nothing are counted on the message; the budget caps them.

use tracing::{debug, error, info, instrument, warn};

use ragworks_core::{DocumentChunk, DocumentStatus, SearchMethod};
use ragworks_jobs::RetryPolicy;

use crate::error::IndexingError;
use crate::messages::{CalculateStorageUsageMessage, CreateEmbeddingsMessage, SyncDocumentPathMessage};
use crate::services::IndexingServices;

/// Chunks vectorized per invocation.
pub const EMBEDDING_BATCH_SIZE: usize = 100;

/// What one invocation achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProgress {
    /// The document is being deleted; nothing was done.
    Skipped,
    /// Every chunk carries its vectors; the document is COMPLETED.
    Completed { vectorized: usize },
    /// Work remains (or a provider call failed); the document was enqueued again.
    Requeued { vectorized: usize, remaining: usize },
    /// Too many consecutive passes vectorized nothing; the document is FAILED.
    GaveUp { failed_passes: u32 },
}

pub struct CreateEmbeddings {
    services: IndexingServices,
}

impl CreateEmbeddings {
    pub fn new(services: IndexingServices) -> Self {
        Self { services }
    }

    /// Run one pass for the document named in `message`.
    ///
    /// When an infrastructure error escapes on the final attempt the retry budget allows,
    /// the document is marked FAILED before the error is returned. Re-enqueued passes that
    /// make no progress are charged against the same budget through
    /// [`CreateEmbeddingsMessage::failed_passes`].
    #[instrument(
        skip(self, message, retry),
        fields(
            tenant_id = %message.tenant_id,
            bot_id = %message.bot_id,
            document_id = %message.document_id,
        )
    )]
    pub fn execute(
        &self,
        message: &CreateEmbeddingsMessage,
        dequeue_count: u32,
        retry: RetryPolicy,
    ) -> Result<EmbeddingProgress, IndexingError> {
        match self.run(message, retry) {
            Ok(progress) => Ok(progress),
            Err(err) if err.is_infrastructure() && retry.is_final_attempt(dequeue_count) => {
                error!(error = %err, dequeue_count, "embedding failed on final attempt");
                self.mark_failed(message);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn run(
        &self,
        message: &CreateEmbeddingsMessage,
        retry: RetryPolicy,
    ) -> Result<EmbeddingProgress, IndexingError> {
        let services = &self.services;
        let tenant = services.load_tenant(message.tenant_id)?;
        let bot = services.load_bot(message.bot_id, message.tenant_id)?;
        let method = bot.search_method;

        if !method.requires_embeddings() {
            return Err(IndexingError::configuration(format!(
                "bot {} uses {method}, which has no embeddings",
                bot.id
            )));
        }

        let mut document = services.load_document(message.document_id, message.bot_id)?;
        if document.status == DocumentStatus::Deleting {
            info!("document is being deleted, skipping");
            return Ok(EmbeddingProgress::Skipped);
        }

        let target = tenant.search_target();
        let remaining =
            services
                .search
                .get_document_count_without_vectors(&target, bot.id, document.id, method)?;

        if remaining == 0 {
            document.set_status(DocumentStatus::Completed);
            services.documents.update(&document)?;
            debug!("no chunk without vectors, document completed");
            return Ok(EmbeddingProgress::Completed { vectorized: 0 });
        }

        let batch = services.search.get_documents_without_vectors(
            &target,
            bot.id,
            document.id,
            method,
            EMBEDDING_BATCH_SIZE,
        )?;

        let (vectorized, mut interrupted) = self.vectorize(batch, method);
        let mut done = vectorized.len();

        if !vectorized.is_empty() {
            if let Err(err) = services
                .search
                .create_or_update_document_chunks(&target, &vectorized)
            {
                warn!(error = %err, chunks = done, "uploading vectorized chunks failed");
                interrupted = true;
                done = 0;
            }
        }

        if !interrupted && remaining <= EMBEDDING_BATCH_SIZE {
            document.set_status(DocumentStatus::Completed);
            services.documents.update(&document)?;

            services.publisher.publish(&CalculateStorageUsageMessage {
                tenant_id: tenant.id,
            })?;
            if document.is_from_external_connector() {
                services.publisher.publish(&SyncDocumentPathMessage {
                    tenant_id: tenant.id,
                    bot_id: bot.id,
                    document_folder_id: document.document_folder_id,
                    document_ids: vec![document.id],
                })?;
            }

            info!(vectorized = done, "document completed");
            return Ok(EmbeddingProgress::Completed { vectorized: done });
        }

        let failed_passes = if done == 0 {
            message.failed_passes.saturating_add(1)
        } else {
            0
        };

        if failed_passes >= retry.max_dequeue_count {
            error!(failed_passes, "no progress within the retry budget, giving up");
            document.set_status(DocumentStatus::Failed);
            services.documents.update(&document)?;
            return Ok(EmbeddingProgress::GaveUp { failed_passes });
        }

        // Persisting PROCESSING on every pass doubles as a heartbeat for stalled recovery.
        document.set_status(DocumentStatus::Processing);
        services.documents.update(&document)?;
        services.publisher.publish(&CreateEmbeddingsMessage {
            failed_passes,
            ..message.clone()
        })?;

        let left = remaining.saturating_sub(done);
        info!(
            vectorized = done,
            remaining = left,
            interrupted,
            failed_passes,
            "document re-enqueued"
        );
        Ok(EmbeddingProgress::Requeued {
            vectorized: done,
            remaining: left,
        })
    }

    /// Attach vectors in order, stopping at the first provider failure.
    ///
    /// A content vector already on the chunk is kept; only the missing vectors are requested.
    /// Returns the chunks vectorized so far and whether a failure cut the batch short.
    fn vectorize(
        &self,
        batch: Vec<DocumentChunk>,
        method: SearchMethod,
    ) -> (Vec<DocumentChunk>, bool) {
        let embeddings = &self.services.embeddings;
        let mut vectorized = Vec::with_capacity(batch.len());

        for mut chunk in batch {
            let content_vector = match chunk.content_vector.take() {
                Some(vector) => vector,
                None => match embeddings.generate_embeddings(&chunk.content) {
                    Ok(vector) => vector,
                    Err(err) => {
                        warn!(chunk_id = %chunk.id, error = %err, "content embedding failed");
                        return (vectorized, true);
                    }
                },
            };

            let title_vector = if method.requires_title_vector() {
                match embeddings.generate_embeddings(&chunk.file_name) {
                    Ok(vector) => Some(vector),
                    Err(err) => {
                        warn!(chunk_id = %chunk.id, error = %err, "title embedding failed");
                        return (vectorized, true);
                    }
                }
            } else {
                None
            };

            chunk.set_vectors(content_vector, title_vector);
            vectorized.push(chunk);
        }

        (vectorized, false)
    }

    fn mark_failed(&self, message: &CreateEmbeddingsMessage) {
        let services = &self.services;
        let result = services
            .load_document(message.document_id, message.bot_id)
            .and_then(|mut document| {
                document.set_status(DocumentStatus::Failed);
                services.documents.update(&document).map_err(IndexingError::from)
            });

        if let Err(err) = result {
            warn!(error = %err, "could not mark document as failed");
        }
    }
}
