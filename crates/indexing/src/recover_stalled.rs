//! Timer job re-driving documents whose pipeline run was lost.
//!
//! The pipeline persists PROCESSING on every pass, so a document that stays
//! PENDING/PROCESSING without updates lost its message (poisoned, expired or never sent).

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::error::IndexingError;
use crate::messages::CreateEmbeddingsMessage;
use crate::services::IndexingServices;

pub const DEFAULT_STALLED_THRESHOLD: Duration = Duration::from_secs(6 * 60 * 60);

/// Documents re-enqueued per run.
pub const MAX_RECOVERED_PER_RUN: usize = 500;

pub struct RecoverStalledDocuments {
    services: IndexingServices,
    threshold: Duration,
    limit: usize,
}

impl RecoverStalledDocuments {
    pub fn new(services: IndexingServices, threshold: Duration) -> Self {
        Self {
            services,
            threshold,
            limit: MAX_RECOVERED_PER_RUN,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Re-enqueue documents idle since before `now - threshold`. Returns how many.
    #[instrument(skip(self))]
    pub fn execute(&self, now: DateTime<Utc>) -> Result<usize, IndexingError> {
        let services = &self.services;
        let threshold = chrono::Duration::from_std(self.threshold)
            .map_err(|err| IndexingError::configuration(format!("stalled threshold: {err}")))?;
        let cutoff = now - threshold;

        let stalled = services.documents.find_stalled(cutoff, self.limit)?;
        if stalled.is_empty() {
            return Ok(0);
        }

        let mut recovered = 0;
        for mut document in stalled {
            if !document.status.is_in_flight() {
                warn!(document_id = %document.id, status = %document.status, "not in flight, skipping");
                continue;
            }

            services.publisher.publish(&CreateEmbeddingsMessage::new(
                document.tenant_id,
                document.bot_id,
                document.id,
            ))?;
            // Touch so the next run does not enqueue it again while this message is pending.
            document.touch();
            services.documents.update(&document)?;
            recovered += 1;
        }

        info!(recovered, %cutoff, "stalled documents re-enqueued");
        Ok(recovered)
    }
}
