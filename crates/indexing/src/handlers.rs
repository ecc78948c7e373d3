//! Binding of the indexing use cases to the job dispatcher.

use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::debug;

use ragworks_jobs::{JobContext, JobDispatcher, JobHandler, JobName, JobOutcome, QueueTransport};

use crate::create_embeddings::CreateEmbeddings;
use crate::error::IndexingError;
use crate::migrate_search_method::MigrateBotSearchMethod;
use crate::recover_stalled::{DEFAULT_STALLED_THRESHOLD, RecoverStalledDocuments};
use crate::services::IndexingServices;
use crate::storage_usage::CalculateStorageUsage;
use crate::sync_document_name::SyncDocumentName;
use crate::sync_document_path::SyncDocumentPath;

/// Tunables of the indexing jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexingSettings {
    pub stalled_threshold: Duration,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            stalled_threshold: DEFAULT_STALLED_THRESHOLD,
        }
    }
}

/// Register a handler for every job in the table.
pub fn register_handlers<T: QueueTransport>(
    dispatcher: &mut JobDispatcher<T>,
    services: &IndexingServices,
    settings: IndexingSettings,
) {
    dispatcher
        .register(JobName::CreateEmbeddings, CreateEmbeddings::new(services.clone()))
        .register(JobName::SyncDocumentName, SyncDocumentName::new(services.clone()))
        .register(JobName::SyncDocumentPath, SyncDocumentPath::new(services.clone()))
        .register(
            JobName::CalculateStorageUsage,
            CalculateStorageUsage::new(services.clone()),
        )
        .register(
            JobName::MigrateBotSearchMethod,
            MigrateBotSearchMethod::new(services.clone()),
        )
        .register(
            JobName::RecoverStalledDocuments,
            RecoverStalledDocuments::new(services.clone(), settings.stalled_threshold),
        );
}

fn parse<T: DeserializeOwned>(ctx: &JobContext) -> Result<T, IndexingError> {
    Ok(ctx.parse()?)
}

fn outcome<T: core::fmt::Debug>(result: Result<T, IndexingError>) -> JobOutcome {
    match result {
        Ok(value) => {
            debug!(?value, "job finished");
            JobOutcome::Success
        }
        Err(err) => err.into_outcome(),
    }
}

impl JobHandler for CreateEmbeddings {
    fn handle(&self, ctx: &JobContext) -> JobOutcome {
        outcome(parse(ctx).and_then(|message| self.execute(&message, ctx.dequeue_count, ctx.retry)))
    }
}

impl JobHandler for SyncDocumentName {
    fn handle(&self, ctx: &JobContext) -> JobOutcome {
        outcome(parse(ctx).and_then(|message| self.execute(&message)))
    }
}

impl JobHandler for SyncDocumentPath {
    fn handle(&self, ctx: &JobContext) -> JobOutcome {
        outcome(parse(ctx).and_then(|message| self.execute(&message)))
    }
}

impl JobHandler for CalculateStorageUsage {
    fn handle(&self, ctx: &JobContext) -> JobOutcome {
        outcome(parse(ctx).and_then(|message| self.execute(&message)))
    }
}

impl JobHandler for MigrateBotSearchMethod {
    fn handle(&self, ctx: &JobContext) -> JobOutcome {
        outcome(parse(ctx).and_then(|message| self.execute(&message)))
    }
}

impl JobHandler for RecoverStalledDocuments {
    fn handle(&self, _ctx: &JobContext) -> JobOutcome {
        outcome(self.execute(Utc::now()))
    }
}
