//! Error taxonomy of the indexing use cases.
//!
//! | Error | Class | Job outcome |
//! |-------|-------|-------------|
//! | `Configuration`, `NotFound`, `InvalidPayload`, `Domain` | configuration | `FatalFailure` (poisoned) |
//! | `Repository`, `Search`, `Publish` | infrastructure | `RetryableFailure` (redelivered) |
//! | `EmbeddingError`, upload `SearchError` inside the pipeline | transient provider | absorbed, message re-enqueued |

use ragworks_core::DomainError;
use ragworks_jobs::{JobName, JobOutcome, TransportError};

/// Repository (database) failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository connection error: {0}")]
    Connection(String),

    #[error("repository query failed: {0}")]
    Query(String),

    #[error("stored row is invalid: {0}")]
    Decode(String),

    #[error("repository lock poisoned")]
    LockPoisoned,
}

/// Search index failure (reads or writes).
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("search service request failed: {0}")]
    Request(String),

    #[error("search service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("search response could not be decoded: {0}")]
    Decode(String),

    #[error("search index lock poisoned")]
    LockPoisoned,
}

/// Embedding provider failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("embedding response was malformed: {0}")]
    Malformed(String),
}

/// Follow-on job could not be enqueued.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("could not encode job payload: {0}")]
    Encode(#[from] ragworks_jobs::CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("job {0} is not consumed from a queue")]
    NotQueued(JobName),
}

#[derive(Debug, thiserror::Error)]
pub enum IndexingError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid job payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl IndexingError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Repository, network or queue failure unrelated to the job's own inputs.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            IndexingError::Repository(_) | IndexingError::Search(_) | IndexingError::Publish(_)
        )
    }

    pub fn into_outcome(self) -> JobOutcome {
        if self.is_infrastructure() {
            JobOutcome::retryable(self)
        } else {
            JobOutcome::fatal(self)
        }
    }
}
