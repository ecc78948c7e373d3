//! Job handler contract.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::descriptor::{JobName, RetryPolicy};

/// Everything a handler gets for one delivery.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job: JobName,
    /// Decoded message body (`Null` for timer jobs).
    pub payload: JsonValue,
    /// Deliveries so far, including this one (`0` for timer jobs).
    pub dequeue_count: u32,
    pub retry: RetryPolicy,
}

impl JobContext {
    pub fn timer(job: JobName, retry: RetryPolicy) -> Self {
        Self {
            job,
            payload: JsonValue::Null,
            dequeue_count: 0,
            retry,
        }
    }

    /// Deserialize the payload into the job's message type.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Whether the dispatcher will poison the message if this delivery fails.
    pub fn is_final_attempt(&self) -> bool {
        self.retry.is_final_attempt(self.dequeue_count)
    }
}

/// Result of one handler run.
///
/// The dispatcher performs queue mechanics purely from this tag.
#[derive(Debug)]
pub enum JobOutcome {
    /// Work is done; the message is deleted.
    Success,
    /// Transient failure; the message is redelivered while budget remains.
    RetryableFailure(anyhow::Error),
    /// Retrying cannot help; the message is poisoned.
    FatalFailure(anyhow::Error),
}

impl JobOutcome {
    pub fn retryable(error: impl Into<anyhow::Error>) -> Self {
        Self::RetryableFailure(error.into())
    }

    pub fn fatal(error: impl Into<anyhow::Error>) -> Self {
        Self::FatalFailure(error.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success)
    }
}

/// Job-specific logic, registered with the dispatcher under a [`JobName`].
///
/// Handlers must be idempotent: a message can be redelivered without any failure being
/// reported (lease expiry after a worker crash).
pub trait JobHandler: Send + Sync {
    fn handle(&self, ctx: &JobContext) -> JobOutcome;
}

impl<F> JobHandler for F
where
    F: Fn(&JobContext) -> JobOutcome + Send + Sync,
{
    fn handle(&self, ctx: &JobContext) -> JobOutcome {
        self(ctx)
    }
}
