//! Job dispatcher: one lease, one handler run, one queue lifecycle action.
//!
//! ## Execution flow
//!
//! ```text
//! execute(job_name)
//!   ↓
//! 1. Resolve JobDescriptor (unknown name → configuration error, no queue interaction)
//!   ↓
//! 2. Timer job → run handler once, propagate failure
//!    Queue job → lease one message (none → no-op)
//!   ↓
//! 3. dequeue_count at/over budget → poison + delete, handler never runs
//!   ↓
//! 4. Decode body (base64 → UTF-8 → JSON) and run the registered handler
//!   ↓
//! 5. Success → delete
//!    RetryableFailure under budget → reset visibility
//!    otherwise → poison + delete
//! ```
//!
//! The dispatcher never inspects job-specific errors; it acts on the [`JobOutcome`] tag
//! and the descriptor's [`RetryPolicy`] only.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::descriptor::{JobDescriptor, JobKind, JobName, RetryPolicy};
use crate::handler::{JobContext, JobHandler, JobOutcome};
use crate::message::{QueueMessage, decode_payload};
use crate::transport::{QueueTransport, TransportError};

/// How long a leased message stays hidden from other workers.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// What happened to a failed message.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Visibility reset; the message will be delivered again.
    Requeued,
    /// Moved to the poison queue and deleted from the live queue.
    Poisoned,
    /// Timer job; there was no message.
    NoMessage,
}

/// Successful (non-error) result of [`JobDispatcher::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// The queue had no visible message.
    Idle,
    /// Handler succeeded and the message was deleted.
    Completed { message_id: String },
    /// Budget was already exhausted at lease time; poisoned without running the handler.
    Poisoned { message_id: String, dequeue_count: u32 },
    /// Timer job ran to completion.
    TimerCompleted,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown job: {0}")]
    UnknownJob(String),

    #[error("no handler registered for job {0}")]
    NoHandler(JobName),

    #[error("queue transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("job {job} failed ({disposition:?}): {source:#}")]
    Failed {
        job: JobName,
        disposition: Disposition,
        #[source]
        source: anyhow::Error,
    },

    /// The handler failed and the follow-up queue action failed too.
    #[error("job {job} failed ({failure:#}) and the message could not be {disposition:?}: {source}")]
    Unsettled {
        job: JobName,
        disposition: Disposition,
        failure: anyhow::Error,
        #[source]
        source: TransportError,
    },
}

impl DispatchError {
    /// Misconfiguration of the worker itself rather than a job failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, DispatchError::UnknownJob(_) | DispatchError::NoHandler(_))
    }
}

/// Resolves jobs to handlers and drives queue lifecycle actions.
///
/// The transport is injected once; there is no process-wide client.
pub struct JobDispatcher<T: QueueTransport> {
    transport: T,
    handlers: HashMap<JobName, Box<dyn JobHandler>>,
    visibility_timeout: Duration,
    max_dequeue_count: Option<u32>,
}

impl<T: QueueTransport> JobDispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            handlers: HashMap::new(),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            max_dequeue_count: None,
        }
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// Override the retry budget of every job in the table.
    pub fn with_max_dequeue_count(mut self, max: u32) -> Self {
        self.max_dequeue_count = Some(max);
        self
    }

    /// Register (or replace) the handler for a job.
    pub fn register<H>(&mut self, job: JobName, handler: H) -> &mut Self
    where
        H: JobHandler + 'static,
    {
        self.handlers.insert(job, Box::new(handler));
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Effective retry policy of a job, including any budget override.
    pub fn retry_policy(&self, descriptor: &JobDescriptor) -> RetryPolicy {
        match self.max_dequeue_count {
            Some(max) => descriptor.retry.with_max_dequeue_count(max),
            None => descriptor.retry,
        }
    }

    /// Run one invocation of the job named `job_name`.
    #[instrument(skip(self), err)]
    pub fn execute(&self, job_name: &str) -> Result<Dispatched, DispatchError> {
        let descriptor = JobDescriptor::lookup(job_name)
            .ok_or_else(|| DispatchError::UnknownJob(job_name.to_string()))?;
        let handler = self
            .handlers
            .get(&descriptor.name)
            .ok_or(DispatchError::NoHandler(descriptor.name))?;
        let retry = self.retry_policy(descriptor);

        match descriptor.kind {
            JobKind::Timer => self.run_timer(descriptor.name, retry, handler.as_ref()),
            JobKind::Queue { queue } => {
                self.run_queue(descriptor.name, queue, retry, handler.as_ref())
            }
        }
    }

    fn run_timer(
        &self,
        job: JobName,
        retry: RetryPolicy,
        handler: &dyn JobHandler,
    ) -> Result<Dispatched, DispatchError> {
        let ctx = JobContext::timer(job, retry);
        match handler.handle(&ctx) {
            JobOutcome::Success => {
                info!(job = %job, "timer job completed");
                Ok(Dispatched::TimerCompleted)
            }
            JobOutcome::RetryableFailure(source) | JobOutcome::FatalFailure(source) => {
                error!(job = %job, error = %format!("{source:#}"), "timer job failed");
                Err(DispatchError::Failed {
                    job,
                    disposition: Disposition::NoMessage,
                    source,
                })
            }
        }
    }

    fn run_queue(
        &self,
        job: JobName,
        queue: &str,
        retry: RetryPolicy,
        handler: &dyn JobHandler,
    ) -> Result<Dispatched, DispatchError> {
        let Some(message) = self.transport.lease(queue, self.visibility_timeout)? else {
            debug!(job = %job, queue, "no message available");
            return Ok(Dispatched::Idle);
        };

        debug!(
            job = %job,
            queue,
            message_id = %message.id,
            dequeue_count = message.dequeue_count,
            "leased message"
        );

        if retry.is_exhausted(message.dequeue_count) {
            warn!(
                job = %job,
                queue,
                message_id = %message.id,
                dequeue_count = message.dequeue_count,
                max_dequeue_count = retry.max_dequeue_count,
                "retry budget exhausted before handling; poisoning"
            );
            self.poison(queue, &message)?;
            return Ok(Dispatched::Poisoned {
                message_id: message.id,
                dequeue_count: message.dequeue_count,
            });
        }

        let outcome = match decode_payload(&message.content) {
            Ok(payload) => handler.handle(&JobContext {
                job,
                payload,
                dequeue_count: message.dequeue_count,
                retry,
            }),
            Err(e) => JobOutcome::fatal(e),
        };

        match outcome {
            JobOutcome::Success => {
                self.transport.delete(queue, &message)?;
                info!(job = %job, message_id = %message.id, "message processed");
                Ok(Dispatched::Completed {
                    message_id: message.id,
                })
            }
            JobOutcome::RetryableFailure(source) if retry.should_retry(message.dequeue_count) => {
                warn!(
                    job = %job,
                    message_id = %message.id,
                    dequeue_count = message.dequeue_count,
                    error = %format!("{source:#}"),
                    "job failed; message will be redelivered"
                );
                let disposition = Disposition::Requeued;
                if let Err(e) = self.transport.reset_visibility(queue, &message) {
                    return Err(unsettled(job, disposition, source, e));
                }
                Err(DispatchError::Failed {
                    job,
                    disposition,
                    source,
                })
            }
            JobOutcome::RetryableFailure(source) | JobOutcome::FatalFailure(source) => {
                error!(
                    job = %job,
                    message_id = %message.id,
                    dequeue_count = message.dequeue_count,
                    error = %format!("{source:#}"),
                    "job failed; poisoning message"
                );
                let disposition = Disposition::Poisoned;
                if let Err(e) = self.poison(queue, &message) {
                    return Err(unsettled(job, disposition, source, e));
                }
                Err(DispatchError::Failed {
                    job,
                    disposition,
                    source,
                })
            }
        }
    }

    fn poison(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError> {
        self.transport.send_to_poison(queue, message)?;
        self.transport.delete(queue, message)
    }
}

fn unsettled(
    job: JobName,
    disposition: Disposition,
    failure: anyhow::Error,
    source: TransportError,
) -> DispatchError {
    error!(
        job = %job,
        ?disposition,
        failure = %format!("{failure:#}"),
        error = %source,
        "queue action after a failed job did not complete"
    );
    DispatchError::Unsettled {
        job,
        disposition,
        failure,
        source,
    }
}
