//! Typed enqueueing of follow-on jobs.

use std::sync::Arc;

use tracing::debug;

use ragworks_jobs::{QueueTransport, encode_payload};

use crate::error::PublishError;
use crate::messages::JobMessage;

/// Sends job payloads to the queue their job consumes from.
#[derive(Clone)]
pub struct JobPublisher {
    transport: Arc<dyn QueueTransport>,
}

impl JobPublisher {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }

    pub fn publish<M: JobMessage>(&self, message: &M) -> Result<(), PublishError> {
        let queue = M::JOB
            .descriptor()
            .queue_name()
            .ok_or(PublishError::NotQueued(M::JOB))?;
        let body = encode_payload(message)?;
        self.transport.send(queue, &body)?;
        debug!(job = %M::JOB, queue, "enqueued follow-on job");
        Ok(())
    }
}

impl core::fmt::Debug for JobPublisher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobPublisher").finish_non_exhaustive()
    }
}
