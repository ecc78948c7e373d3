//! Queue transport abstraction (consumed interface).
//!
//! The transport is an external collaborator: durable storage, wire protocol and
//! replication are its business. The dispatcher relies only on the primitives below.
//!
//! ## Guarantees expected from implementations
//!
//! - **At-least-once**: a leased message that is neither deleted nor requeued becomes
//!   visible again once its visibility timeout lapses (e.g. the worker crashed)
//! - **Approximate FIFO** only
//! - **No transactions** across operations: poison-then-delete can leave a duplicate in
//!   the poison queue if the delete fails

use std::sync::Arc;
use std::time::Duration;

use crate::message::QueueMessage;

/// Poison queue paired with `queue`.
pub fn poison_queue_name(queue: &str) -> String {
    format!("{queue}-poison")
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("queue connection error: {0}")]
    Connection(String),

    #[error("queue command error: {0}")]
    Command(String),

    /// The message was deleted, or leased again by another consumer after our lease expired.
    #[error("lease lost for message {message_id} on queue {queue}")]
    LeaseLost { queue: String, message_id: String },

    #[error("queue transport lock poisoned")]
    LockPoisoned,
}

/// Lease/delete/requeue/poison primitives over a durable message queue.
pub trait QueueTransport: Send + Sync {
    /// Lease the next visible message, hiding it from other consumers for `visibility_timeout`.
    fn lease(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<QueueMessage>, TransportError>;

    /// Remove a leased message permanently.
    fn delete(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError>;

    /// Make a leased message immediately redeliverable.
    fn reset_visibility(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError>;

    /// Append an already-encoded message body.
    fn send(&self, queue: &str, content: &str) -> Result<(), TransportError>;

    /// Copy a message into the queue's poison queue. The caller deletes the original.
    fn send_to_poison(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError>;
}

impl<T> QueueTransport for Arc<T>
where
    T: QueueTransport + ?Sized,
{
    fn lease(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<QueueMessage>, TransportError> {
        (**self).lease(queue, visibility_timeout)
    }

    fn delete(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError> {
        (**self).delete(queue, message)
    }

    fn reset_visibility(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError> {
        (**self).reset_visibility(queue, message)
    }

    fn send(&self, queue: &str, content: &str) -> Result<(), TransportError> {
        (**self).send(queue, content)
    }

    fn send_to_poison(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError> {
        (**self).send_to_poison(queue, message)
    }
}
