//! Queue-driven background job mechanics.
//!
//! ## Design
//!
//! - One worker invocation leases at most one message and runs one handler
//! - Delivery is at-least-once; handlers must be idempotent
//! - Handlers report a three-way [`JobOutcome`]; the dispatcher owns every queue action
//! - Messages that exhaust their retry budget move to a poison queue for manual triage
//!
//! ## Components
//!
//! - [`QueueTransport`]: lease/delete/requeue/poison primitives (in-memory or durable)
//! - [`JobDescriptor`]: process-wide job table (queue vs timer, retry policy)
//! - [`JobHandler`]: job-specific logic, registered by [`JobName`]
//! - [`JobDispatcher`]: resolves a job, leases, dispatches, performs lifecycle actions

pub mod descriptor;
pub mod dispatcher;
pub mod handler;
pub mod in_memory;
pub mod message;
pub mod transport;

pub use descriptor::{JobDescriptor, JobKind, JobName, RetryPolicy, DEFAULT_MAX_DEQUEUE_COUNT};
pub use dispatcher::{
    DEFAULT_VISIBILITY_TIMEOUT, DispatchError, Dispatched, Disposition, JobDispatcher,
};
pub use handler::{JobContext, JobHandler, JobOutcome};
pub use in_memory::InMemoryQueueTransport;
pub use message::{CodecError, QueueMessage, decode_payload, encode_payload};
pub use transport::{QueueTransport, TransportError, poison_queue_name};
