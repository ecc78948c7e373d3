//! In-memory queue transport.
//!
//! Intended for tests/dev. Models the parts of a durable queue the dispatcher depends
//! on: visibility deadlines, per-message dequeue counts, pop receipts and poison queues.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::message::{QueueMessage, decode_payload};
use crate::transport::{QueueTransport, TransportError, poison_queue_name};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    content: String,
    dequeue_count: u32,
    pop_receipt: Option<String>,
    visible_at: Instant,
}

impl StoredMessage {
    fn new(content: &str) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            content: content.to_string(),
            dequeue_count: 0,
            pop_receipt: None,
            visible_at: Instant::now(),
        }
    }

    fn holds(&self, message: &QueueMessage) -> bool {
        self.id == message.id && self.pop_receipt.as_deref() == Some(message.pop_receipt.as_str())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryQueueTransport {
    queues: Mutex<HashMap<String, VecDeque<StoredMessage>>>,
}

impl InMemoryQueueTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a body that has already been delivered `dequeue_count` times.
    ///
    /// Lets tests start from a message that is close to (or past) its retry budget.
    pub fn send_with_dequeue_count(&self, queue: &str, content: &str, dequeue_count: u32) {
        let mut message = StoredMessage::new(content);
        message.dequeue_count = dequeue_count;
        self.with_queues(|queues| queues.entry(queue.to_string()).or_default().push_back(message));
    }

    /// Number of messages in `queue`, leased or not.
    pub fn len(&self, queue: &str) -> usize {
        self.with_queues(|queues| queues.get(queue).map_or(0, VecDeque::len))
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// Raw bodies currently stored in `queue`, oldest first.
    pub fn contents(&self, queue: &str) -> Vec<String> {
        self.with_queues(|queues| {
            queues
                .get(queue)
                .map(|q| q.iter().map(|m| m.content.clone()).collect())
                .unwrap_or_default()
        })
    }

    /// Decoded payloads currently stored in `queue`, oldest first. Undecodable bodies are skipped.
    pub fn payloads(&self, queue: &str) -> Vec<JsonValue> {
        self.contents(queue)
            .iter()
            .filter_map(|c| decode_payload(c).ok())
            .collect()
    }

    /// Decoded payloads in the poison queue paired with `queue`.
    pub fn poisoned(&self, queue: &str) -> Vec<JsonValue> {
        self.payloads(&poison_queue_name(queue))
    }

    /// Dequeue count of every message in `queue`, oldest first.
    pub fn dequeue_counts(&self, queue: &str) -> Vec<u32> {
        self.with_queues(|queues| {
            queues
                .get(queue)
                .map(|q| q.iter().map(|m| m.dequeue_count).collect())
                .unwrap_or_default()
        })
    }

    /// Expire every outstanding lease on `queue`, as if the leasing workers had crashed.
    pub fn expire_leases(&self, queue: &str) {
        let now = Instant::now();
        self.with_queues(|queues| {
            if let Some(q) = queues.get_mut(queue) {
                for message in q.iter_mut() {
                    message.visible_at = now;
                }
            }
        });
    }

    /// Drop everything in `queue`.
    pub fn clear(&self, queue: &str) {
        self.with_queues(|queues| {
            queues.remove(queue);
        });
    }

    fn with_queues<R>(&self, f: impl FnOnce(&mut HashMap<String, VecDeque<StoredMessage>>) -> R) -> R {
        // Test helpers only: recover from poisoning instead of failing the assertion helper.
        let mut guard = match self.queues.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, VecDeque<StoredMessage>>>, TransportError> {
        self.queues.lock().map_err(|_| TransportError::LockPoisoned)
    }

    fn lease_lost(queue: &str, message: &QueueMessage) -> TransportError {
        TransportError::LeaseLost {
            queue: queue.to_string(),
            message_id: message.id.clone(),
        }
    }
}

impl QueueTransport for InMemoryQueueTransport {
    fn lease(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<QueueMessage>, TransportError> {
        let mut queues = self.lock()?;
        let now = Instant::now();

        let Some(stored) = queues
            .get_mut(queue)
            .and_then(|q| q.iter_mut().find(|m| m.visible_at <= now))
        else {
            return Ok(None);
        };

        let receipt = Uuid::now_v7().to_string();
        stored.dequeue_count += 1;
        stored.pop_receipt = Some(receipt.clone());
        stored.visible_at = now + visibility_timeout;

        Ok(Some(QueueMessage {
            id: stored.id.clone(),
            pop_receipt: receipt,
            dequeue_count: stored.dequeue_count,
            content: stored.content.clone(),
        }))
    }

    fn delete(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError> {
        let mut queues = self.lock()?;
        let q = queues
            .get_mut(queue)
            .ok_or_else(|| Self::lease_lost(queue, message))?;
        let idx = q
            .iter()
            .position(|m| m.holds(message))
            .ok_or_else(|| Self::lease_lost(queue, message))?;
        q.remove(idx);
        Ok(())
    }

    fn reset_visibility(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError> {
        let mut queues = self.lock()?;
        let stored = queues
            .get_mut(queue)
            .and_then(|q| q.iter_mut().find(|m| m.holds(message)))
            .ok_or_else(|| Self::lease_lost(queue, message))?;
        stored.visible_at = Instant::now();
        Ok(())
    }

    fn send(&self, queue: &str, content: &str) -> Result<(), TransportError> {
        let mut queues = self.lock()?;
        queues
            .entry(queue.to_string())
            .or_default()
            .push_back(StoredMessage::new(content));
        Ok(())
    }

    fn send_to_poison(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError> {
        self.send(&poison_queue_name(queue), &message.content)
    }
}
