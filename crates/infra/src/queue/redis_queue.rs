//! Redis-backed queue transport (at-least-once, visibility timeouts).
//!
//! ## Layout (per queue `q`)
//!
//! - **`{prefix}:{q}:messages`**: hash `id -> encoded body`
//! - **`{prefix}:{q}:dequeues`**: hash `id -> delivery count`
//! - **`{prefix}:{q}:receipts`**: hash `id -> pop receipt of the current lease`
//! - **`{prefix}:{q}:visible`**: sorted set `id -> visible-at (ms since epoch)`
//!
//! A lease is one Lua script (pick the oldest visible id, push its visibility out, bump
//! the count, store a fresh receipt), so two workers never lease the same visible message.
//! Visible ids whose body is gone are removed by the same script and skipped.
//! Delete and requeue verify the receipt; a stale lease gets `LeaseLost`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use ragworks_jobs::{QueueMessage, QueueTransport, TransportError, poison_queue_name};

const DEFAULT_KEY_PREFIX: &str = "ragworks:queue";

const LEASE_SCRIPT: &str = r#"
while true do
  local id = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, 1)[1]
  if not id then
    return nil
  end
  local content = redis.call('HGET', KEYS[4], id)
  if content then
    redis.call('ZADD', KEYS[1], ARGV[2], id)
    local count = redis.call('HINCRBY', KEYS[2], id, 1)
    redis.call('HSET', KEYS[3], id, ARGV[3])
    return {id, count, content}
  end
  redis.call('ZREM', KEYS[1], id)
  redis.call('HDEL', KEYS[2], id)
  redis.call('HDEL', KEYS[3], id)
end
"#;

const DELETE_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[3], ARGV[1]) ~= ARGV[2] then
  return 0
end
redis.call('ZREM', KEYS[1], ARGV[1])
redis.call('HDEL', KEYS[2], ARGV[1])
redis.call('HDEL', KEYS[3], ARGV[1])
redis.call('HDEL', KEYS[4], ARGV[1])
return 1
"#;

const RESET_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[3], ARGV[1]) ~= ARGV[2] then
  return 0
end
redis.call('ZADD', KEYS[1], ARGV[3], ARGV[1])
redis.call('HDEL', KEYS[3], ARGV[1])
return 1
"#;

#[derive(Debug, Clone)]
pub struct RedisQueueTransport {
    client: Arc<redis::Client>,
    key_prefix: String,
}

struct QueueKeys {
    visible: String,
    dequeues: String,
    receipts: String,
    messages: String,
}

impl RedisQueueTransport {
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, TransportError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        })
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn connection(&self) -> Result<redis::Connection, TransportError> {
        self.client
            .get_connection()
            .map_err(|e| TransportError::Connection(e.to_string()))
    }

    fn keys(&self, queue: &str) -> QueueKeys {
        let base = format!("{}:{}", self.key_prefix, queue);
        QueueKeys {
            visible: format!("{base}:visible"),
            dequeues: format!("{base}:dequeues"),
            receipts: format!("{base}:receipts"),
            messages: format!("{base}:messages"),
        }
    }

    /// Run a receipt-checked script; `0` means the lease is gone.
    fn with_receipt(
        &self,
        script: &str,
        queue: &str,
        message: &QueueMessage,
        extra: Option<i64>,
    ) -> Result<(), TransportError> {
        let keys = self.keys(queue);
        let mut conn = self.connection()?;

        let script = redis::Script::new(script);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(&keys.visible)
            .key(&keys.dequeues)
            .key(&keys.receipts)
            .key(&keys.messages)
            .arg(&message.id)
            .arg(&message.pop_receipt);
        if let Some(extra) = extra {
            invocation.arg(extra);
        }

        let applied: i64 = invocation
            .invoke(&mut conn)
            .map_err(|e| TransportError::Command(e.to_string()))?;
        if applied == 0 {
            return Err(TransportError::LeaseLost {
                queue: queue.to_string(),
                message_id: message.id.clone(),
            });
        }
        Ok(())
    }
}

impl QueueTransport for RedisQueueTransport {
    #[instrument(skip(self), err)]
    fn lease(
        &self,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<QueueMessage>, TransportError> {
        let keys = self.keys(queue);
        let mut conn = self.connection()?;

        let now = Utc::now().timestamp_millis();
        let hidden_until = now.saturating_add(i64::try_from(visibility_timeout.as_millis()).unwrap_or(i64::MAX));
        let receipt = Uuid::now_v7().to_string();

        let leased: Option<(String, u32, String)> = redis::Script::new(LEASE_SCRIPT)
            .key(&keys.visible)
            .key(&keys.dequeues)
            .key(&keys.receipts)
            .key(&keys.messages)
            .arg(now)
            .arg(hidden_until)
            .arg(&receipt)
            .invoke(&mut conn)
            .map_err(|e| TransportError::Command(format!("lease failed: {e}")))?;

        Ok(leased.map(|(id, dequeue_count, content)| {
            debug!(message_id = %id, dequeue_count, "message leased");
            QueueMessage {
                id,
                pop_receipt: receipt,
                dequeue_count,
                content,
            }
        }))
    }

    #[instrument(skip(self, message), fields(message_id = %message.id), err)]
    fn delete(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError> {
        self.with_receipt(DELETE_SCRIPT, queue, message, None)
    }

    #[instrument(skip(self, message), fields(message_id = %message.id), err)]
    fn reset_visibility(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError> {
        self.with_receipt(RESET_SCRIPT, queue, message, Some(Utc::now().timestamp_millis()))
    }

    #[instrument(skip(self, content), err)]
    fn send(&self, queue: &str, content: &str) -> Result<(), TransportError> {
        let keys = self.keys(queue);
        let mut conn = self.connection()?;
        let id = Uuid::now_v7().to_string();

        redis::pipe()
            .atomic()
            .hset(&keys.messages, &id, content)
            .ignore()
            .hset(&keys.dequeues, &id, 0)
            .ignore()
            .zadd(&keys.visible, &id, Utc::now().timestamp_millis())
            .ignore()
            .query::<()>(&mut conn)
            .map_err(|e| TransportError::Command(format!("send failed: {e}")))
    }

    fn send_to_poison(&self, queue: &str, message: &QueueMessage) -> Result<(), TransportError> {
        let poison = poison_queue_name(queue);
        warn!(
            message_id = %message.id,
            dequeue_count = message.dequeue_count,
            queue = %poison,
            "message sent to poison queue"
        );
        self.send(&poison, &message.content)
    }
}
