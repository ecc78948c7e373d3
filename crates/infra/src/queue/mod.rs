//! Durable queue transports. The in-memory transport lives in `ragworks-jobs`.

#[cfg(feature = "redis")]
pub mod redis_queue;

#[cfg(feature = "redis")]
pub use redis_queue::RedisQueueTransport;
