//! Embedding provider adapters.

pub mod fake;
pub mod http;

pub use fake::{FAKE_EMBEDDING_DIMENSIONS, FakeEmbeddingService};
pub use http::HttpEmbeddingClient;
