//! Cognitive-search adapters.

pub mod http;
pub mod in_memory;

pub use http::HttpSearchClient;
pub use in_memory::InMemorySearchIndex;
