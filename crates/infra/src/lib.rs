//! Infrastructure layer: repositories, search and embedding clients, queue transport,
//! configuration.

pub mod config;
pub mod embedding;
pub mod queue;
pub mod repository;
pub mod runtime;
pub mod search;

mod integration_tests;

pub use config::{ConfigError, WorkerConfig};
pub use runtime::BlockingRuntime;
