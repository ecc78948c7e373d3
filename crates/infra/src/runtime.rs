//! Blocking bridge to async client libraries.
//!
//! The collaborator traits are synchronous; sqlx, reqwest and friends are not. Adapters
//! share one current-thread tokio runtime and `block_on` each call.

use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BlockingRuntime {
    runtime: Arc<tokio::runtime::Runtime>,
}

impl BlockingRuntime {
    pub fn new() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }

    /// Must not be called from inside an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
