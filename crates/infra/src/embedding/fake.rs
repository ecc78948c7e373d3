//! Deterministic embedding provider for tests/dev.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use ragworks_indexing::{EmbeddingError, EmbeddingService};

pub const FAKE_EMBEDDING_DIMENSIONS: usize = 8;

/// Hashes text into a small vector. Calls are numbered from 1 and can be made to fail.
#[derive(Debug, Default)]
pub struct FakeEmbeddingService {
    calls: AtomicUsize,
    fail_from_call: Mutex<Option<usize>>,
}

impl FakeEmbeddingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail call number `call` and every call after it.
    pub fn fail_from_call(&self, call: usize) {
        if let Ok(mut slot) = self.fail_from_call.lock() {
            *slot = Some(call);
        }
    }

    pub fn recover(&self) {
        if let Ok(mut slot) = self.fail_from_call.lock() {
            *slot = None;
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingService for FakeEmbeddingService {
    fn generate_embeddings(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failing = self
            .fail_from_call
            .lock()
            .map(|slot| slot.is_some_and(|from| call >= from))
            .unwrap_or(false);
        if failing {
            return Err(EmbeddingError::Status {
                status: 429,
                body: "rate limited".to_string(),
            });
        }

        let mut vector = vec![0.0_f32; FAKE_EMBEDDING_DIMENSIONS];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % FAKE_EMBEDDING_DIMENSIONS] += f32::from(byte) / 255.0;
        }
        Ok(vector)
    }
}
