//! Single-flight gate for session establishment.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;

use crate::error::CoreResult;

/// Runs an async initializer at most once per generation.
///
/// Concurrent callers queue on the gate; the first runs the initializer and
/// caches a successful result, the rest receive that same result. Errors are
/// not cached, so the next caller tries again. [`SingleFlight::invalidate`]
/// starts a new generation (sign-out, identity change).
#[derive(Debug)]
pub struct SingleFlight<T> {
    slot: Mutex<Option<T>>,
    runs: AtomicUsize,
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            runs: AtomicUsize::new(0),
        }
    }

    pub async fn run<F, Fut>(&self, init: F) -> CoreResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CoreResult<T>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
        let value = init().await?;
        *slot = Some(value.clone());
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }

    /// How many times an initializer actually ran.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
