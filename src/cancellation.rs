use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

///A handle that stops a running generation from another thread.
///
///Clones share the same flag. Generation checks it once per enumerated and once per classified
///sentence and returns [`crate::GenerationError::Cancelled`] without writing anything.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Relaxed);
    }

    pub fn as_atomic(&self) -> &AtomicBool {
        &self.cancelled
    }
}
