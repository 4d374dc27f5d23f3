//! Cooperative cancellation for blocked readers.
//!
//! A waiter holding a [`CancelFlag`] sleeps in bounded slices and checks the
//! flag between slices, so raising it releases the waiter within one poll
//! interval even if the writer never appends again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared shutdown flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    raised: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Waiters return `Cancelled` at their next check.
    #[inline]
    pub fn cancel(&self) {
        self.raised.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Lower the flag so it can be reused for a new session.
    #[inline]
    pub fn reset(&self) {
        self.raised.store(false, Ordering::Release);
    }
}
