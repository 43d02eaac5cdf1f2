//! A cooperative cancellation token propagated from `workflow.run*` down to
//! every handler's [`crate::executor::HandlerContext`] (`spec.md` §5).
//!
//! The scheduler never forcibly aborts a handler; it only stops dispatching
//! new supersteps once cancellation is requested, and handlers are expected
//! to check [`CancellationToken::is_cancelled`] at their own `await` points.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
