//! Cooperative cancellation for queue drains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag shared between a caller and a running drain.
///
/// Drains only consult the flag between alerts, so a delivery that already started is
/// always allowed to finish and record its result.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns a guard that cancels this token when dropped, e.g. when an HTTP handler
    /// future is abandoned by a disconnecting client.
    pub fn drop_guard(self) -> CancelOnDrop {
        CancelOnDrop { token: self }
    }
}

#[derive(Debug)]
pub struct CancelOnDrop {
    token: CancellationToken,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
