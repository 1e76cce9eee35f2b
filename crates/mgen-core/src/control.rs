//! Run control: a shared cancel flag observed at every suspension point.
//!
//! The controlling side keeps a clone of the `RunControl` and calls `cancel()`;
//! the worker checks the flag before each job, inside each poll iteration, and
//! while sleeping. In-flight network calls are never interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Granularity at which a cancellable sleep re-checks the flag.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(200);

/// Shared cancel flag for one run (a single project or the run-all loop).
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless cancelled first.
    /// Returns `true` if the full duration elapsed, `false` if the run was cancelled.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            tokio::time::sleep((deadline - now).min(CANCEL_CHECK_INTERVAL)).await;
        }
    }
}
