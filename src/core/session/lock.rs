use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Exclusive, non-reentrant guard around the protected requests of one session.
///
/// Waiters are served in FIFO order. Acquiring never fails, it only waits; the returned
/// guard releases the lock when dropped, on every exit path.
#[derive(Debug, Default)]
pub struct RequestLock {
    mutex: Mutex<()>,
    acquisitions: AtomicU64,
}

impl RequestLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        let guard = self.mutex.lock().await;
        let acquisition = self.acquisitions.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(acquisition, "request lock acquired");
        guard
    }

    /// Number of times the lock has been acquired.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::SeqCst)
    }
}
