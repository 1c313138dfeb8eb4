//! Cancellation and suspension shared between a worker and its host.

use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Handle for pausing, resuming and cancelling a running worker.
///
/// Clones share state, so the host keeps one and hands another to the
/// observer the worker polls.
#[derive(Debug, Clone, Default)]
pub struct WorkerControl {
    cancel: CancellationToken,
    suspend: Arc<(Mutex<bool>, Condvar)>,
}

impl WorkerControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Also wakes a suspended worker so it can see it.
    pub fn cancel(&self) {
        self.cancel.cancel();
        let (lock, cvar) = &*self.suspend;
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that fires on cancellation, for async hosts.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn suspend(&self) {
        let (lock, _) = &*self.suspend;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn resume(&self) {
        let (lock, cvar) = &*self.suspend;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = false;
        cvar.notify_all();
    }

    pub fn is_suspended(&self) -> bool {
        let (lock, _) = &*self.suspend;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block while suspended. Returns on resume or cancellation.
    pub fn wait_if_suspended(&self) {
        let (lock, cvar) = &*self.suspend;
        let mut suspended = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while *suspended && !self.cancel.is_cancelled() {
            suspended = cvar.wait(suspended).unwrap_or_else(PoisonError::into_inner);
        }
    }
}
