//! A cloneable handle for poking the controller from external code.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for aborting or tearing down a controller.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
#[derive(Clone)]
pub struct ChatHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) is_running: Arc<AtomicBool>,
    pub(crate) disposed: Arc<AtomicBool>,
}

impl ChatHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            is_running: Arc::new(AtomicBool::new(false)),
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Abort the in-flight request, if any.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Abort and refuse all further sends.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.abort();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Whether a send is currently in progress.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Install a fresh token for a new send and mark the handle running.
    /// The returned guard clears the running flag when dropped.
    pub(crate) fn begin(&self) -> (CancellationToken, RunningGuard) {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        self.is_running.store(true, Ordering::Release);
        (token, RunningGuard(self.clone()))
    }
}

/// Marks the end of a send even if its future is dropped part-way.
pub(crate) struct RunningGuard(ChatHandle);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.is_running.store(false, Ordering::Release);
    }
}
