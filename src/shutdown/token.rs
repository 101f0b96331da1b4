use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::error::TransportError;

#[derive(Default)]
struct TokenState {
    stop_requested: AtomicBool,
    notify: Notify,
}

/// One-shot stop flag shared between a service handle and its actor.
///
/// The flag is stored with release ordering and read with acquire ordering, so
/// anything written before [`ShutdownToken::trigger`] is visible to a reader
/// that observes the flag set. A token is never reset; every session allocates
/// fresh ones.
#[derive(Clone, Default)]
pub struct ShutdownToken {
    state: Arc<TokenState>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every waiter. Returns `true` only for the call
    /// that performed the transition.
    pub fn trigger(&self) -> bool {
        let first = !self.state.stop_requested.swap(true, Ordering::AcqRel);
        if first {
            self.state.notify.notify_waiters();
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.state.stop_requested.load(Ordering::Acquire)
    }

    /// Resolves once the token has been triggered.
    pub async fn triggered(&self) {
        loop {
            let notified = self.state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }

    /// Runs a transport operation that is rejected with
    /// [`TransportError::OperationAborted`] as soon as the token is set.
    pub async fn guard<F, T>(&self, operation: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        if self.is_triggered() {
            return Err(TransportError::OperationAborted);
        }

        tokio::select! {
            biased;

            _ = self.triggered() => Err(TransportError::OperationAborted),
            result = operation => result,
        }
    }
}

impl std::fmt::Debug for ShutdownToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownToken")
            .field("stop_requested", &self.is_triggered())
            .finish()
    }
}
