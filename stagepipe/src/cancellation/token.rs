//! Cancellation token for cooperative cancellation.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;

/// Reason recorded when a token expires through its deadline.
pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";

/// A callback type for cancellation notifications.
pub type CancelCallback = Box<dyn FnOnce() + Send>;

/// A token for cooperative cancellation.
///
/// Cancellation is idempotent - only the first cancellation reason is kept.
/// A token may carry a deadline, after which it reports itself cancelled with
/// [`DEADLINE_EXCEEDED`] as the reason.
#[derive(Default)]
pub struct CancellationToken {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Callbacks to invoke on cancellation.
    callbacks: Mutex<Vec<CancelCallback>>,
    /// Optional point in time after which the token counts as cancelled.
    deadline: Option<Instant>,
    /// Wakes tasks parked in [`CancellationToken::cancelled`].
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new cancellation token without a deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    /// Creates a token that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Requests cancellation with a reason.
    ///
    /// This is idempotent - only the first reason is kept.
    /// Callbacks are invoked immediately. Panics in callbacks are logged and suppressed.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        *self.reason.write() = Some(reason.into());
        self.notify.notify_waiters();

        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        for callback in callbacks {
            invoke_callback(callback);
        }
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Fires an expired deadline before the lock is taken.
        let _ = self.is_cancelled();

        let mut callbacks = self.callbacks.lock();
        if self.cancelled.load(Ordering::SeqCst) {
            drop(callbacks);
            invoke_callback(Box::new(callback));
        } else {
            callbacks.push(Box::new(callback));
        }
    }

    /// Returns whether cancellation has been requested or the deadline has passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancel(DEADLINE_EXCEEDED);
                true
            }
            _ => false,
        }
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Completes once the token is cancelled, explicitly or by deadline.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not missed.
            notified.as_mut().enable();

            if self.is_cancelled() {
                return;
            }

            match self.deadline {
                Some(deadline) => {
                    tokio::select! {
                        () = &mut notified => {}
                        () = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }
}

fn invoke_callback(callback: CancelCallback) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.cancelled.load(Ordering::SeqCst))
            .field("reason", &self.reason())
            .field("deadline", &self.deadline)
            .finish()
    }
}
