//! The pipeline's shared shutdown flag.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// A callback type for shutdown notifications.
pub type ShutdownCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct ShutdownState {
    shutting_down: AtomicBool,
    aborted: AtomicBool,
    reason: RwLock<Option<String>>,
    callbacks: RwLock<Vec<ShutdownCallback>>,
}

/// Cooperative shutdown flag shared by a pipeline, its filters and its sources.
///
/// Two levels:
/// - *shut down*: sources stop producing; flush and close follow.
/// - *aborted*: also stops tank drain loops; close runs without flush.
///
/// Aborting implies shutting down. The first reason given wins. Cloning the
/// token shares the flag.
#[derive(Clone, Default)]
pub struct ShutdownToken {
    state: Arc<ShutdownState>,
}

impl ShutdownToken {
    /// Creates a new token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown.
    ///
    /// Idempotent. Callbacks run on the first request; panics in callbacks are
    /// logged and suppressed.
    pub fn shut_down(&self, reason: impl Into<String>) {
        if self
            .state
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.state.reason.write() = Some(reason.into());

            let callbacks = self.state.callbacks.read();
            for callback in callbacks.iter() {
                run_callback(callback.as_ref());
            }
        }
    }

    /// Requests an abort, which also shuts down.
    pub fn abort(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.state.aborted.store(true, Ordering::SeqCst);
        self.shut_down(reason);
    }

    /// Registers a callback run once shutdown is requested.
    ///
    /// If shutdown was already requested, the callback runs immediately.
    pub fn on_shutdown<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.is_shutting_down() {
            run_callback(&callback);
        } else {
            self.state.callbacks.write().push(Box::new(callback));
        }
    }

    /// Returns whether shutdown has been requested.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.state.shutting_down.load(Ordering::SeqCst)
    }

    /// Returns whether an abort has been requested.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state.aborted.load(Ordering::SeqCst)
    }

    /// Returns the shutdown reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.state.reason.read().clone()
    }
}

fn run_callback(callback: &(dyn Fn() + Send + Sync)) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Shutdown callback panicked: {:?}", e);
    }
}

impl std::fmt::Debug for ShutdownToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownToken")
            .field("shutting_down", &self.is_shutting_down())
            .field("aborted", &self.is_aborted())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_token_default_running() {
        let token = ShutdownToken::new();
        assert!(!token.is_shutting_down());
        assert!(!token.is_aborted());
        assert!(token.reason().is_none());
    }

    #[test]
    fn test_first_reason_wins() {
        let token = ShutdownToken::new();
        token.shut_down("source exhausted");
        token.shut_down("again");

        assert!(token.is_shutting_down());
        assert!(!token.is_aborted());
        assert_eq!(token.reason(), Some("source exhausted".to_string()));
    }

    #[test]
    fn test_abort_implies_shutdown() {
        let token = ShutdownToken::new();
        let shared = token.clone();
        shared.abort("failure");

        assert!(token.is_shutting_down());
        assert!(token.is_aborted());
        assert_eq!(token.reason(), Some("failure".to_string()));
    }

    #[test]
    fn test_callbacks_run_once() {
        let token = ShutdownToken::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        token.on_shutdown(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        token.shut_down("a");
        token.abort("b");
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let counter_clone = counter.clone();
        token.on_shutdown(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callback_panic_suppressed() {
        let token = ShutdownToken::new();
        token.on_shutdown(|| panic!("Intentional panic"));

        token.shut_down("test");
        assert!(token.is_shutting_down());
    }
}
