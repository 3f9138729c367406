//! Cooperative shutdown signal shared by the accept loop and sessions.

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable handle that requests server shutdown.
///
/// Cancellation is cooperative: the accept loop wakes immediately, and
/// every session notices the flag the next time its `recv` returns
/// (at the latest after one read timeout). Safe to use from any task,
/// including a Ctrl-C handler.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// Requests shutdown. Calling it more than once has no further effect.
    pub fn shutdown(&self) {
        if !self.flag.send_replace(true) {
            tracing::info!("shutdown requested");
        }
    }

    pub fn is_requested(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
