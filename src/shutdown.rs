//! Graceful shutdown coordination
//!
//! A [`ShutdownHandle`] lets any task request shutdown and lets long-running
//! loops observe the request either by polling [`is_requested`] or by
//! awaiting [`wait`]. Built on a `tokio::sync::watch` channel, so late
//! subscribers still see a request that happened before they started
//! waiting.
//!
//! [`is_requested`]: ShutdownHandle::is_requested
//! [`wait`]: ShutdownHandle::wait

use once_cell::sync::OnceCell;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Process-wide shutdown handle, set once by the binary at startup.
static GLOBAL_SHUTDOWN: OnceCell<SharedShutdown> = OnceCell::new();

/// Shared shutdown coordinator.
pub type SharedShutdown = Arc<ShutdownHandle>;

/// Broadcast-style shutdown signal.
#[derive(Debug)]
pub struct ShutdownHandle {
    sender: watch::Sender<bool>,
    receiver: watch::Receiver<bool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    /// Create a handle with no shutdown requested.
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self { sender, receiver }
    }

    /// Request shutdown. Idempotent; all waiters are woken.
    pub fn request(&self) {
        if !*self.receiver.borrow() {
            info!("Shutdown requested");
            let _ = self.sender.send(true);
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait until shutdown is requested. Returns immediately if it already
    /// was.
    pub async fn wait(&self) {
        let mut receiver = self.receiver.clone();
        // wait_for resolves immediately when the current value matches.
        let _ = receiver.wait_for(|requested| *requested).await;
    }
}

/// Install the process-wide shutdown handle. Returns `false` if one was
/// already installed.
pub fn set_global(handle: SharedShutdown) -> bool {
    GLOBAL_SHUTDOWN.set(handle).is_ok()
}

/// The process-wide shutdown handle, if installed.
pub fn global() -> Option<&'static SharedShutdown> {
    GLOBAL_SHUTDOWN.get()
}
