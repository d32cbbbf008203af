//! Caller-initiated cancellation.

use std::sync::Arc;

use tokio::sync::watch;

/// Aborts every invocation that was started with one of its signals.
///
/// Cloning yields another handle to the same flag. Aborting is sticky:
/// invocations started after [`AbortHandle::abort`] are aborted at once.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortHandle {
    /// Creates a handle that has not been triggered.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Triggers the abort.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` once [`abort`](Self::abort) has been called.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns a signal the pump can wait on.
    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// The receiving side of an [`AbortHandle`].
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// Resolves once the handle is triggered. Never resolves if every
    /// handle was dropped without aborting.
    pub async fn aborted(&mut self) {
        if self.rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Returns `true` if the handle has been triggered.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }
}
