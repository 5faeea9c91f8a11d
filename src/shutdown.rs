//! Cooperative shutdown signal shared by both loops.
//!
//! Built on a zero-traffic `crossbeam-channel`: nothing is ever sent, and
//! [`Shutdown::trigger`] drops the only sender.  Every receiver then sees
//! the channel disconnect, which wakes any thread parked in
//! [`Shutdown::wait`] immediately.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

#[derive(Debug)]
struct Inner {
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

/// Cloneable cancellation handle.
#[derive(Debug, Clone)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                trigger: Mutex::new(Some(tx)),
                signal: rx,
            }),
        }
    }

    /// Request shutdown.  Idempotent.
    pub fn trigger(&self) {
        if self.inner.trigger.lock().take().is_some() {
            log::info!("shutdown requested");
        }
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.inner.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for up to `timeout`.  Returns `true` as soon as shutdown is
    /// requested, `false` if the full timeout elapsed.
    pub fn wait(&self, timeout: Duration) -> bool {
        matches!(
            self.inner.signal.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}
