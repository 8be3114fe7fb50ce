//! Shutdown signalling (§5 Cancellation).
//!
//! A single `Notify` broadcasts to every listener and periodic task waiting
//! on it; each checks `is_shutting_down()` at its next sleep or accept
//! boundary and exits. `wait()` resolves immediately if shutdown has already
//! been signalled, so a task that checks late never misses it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Clone)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Shutdown {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn signal(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves when `signal` is called, or immediately if already signalled.
    pub async fn wait(&self) {
        if self.is_shutting_down() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Shutdown::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_signal() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        let task = tokio::spawn(async move {
            waiter.wait().await;
        });
        shutdown.signal();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn wait_resolves_immediately_if_already_signalled() {
        let shutdown = Shutdown::new();
        shutdown.signal();
        shutdown.wait().await;
        assert!(shutdown.is_shutting_down());
    }
}
