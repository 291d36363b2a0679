//! Broadcast-once wake registry.
//!
//! Every party that needs to wait registers a one-shot [`Waiter`]; any state
//! change calls [`WakeSet::notify_all`], which fires and forgets every waiter
//! registered so far. A woken party learns only that *something* changed and
//! must re-check its own condition, registering again if it still does not
//! hold.

use tokio::sync::oneshot;

#[derive(Debug, Default)]
pub struct WakeSet {
    waiters: Vec<oneshot::Sender<()>>,
}

/// One-shot handle returned by [`WakeSet::register`].
#[derive(Debug)]
pub struct Waiter {
    rx: oneshot::Receiver<()>,
}

impl WakeSet {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self) -> Waiter {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        Waiter { rx }
    }

    /// Signal and forget every registered waiter.
    pub fn notify_all(&mut self) {
        for tx in self.waiters.drain(..) {
            // The receiver may already be gone; nothing to do then.
            let _ = tx.send(());
        }
    }

    pub fn len(&self) -> usize { self.waiters.len() }

    pub fn is_empty(&self) -> bool { self.waiters.is_empty() }
}

impl Waiter {
    /// Park the current task until signalled.
    ///
    /// A registry dropped without notifying also counts as a wake-up.
    pub async fn wait(self) { let _ = self.rx.await; }

    /// Park the current thread until signalled.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async runtime context, like
    /// [`oneshot::Receiver::blocking_recv`].
    pub fn wait_blocking(self) { let _ = self.rx.blocking_recv(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn notify_wakes_every_registered_waiter() {
        let mut set = WakeSet::new();
        let a = set.register();
        let b = set.register();
        assert_eq!(set.len(), 2);

        set.notify_all();
        assert!(set.is_empty());

        tokio::time::timeout(Duration::from_secs(1), async {
            a.wait().await;
            b.wait().await;
        })
        .await
        .expect("waiters should have been signalled");
    }

    #[tokio::test]
    async fn late_registration_misses_earlier_notification() {
        let mut set = WakeSet::new();
        set.notify_all();
        let late = set.register();

        let woke = tokio::time::timeout(Duration::from_millis(50), late.wait()).await;
        assert!(woke.is_err(), "waiter registered after notify must keep waiting");
    }

    #[test]
    fn dropping_the_registry_releases_blocking_waiters() {
        let mut set = WakeSet::new();
        let waiter = set.register();
        let handle = std::thread::spawn(move || waiter.wait_blocking());
        drop(set);
        handle.join().unwrap();
    }
}
