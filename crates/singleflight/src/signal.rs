// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! One-shot completion signals.
//!
//! A signal is fired once by the owner of a flight and releases every waiter, including waiters
//! that only start waiting after it fired.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

pub(crate) trait Signal: Default {
    /// Releases all current and future waiters.
    fn fire(&self);

    fn is_fired(&self) -> bool;
}

/// Signal for OS threads; waiting blocks the calling thread.
#[derive(Debug, Default)]
pub(crate) struct Latch {
    fired: Mutex<bool>,
    condvar: Condvar,
}

impl Latch {
    pub(crate) fn wait(&self) {
        let mut fired = self.fired.lock();
        while !*fired {
            self.condvar.wait(&mut fired);
        }
    }
}

impl Signal for Latch {
    fn fire(&self) {
        *self.fired.lock() = true;
        self.condvar.notify_all();
    }

    fn is_fired(&self) -> bool {
        *self.fired.lock()
    }
}

/// Signal for async tasks; waiting suspends the calling task.
#[derive(Debug, Default)]
pub(crate) struct Beacon {
    fired: AtomicBool,
    notify: Notify,
}

impl Beacon {
    pub(crate) async fn wait(&self) {
        // Register interest before checking the flag, so a fire racing with this
        // check still wakes us.
        let mut notified = pin!(self.notify.notified());
        notified.as_mut().enable();

        if self.is_fired() {
            return;
        }

        notified.await;
    }
}

impl Signal for Beacon {
    fn fire(&self) {
        self.fired.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn latch_releases_all_waiters() {
        let latch = Latch::default();

        thread::scope(|scope| {
            let waiters: Vec<_> = (0..4).map(|_| scope.spawn(|| latch.wait())).collect();

            thread::sleep(Duration::from_millis(20));
            latch.fire();

            for waiter in waiters {
                waiter.join().unwrap();
            }
        });

        assert!(latch.is_fired());
    }

    #[test]
    fn latch_stays_fired_for_late_waiters() {
        let latch = Latch::default();
        latch.fire();

        // Returns immediately instead of blocking forever.
        latch.wait();
        latch.wait();
    }

    #[tokio::test]
    async fn beacon_releases_all_waiters() {
        let beacon = Arc::new(Beacon::default());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let beacon = Arc::clone(&beacon);
                tokio::spawn(async move { beacon.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        beacon.fire();

        for waiter in waiters {
            waiter.await.unwrap();
        }
    }

    #[tokio::test]
    async fn beacon_stays_fired_for_late_waiters() {
        let beacon = Beacon::default();
        assert!(!beacon.is_fired());

        beacon.fire();

        beacon.wait().await;
        beacon.wait().await;
        assert!(beacon.is_fired());
    }
}
