// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::call::Call;
use crate::registry::{Membership, Registry};
use crate::signal::Latch;
use crate::wrap::Wrapped;
use crate::{Builder, Options, Result, telemetry};

type Flight<T, E> = Arc<Call<T, E, Latch>>;

/// Coalesces concurrent calls made from OS threads.
///
/// The registry sits behind a [`parking_lot::Mutex`] and joiners block on a condition variable
/// until the owner of the flight broadcasts its outcome. The work closure runs on the owner's
/// thread, outside of any lock.
///
/// # Examples
///
/// ```
/// use std::thread;
///
/// use singleflight::BlockingSingleFlight;
///
/// let group = BlockingSingleFlight::<&str, String, std::io::Error>::new();
///
/// thread::scope(|scope| {
///     for _ in 0..4 {
///         scope.spawn(|| {
///             let value = group.call("config", || Ok("loaded".to_string())).unwrap();
///             assert_eq!(value, "loaded");
///         });
///     }
/// });
/// ```
pub struct BlockingSingleFlight<K, T, E> {
    registry: Mutex<Registry<K, Flight<T, E>>>,
    options: Options<K>,
}

impl<K, T, E> BlockingSingleFlight<K, T, E>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    /// Creates a group with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// Creates a [`Builder`] for configuring a group; finish it with [`Builder::build_blocking`].
    pub fn builder() -> Builder<K, T, E> {
        Builder::new()
    }

    /// Executes `func` unless a call for `key` is already in flight, in which case this blocks
    /// until that call finishes and returns its outcome instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if the key validator
    /// rejects `key`, [`Error::Upstream`](crate::Error::Upstream) carrying the error of the flight's
    /// work closure, or [`Error::Abandoned`](crate::Error::Abandoned) if the owner of the flight
    /// panicked before producing an outcome.
    pub fn call<F>(&self, key: K, func: F) -> Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        self.options.validate(&key)?;

        let membership = self.registry.lock().try_join_or_create(key.clone(), || Arc::new(Call::new()));
        match membership {
            Membership::Joined(call) => {
                call.add_joiner();
                telemetry::joined(self.options.name());
                call.signal().wait();
                call.outcome()
            }
            Membership::Created(call) => {
                telemetry::started(self.options.name());
                let owner = Owner::new(self, key, call);
                let outcome = func();
                owner.finish(outcome)
            }
        }
    }

    /// Like [`call`](Self::call), but passes `args` to `func`.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call).
    pub fn call_with<A, F>(&self, key: K, args: A, func: F) -> Result<T, E>
    where
        F: FnOnce(A) -> std::result::Result<T, E>,
    {
        self.call(key, move || func(args))
    }

    /// Binds `func` to this group, deriving each call's key from its arguments with `derive_key`.
    pub fn wrap<D, F>(self: &Arc<Self>, derive_key: D, func: F) -> Wrapped<Arc<Self>, D, F> {
        Wrapped::new(Arc::clone(self), derive_key, func)
    }

    /// The number of keys that currently have a call in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.registry.lock().len()
    }
}

impl<K, T, E> BlockingSingleFlight<K, T, E> {
    pub(crate) fn with_options(options: Options<K>) -> Self {
        Self {
            registry: Mutex::new(Registry::new()),
            options,
        }
    }

    /// The options this group was built with.
    #[must_use]
    pub fn options(&self) -> &Options<K> {
        &self.options
    }
}

impl<K, T, E> Default for BlockingSingleFlight<K, T, E> {
    fn default() -> Self {
        Self::with_options(Options::default())
    }
}

impl<K, T, E> Debug for BlockingSingleFlight<K, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingSingleFlight")
            .field("options", &self.options)
            .field("registry", &*self.registry.lock())
            .finish()
    }
}

/// The owner's side of a flight. Completing it broadcasts the outcome; dropping it without
/// completing (the work panicked) abandons the flight so joiners are released.
struct Owner<'a, K, T, E>
where
    K: Hash + Eq,
{
    group: &'a BlockingSingleFlight<K, T, E>,
    key: K,
    call: Flight<T, E>,
}

impl<'a, K, T, E> Owner<'a, K, T, E>
where
    K: Hash + Eq,
{
    fn new(group: &'a BlockingSingleFlight<K, T, E>, key: K, call: Flight<T, E>) -> Self {
        Self { group, key, call }
    }

    fn finish(self, outcome: std::result::Result<T, E>) -> Result<T, E>
    where
        T: Clone,
    {
        let result = self.call.complete(self.group.options.name(), outcome);

        let grace_period = self.group.options.grace_period();
        if !grace_period.is_zero() {
            thread::sleep(grace_period);
        }

        // Dropping `self` removes the flight from the registry.
        result
    }
}

impl<K, T, E> Drop for Owner<'_, K, T, E>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        self.call.abandon(self.group.options.name());
        self.group.registry.lock().remove(&self.key, &self.call);
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};
    use std::time::Duration;

    use super::*;
    use crate::telemetry::testing::LogCapture;
    use crate::telemetry::{ABANDONED_EVENT, COMPLETED_EVENT, JOINED_EVENT, STARTED_EVENT};

    type Group = BlockingSingleFlight<&'static str, String, &'static str>;

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(BlockingSingleFlight<String, String, std::io::Error>: Send, Sync, Debug, Default);
    }

    #[test]
    fn call_emits_flight_events() {
        let capture = LogCapture::default();
        let group = Group::builder().name("configs").build_blocking();

        // Subscribers are per thread, so each caller installs one writing to the same buffer.
        thread::scope(|scope| {
            let owner = scope.spawn(|| {
                let _guard = tracing::subscriber::set_default(capture.subscriber());
                group.call("shared", || {
                    thread::sleep(Duration::from_millis(200));
                    Ok("value".to_string())
                })
            });
            thread::sleep(Duration::from_millis(50));

            let joiner = scope.spawn(|| {
                let _guard = tracing::subscriber::set_default(capture.subscriber());
                group.call("shared", || Ok("unused".to_string()))
            });

            assert_eq!(owner.join().unwrap().unwrap(), "value");
            assert_eq!(joiner.join().unwrap().unwrap(), "value");
        });

        capture.assert_contains(STARTED_EVENT);
        capture.assert_contains(JOINED_EVENT);
        capture.assert_contains(COMPLETED_EVENT);
        capture.assert_contains("flight.group=\"configs\"");
        capture.assert_contains("flight.joiners=1");
        capture.assert_contains("flight.failed=false");

        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let failed = group.call("failing", || Err("boom"));
        assert!(failed.unwrap_err().upstream_error().is_some());
        capture.assert_contains("flight.failed=true");

        let panicked = panic::catch_unwind(AssertUnwindSafe(|| group.call("panicking", || panic!("boom"))));
        assert!(panicked.is_err());
        capture.assert_contains(ABANDONED_EVENT);
        capture.assert_contains("WARN");
        assert_eq!(group.in_flight(), 0);
    }
}
