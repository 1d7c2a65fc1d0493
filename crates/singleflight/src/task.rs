// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::call::Call;
use crate::registry::{Membership, Registry};
use crate::signal::Beacon;
use crate::wrap::Wrapped;
use crate::{Builder, Options, Result, telemetry};

type Flight<T, E> = Arc<Call<T, E, Beacon>>;

/// Coalesces concurrent calls made from async tasks.
///
/// This is the group to use on a multi-threaded runtime: it is `Send` and `Sync`, and the futures
/// returned by [`call`](Self::call) are `Send` whenever the work future, key, value and error are.
/// Waiting for another task's flight suspends the task instead of blocking its thread. The
/// registry lock is only held for a lookup or removal, never across an `.await`.
///
/// A non-zero [grace period](crate::Builder::grace_period) sleeps with [`tokio::time::sleep`],
/// which needs a Tokio runtime with the time driver enabled.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use singleflight::SingleFlight;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let group = Arc::new(SingleFlight::<String, String, std::io::Error>::new());
///
/// let profile = group
///     .call("user:123".to_string(), || async { Ok("Alice".to_string()) })
///     .await
///     .unwrap();
///
/// assert_eq!(profile, "Alice");
/// # }
/// ```
pub struct SingleFlight<K, T, E> {
    registry: Mutex<Registry<K, Flight<T, E>>>,
    options: Options<K>,
}

impl<K, T, E> SingleFlight<K, T, E>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    /// Creates a group with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// Creates a [`Builder`] for configuring a group; finish it with [`Builder::build`].
    pub fn builder() -> Builder<K, T, E> {
        Builder::new()
    }

    /// Executes `func` unless a call for `key` is already in flight, in which case this waits
    /// for that call to finish and returns its outcome instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if the key validator
    /// rejects `key`, [`Error::Upstream`](crate::Error::Upstream) carrying the error of the flight's
    /// work future, or [`Error::Abandoned`](crate::Error::Abandoned) if the task executing the
    /// flight was cancelled or panicked before producing an outcome.
    pub async fn call<F, Fut>(&self, key: K, func: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.options.validate(&key)?;

        let membership = self.registry.lock().try_join_or_create(key.clone(), || Arc::new(Call::new()));

        match membership {
            Membership::Joined(call) => {
                call.add_joiner();
                telemetry::joined(self.options.name());
                call.signal().wait().await;
                call.outcome()
            }
            Membership::Created(call) => {
                telemetry::started(self.options.name());
                let owner = Owner::new(self, key, call);
                let outcome = func().await;
                owner.finish(outcome).await
            }
        }
    }

    /// Like [`call`](Self::call), but passes `args` to `func`.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call).
    pub async fn call_with<A, F, Fut>(&self, key: K, args: A, func: F) -> Result<T, E>
    where
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.call(key, move || func(args)).await
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

impl<K, T, E> SingleFlight<K, T, E> {
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

impl<K, T, E> Default for SingleFlight<K, T, E> {
    fn default() -> Self {
        Self::with_options(Options::default())
    }
}

impl<K, T, E> Debug for SingleFlight<K, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("options", &self.options)
            .field("registry", &*self.registry.lock())
            .finish()
    }
}

/// The owner's side of a flight.
///
/// [`finish`](Self::finish) broadcasts the outcome and removes the flight from the registry. If
/// the owning future is dropped or unwinds first, the flight is abandoned instead.
struct Owner<'a, K, T, E>
where
    K: Hash + Eq,
{
    group: &'a SingleFlight<K, T, E>,
    key: K,
    call: Flight<T, E>,
    removed: bool,
}

impl<'a, K, T, E> Owner<'a, K, T, E>
where
    K: Hash + Eq,
{
    fn new(group: &'a SingleFlight<K, T, E>, key: K, call: Flight<T, E>) -> Self {
        Self {
            group,
            key,
            call,
            removed: false,
        }
    }

    async fn finish(mut self, outcome: std::result::Result<T, E>) -> Result<T, E>
    where
        T: Clone,
    {
        let result = self.call.complete(self.group.options.name(), outcome);

        let grace_period = self.group.options.grace_period();
        if !grace_period.is_zero() {
            tokio::time::sleep(grace_period).await;
        }

        self.group.registry.lock().remove(&self.key, &self.call);
        self.removed = true;
        result
    }
}

impl<K, T, E> Drop for Owner<'_, K, T, E>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        if self.removed {
            return;
        }

        self.call.abandon(self.group.options.name());
        self.group.registry.lock().remove(&self.key, &self.call);
    }
}
